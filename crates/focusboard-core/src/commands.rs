use std::io::{self, Write};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::app::App;
use crate::cli::{
    CardCommand, Command, MoodCommand, ProfileCommand, TaskAddArgs, TaskCommand, TimerCommand,
};
use crate::datetime::parse_date_expr;
use crate::flashcard::CardDraft;
use crate::hooks::Change;
use crate::render::Renderer;
use crate::task::{Task, TaskDraft};
use crate::timer::{IntervalTicks, TimerMode, format_clock};
use crate::user::UserProfile;

#[instrument(skip(app, renderer, command))]
pub fn dispatch(app: &mut App, renderer: &mut Renderer, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");
    match command {
        Command::Task(cmd) => dispatch_task(app, renderer, cmd),
        Command::Card(cmd) => dispatch_card(app, renderer, cmd),
        Command::Mood(cmd) => dispatch_mood(app, renderer, cmd),
        Command::Timer(cmd) => dispatch_timer(app, renderer, cmd),
        Command::Profile(cmd) => dispatch_profile(app, renderer, cmd),
        Command::Dashboard { json } => cmd_dashboard(app, renderer, json),
    }
}

fn dispatch_task(app: &mut App, renderer: &mut Renderer, cmd: TaskCommand) -> anyhow::Result<()> {
    match cmd {
        TaskCommand::Add(args) => cmd_task_add(app, renderer, args),
        TaskCommand::List { filter } => {
            if let Some(filter) = filter {
                app.tasks.set_filter(filter);
            }
            let rows = with_positions(app, app.tasks.visible());
            renderer.print_task_table(&rows)
        }
        TaskCommand::Done { task } => {
            let id = resolve_task(app, &task)?;
            let toggled = app
                .tasks
                .toggle_completion(id)
                .ok_or_else(|| anyhow!("task not found: {task}"))?;
            let state = if toggled.completed { "completed" } else { "reopened" };
            println!("{state} \"{}\"", toggled.title);
            Ok(())
        }
        TaskCommand::Delete { task } => {
            let id = resolve_task(app, &task)?;
            if let Some(removed) = app.tasks.delete(id) {
                println!("deleted \"{}\"", removed.title);
            }
            Ok(())
        }
        TaskCommand::Today => {
            let today = app.today();
            let rows = with_positions(app, app.tasks.tasks_for_date(today));
            renderer.print_task_table(&rows)
        }
        TaskCommand::Upcoming { limit } => {
            let limit = limit.unwrap_or(app.settings().upcoming_limit);
            let rows = with_positions(app, app.tasks.upcoming(limit));
            renderer.print_task_table(&rows)
        }
    }
}

#[instrument(skip(app, renderer, args))]
fn cmd_task_add(app: &mut App, renderer: &mut Renderer, args: TaskAddArgs) -> anyhow::Result<()> {
    info!("command task add");
    let today = app.today();
    let date = parse_date_expr(&args.date, today)?;

    let draft = TaskDraft {
        title: args.title,
        description: args.description,
        date: date.format("%Y-%m-%d").to_string(),
        estimated_minutes: args.minutes,
        priority: args.priority,
    };
    let task = app.tasks.add(draft)?;
    renderer.print_task_info(&task)
}

fn dispatch_card(app: &mut App, renderer: &mut Renderer, cmd: CardCommand) -> anyhow::Result<()> {
    match cmd {
        CardCommand::Add {
            subject,
            question,
            answer,
        } => {
            let card = app
                .flashcards
                .add(CardDraft::new(subject, question, answer))?;
            println!("added card to {}", card.subject);
            Ok(())
        }
        CardCommand::List { subject } => {
            let cards = app.flashcards.cards();
            let rows: Vec<_> = cards
                .iter()
                .enumerate()
                .filter(|(_, card)| subject.as_deref().is_none_or(|s| card.subject == s))
                .map(|(idx, card)| (idx + 1, card))
                .collect();
            renderer.print_card_table(&rows)
        }
        CardCommand::Subjects => renderer.print_subjects(&app.flashcards.group_by_subject()),
        CardCommand::Review { position } => {
            let index = position
                .checked_sub(1)
                .ok_or_else(|| anyhow!("card positions start at 1"))?;
            let card = app
                .flashcards
                .mark_reviewed(index)
                .ok_or_else(|| anyhow!("no card at position {position}"))?;
            println!("reviewed ({} times)", card.review_count);
            if let Some(next) = app.flashcards.current() {
                renderer.print_card(app.flashcards.cursor() + 1, next)?;
            }
            Ok(())
        }
        CardCommand::Study { subject } => {
            let count = app.flashcards.study_subject(&subject).len();
            if count == 0 {
                return Err(anyhow!("no cards for subject {subject}"));
            }
            println!("{count} card(s) in {subject}");
            if let Some(card) = app.flashcards.current() {
                renderer.print_card(app.flashcards.cursor() + 1, card)?;
            }
            Ok(())
        }
    }
}

fn dispatch_mood(app: &mut App, renderer: &mut Renderer, cmd: MoodCommand) -> anyhow::Result<()> {
    match cmd {
        MoodCommand::Log { level } => {
            let tips = app.moods.record(level)?;
            let level = app.moods.latest().map(|entry| entry.level).unwrap_or_default();
            renderer.print_recommendations(level, tips)
        }
        MoodCommand::History { count } => {
            let count = count.unwrap_or(app.settings().mood_history);
            renderer.print_mood_history(app.moods.recent_history(count))
        }
        MoodCommand::Trend => {
            let window = app.settings().mood_history;
            println!(
                "{} (average {:.1} over last {window})",
                renderer.trend_label(app.moods.trend()),
                app.moods.average_mood(window)
            );
            Ok(())
        }
    }
}

fn dispatch_timer(app: &mut App, renderer: &mut Renderer, cmd: TimerCommand) -> anyhow::Result<()> {
    match cmd {
        TimerCommand::Run {
            mode,
            minutes,
            seconds,
            periods,
        } => cmd_timer_run(app, mode, minutes, seconds, periods),
        TimerCommand::Stats => renderer.print_stats(app.pomodoro.stats()),
    }
}

#[instrument(skip(app))]
fn cmd_timer_run(
    app: &mut App,
    mode: TimerMode,
    minutes: Option<i64>,
    seconds: Option<u64>,
    periods: u32,
) -> anyhow::Result<()> {
    info!("command timer run");
    app.pomodoro.hooks_mut().subscribe(|change| {
        if let Change::Timer {
            mode,
            remaining_seconds,
            running: true,
        } = change
        {
            if let Err(err) = draw_tick(&mut io::stdout().lock(), *mode, *remaining_seconds) {
                debug!(error = %err, "failed to redraw timer");
            }
        }
    });

    match seconds {
        Some(secs) => app.pomodoro.set_mode_seconds(mode, secs),
        None => app.pomodoro.set_mode(mode, minutes),
    }

    let mut ticks = IntervalTicks::every_second();
    for _ in 0..periods.max(1) {
        app.pomodoro.start();
        let done = app
            .pomodoro
            .run(&mut ticks)
            .context("timer stopped before the period finished")?;
        println!("\r{} finished; next up: {}", done.finished, done.next);
    }
    Ok(())
}

fn dispatch_profile(
    app: &mut App,
    renderer: &mut Renderer,
    cmd: ProfileCommand,
) -> anyhow::Result<()> {
    match cmd {
        ProfileCommand::Show => renderer.print_profile(app.profile.profile()),
        ProfileCommand::Set {
            username,
            display_name,
            avatar,
        } => {
            let mut profile = UserProfile::new(&username)?;
            if let Some(name) = display_name {
                profile.display_name = name;
            }
            profile.avatar = avatar;
            let saved = app.profile.save(profile)?;
            println!("saved profile for {}", saved.greeting_name());
            Ok(())
        }
        ProfileCommand::Clear => {
            app.profile.clear();
            Ok(())
        }
    }
}

fn cmd_dashboard(app: &App, renderer: &mut Renderer, json: bool) -> anyhow::Result<()> {
    let summary = app.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    renderer.print_dashboard(&summary)
}

fn draw_tick(out: &mut impl Write, mode: TimerMode, remaining_seconds: u64) -> io::Result<()> {
    write!(out, "\r{mode:<12} {}", format_clock(remaining_seconds))?;
    out.flush()
}

/// Accepts a 1-based stored position or a full task id.
fn resolve_task(app: &App, raw: &str) -> anyhow::Result<Uuid> {
    let tasks = app.tasks.tasks();
    if let Ok(position) = raw.trim().parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|idx| tasks.get(idx))
            .map(|task| task.id)
            .ok_or_else(|| anyhow!("no task at position {position}"));
    }

    let id = Uuid::parse_str(raw.trim()).with_context(|| format!("invalid task reference: {raw}"))?;
    Ok(id)
}

fn with_positions<'a>(
    app: &App,
    selected: Vec<&'a Task>,
) -> Vec<(usize, &'a Task)> {
    selected
        .into_iter()
        .map(|task| {
            let position = app
                .tasks
                .tasks()
                .iter()
                .position(|stored| stored.id == task.id)
                .map_or(0, |idx| idx + 1);
            (position, task)
        })
        .collect()
}
