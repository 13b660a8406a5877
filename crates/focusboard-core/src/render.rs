use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::dashboard::DashboardSummary;
use crate::flashcard::{Flashcard, SubjectGroups};
use crate::mood::{MoodEntry, Trend};
use crate::stats::SessionStats;
use crate::task::{Priority, Task};
use crate::user::UserProfile;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.get_bool("color").unwrap_or(true),
        }
    }

    /// `positions` are the 1-based stored positions used to address tasks.
    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&mut self, tasks: &[(usize, &Task)]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "#".to_string(),
            "Date".to_string(),
            "Pri".to_string(),
            "Min".to_string(),
            "Done".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for (position, task) in tasks {
            let priority = match task.priority {
                Priority::High => self.paint(task.priority.as_str(), "31"),
                Priority::Medium => task.priority.as_str().to_string(),
                Priority::Low => self.paint(task.priority.as_str(), "2"),
            };
            let done = if task.completed {
                self.paint("x", "32")
            } else {
                String::new()
            };

            rows.push(vec![
                self.paint(&position.to_string(), "33"),
                task.date.format("%Y-%m-%d").to_string(),
                priority,
                task.estimated_minutes.to_string(),
                done,
                task.title.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        if !task.description.is_empty() {
            writeln!(out, "desc      {}", task.description)?;
        }
        writeln!(out, "date      {}", task.date)?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "minutes   {}", task.estimated_minutes)?;
        writeln!(out, "completed {}", task.completed)?;
        writeln!(out, "created   {}", task.created_at.format("%Y-%m-%d %H:%M"))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, cards))]
    pub fn print_card_table(&mut self, cards: &[(usize, &Flashcard)]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec![
            "#".to_string(),
            "Subject".to_string(),
            "Reviews".to_string(),
            "Question".to_string(),
        ];
        let rows = cards
            .iter()
            .map(|(position, card)| {
                vec![
                    self.paint(&position.to_string(), "33"),
                    card.subject.clone(),
                    card.review_count.to_string(),
                    card.question.clone(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_card(&mut self, position: usize, card: &Flashcard) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{} [{}]", self.paint(&format!("#{position}"), "33"), card.subject)?;
        writeln!(out, "Q: {}", card.question)?;
        writeln!(out, "A: {}", card.answer)?;
        Ok(())
    }

    pub fn print_subjects(&mut self, groups: &SubjectGroups) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["Subject".to_string(), "Cards".to_string()];
        let rows = groups
            .subjects
            .iter()
            .map(|subject| {
                let count = groups.counts.get(subject).copied().unwrap_or_default();
                vec![subject.clone(), count.to_string()]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_mood_history(&mut self, entries: &[MoodEntry]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["Date".to_string(), "Level".to_string(), String::new()];
        let rows = entries
            .iter()
            .map(|entry| {
                vec![
                    entry.display_date.clone(),
                    entry.level.to_string(),
                    "*".repeat(usize::from(entry.level)),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_recommendations(&mut self, level: u8, tips: &[&str]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Logged mood {level}. Some ideas:")?;
        for tip in tips {
            writeln!(out, "  - {tip}")?;
        }
        Ok(())
    }

    pub fn trend_label(&self, trend: Trend) -> String {
        match trend {
            Trend::Improving => self.paint("improving", "32"),
            Trend::Declining => self.paint("declining", "31"),
            Trend::Stable | Trend::Neutral => trend.to_string(),
        }
    }

    pub fn print_stats(&mut self, stats: &SessionStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "sessions      {}", stats.completed_session_count)?;
        writeln!(out, "focus hours   {:.1}", stats.total_focus_hours())?;
        writeln!(out, "streak        {}", stats.current_streak)?;
        writeln!(out, "best streak   {}", stats.best_streak)?;
        Ok(())
    }

    pub fn print_profile(&mut self, profile: Option<&UserProfile>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        match profile {
            Some(profile) => {
                writeln!(out, "username  {}", profile.username)?;
                writeln!(out, "name      {}", profile.greeting_name())?;
                writeln!(
                    out,
                    "avatar    {}",
                    if profile.avatar.is_some() { "set" } else { "none" }
                )?;
            }
            None => writeln!(out, "no profile saved")?,
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, summary))]
    pub fn print_dashboard(&mut self, summary: &DashboardSummary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let weekly = &summary.weekly;
        writeln!(out, "completed today  {}", summary.completed_today)?;
        writeln!(
            out,
            "this week        {}/{} {} {:.0}%",
            weekly.completed,
            weekly.target,
            progress_bar(weekly.percent, 20),
            weekly.percent
        )?;
        writeln!(
            out,
            "open tasks       {} ({} upcoming)",
            summary.pending_tasks, summary.upcoming_tasks
        )?;
        writeln!(
            out,
            "focus streak     {} (best {})",
            summary.current_streak, summary.best_streak
        )?;
        writeln!(
            out,
            "focus time       {:.1}h over {} sessions",
            summary.total_focus_hours, summary.completed_sessions
        )?;
        writeln!(
            out,
            "mood             {:.1} avg, {}",
            summary.average_mood,
            self.trend_label(summary.mood_trend)
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
