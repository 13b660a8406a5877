use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::TaskFilter;
use crate::timer::TimerMode;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "focusboard",
    version,
    about = "Tasks, flashcards, moods and a focus timer, stored locally"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Keep everything in memory for this run.
    #[arg(long = "ephemeral", global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage flashcards
    #[command(subcommand)]
    Card(CardCommand),
    /// Log and review moods
    #[command(subcommand)]
    Mood(MoodCommand),
    /// Run the focus timer
    #[command(subcommand)]
    Timer(TimerCommand),
    /// Show or edit the user profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Summary of today, this week and focus stats
    Dashboard {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    Add(TaskAddArgs),
    List {
        #[arg(long, short = 'f')]
        filter: Option<TaskFilter>,
    },
    /// Toggle completion
    Done { task: String },
    Delete { task: String },
    Today,
    Upcoming {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TaskAddArgs {
    pub title: String,

    /// ISO date, today, tomorrow, a weekday or +Nd
    #[arg(long, short = 'd', default_value = "today")]
    pub date: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, short = 'm', allow_negative_numbers = true)]
    pub minutes: Option<i64>,

    #[arg(long, short = 'p')]
    pub priority: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CardCommand {
    Add {
        subject: String,
        question: String,
        answer: String,
    },
    List {
        #[arg(long, short = 's')]
        subject: Option<String>,
    },
    Subjects,
    /// Mark the card at a 1-based position as reviewed
    Review { position: usize },
    /// Show the first card of a subject
    Study { subject: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MoodCommand {
    Log {
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    History {
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
    Trend,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TimerCommand {
    Run {
        #[arg(long, default_value = "work")]
        mode: TimerMode,

        #[arg(long, allow_negative_numbers = true)]
        minutes: Option<i64>,

        /// Period length in seconds; overrides --minutes
        #[arg(long)]
        seconds: Option<u64>,

        /// Keep going into the following periods
        #[arg(long, default_value_t = 1)]
        periods: u32,
    },
    Stats,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    Show,
    Set {
        #[arg(long)]
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    Clear,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
