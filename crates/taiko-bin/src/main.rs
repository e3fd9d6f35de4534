use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tja_model::{BranchKind, Difficulty};

mod commands;

#[derive(Parser)]
#[command(name = "taiko")]
#[command(about = "TJA chart inspector and headless player", version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show header, courses and note statistics of a chart
    Info {
        chart: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a course with perfectly timed input
    Autoplay {
        chart: PathBuf,

        #[arg(short, long, default_value = "oni")]
        course: Difficulty,

        /// Play a single branch path instead of resolving checkpoints
        #[arg(short, long)]
        branch: Option<BranchKind>,

        /// Play config JSON (windows, scoring, gauge)
        #[arg(long, env = "TAIKO_PLAY_CONFIG")]
        config: Option<PathBuf>,

        /// Clock step in milliseconds
        #[arg(long, default_value_t = 16.0)]
        frame_ms: f64,

        /// Save the generated input as a replay log
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Feed a recorded input log through a course
    Replay {
        chart: PathBuf,

        #[arg(short, long, default_value = "oni")]
        course: Difficulty,

        /// JSON array of {time, lane, big}
        #[arg(short, long)]
        inputs: PathBuf,

        #[arg(short, long)]
        branch: Option<BranchKind>,

        #[arg(long, env = "TAIKO_PLAY_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 16.0)]
        frame_ms: f64,

        /// Print every judgment, not just the summary
        #[arg(long)]
        judgments: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Info { chart, json } => commands::info::run(&chart, json),
        Command::Autoplay {
            chart,
            course,
            branch,
            config,
            frame_ms,
            record,
        } => {
            let target = commands::PlayTarget {
                chart,
                course,
                branch,
                config,
            };
            commands::autoplay::run(&target, frame_ms, record.as_deref())
        }
        Command::Replay {
            chart,
            course,
            inputs,
            branch,
            config,
            frame_ms,
            judgments,
        } => {
            let target = commands::PlayTarget {
                chart,
                course,
                branch,
                config,
            };
            commands::replay::run(&target, &inputs, frame_ms, judgments)
        }
    }
}
