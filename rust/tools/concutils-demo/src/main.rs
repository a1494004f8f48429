use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "concutils-demo")]
#[command(about = "Runnable walkthrough of the concutils primitives")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the fastest of several timers
    Or {
        /// Timer delays in milliseconds
        #[arg(short, long, value_delimiter = ',', default_values_t = [2000u64, 1000, 3000])]
        delays: Vec<u64>,
    },

    /// Wait for all of several timers
    And {
        /// Timer delays in milliseconds
        #[arg(short, long, value_delimiter = ',', default_values_t = [1000u64, 2000, 3000])]
        delays: Vec<u64>,
    },

    /// Merge messages from several producers into one stream
    FanIn {
        /// Number of messages per producer
        #[arg(short, long, value_delimiter = ',', default_values_t = [3usize, 2, 4])]
        counts: Vec<usize>,

        /// Pause between two messages of the same producer, in milliseconds
        #[arg(long, default_value_t = 100)]
        interval: u64,
    },

    /// Distribute numbers across several workers by round-robin
    FanOut {
        /// Number of items to send
        #[arg(short, long, default_value_t = 10)]
        items: usize,

        /// Number of worker streams
        #[arg(short, long, default_value_t = 3)]
        workers: usize,
    },

    /// Run a batch of tasks on a bounded worker pool
    Pool {
        /// Number of tasks to submit
        #[arg(short, long, default_value_t = 20)]
        tasks: usize,

        /// Number of pool workers
        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        /// Make every n-th task panic (0 disables failures)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
    },

    /// Run every demo with its default parameters
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Or { delays } => commands::or::run(&delays),
        Commands::And { delays } => commands::and::run(&delays),
        Commands::FanIn { counts, interval } => commands::fan_in::run(&counts, interval),
        Commands::FanOut { items, workers } => commands::fan_out::run(items, workers),
        Commands::Pool {
            tasks,
            workers,
            fail_every,
        } => commands::pool::run(tasks, workers, fail_every),
        Commands::All => commands::run_all(),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
