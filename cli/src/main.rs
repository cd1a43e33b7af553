mod config;
mod graph;
mod output;
mod render;
mod tree;

use clap::{Parser, Subcommand};
use color_eyre::{config::HookBuilder, eyre::Result};
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter, fmt::format::FmtSpan};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "dew")]
#[command(about = "Render resumable documents from component trees", long_about = None)]
#[command(version, author)]
struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a component tree against a build manifest
    Render(render::RenderArgs),
    /// Print the prefetch graph of manifest symbols
    Graph(graph::GraphArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    HookBuilder::default()
        .display_env_section(false)
        .issue_url("https://github.com/dew-rs/dew/issues/new")
        .panic_section("It looks like the dew CLI encountered a bug")
        .install()?;

    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    output::init(OutputFormat::from_json_flag(cli.json));

    match cli.command {
        Commands::Render(args) => render::run(args),
        Commands::Graph(args) => graph::run(args),
    }
}
