use clap::Parser;
use std::path::PathBuf;
use stepsim::config;
use stepsim::game::autoplay::autoplay;
use stepsim::game::gameplay;
use stepsim::game::parsing::simfile::load_chart_file;

#[derive(Parser)]
#[command(name = "stepsim", version, about = "Parse an SSC chart and autoplay one of its levels")]
struct Cli {
    /// Path to the .ssc chart
    chart: PathBuf,

    /// Level index, easiest first
    #[arg(default_value_t = 0)]
    level: usize,

    /// Print the parsed chart as JSON before playing
    #[arg(long)]
    dump: bool,

    /// Print every engine event as a JSON line
    #[arg(long)]
    events: bool,

    /// Config file to use instead of stepsim.ini
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let cli = Cli::parse();
    match &cli.config {
        Some(path) => config::load_path(path),
        None => config::load(),
    }
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let chart = load_chart_file(&cli.chart)?;
    if cli.dump {
        println!("{}", serde_json::to_string_pretty(&chart)?);
    }

    let mut state = gameplay::init(cfg.game());
    if cli.events {
        state.events.on_all(|event| match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => log::error!("Failed to serialize event: {e}"),
        });
    }

    let snapshot = autoplay(&mut state, &chart, cli.level)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
