use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod catalog;
mod controller;
mod dataset;
mod domain;
mod inputter;
mod model;
mod params;
mod query;
mod ui;

use catalog::Catalog;
use controller::Controller;
use domain::{RRConfig, RRError};
use model::{Model, Status};
use ui::TableUI;

/// Browse precomputed Github repository data by topic.
#[derive(Parser, Debug)]
#[command(name = "reporecon", version, about)]
struct Cli {
    /// Directory holding topics.json and the per-topic data files
    #[arg(default_value = "docs")]
    data_dir: String,

    /// Topic to open at startup (resource name or title substring)
    #[arg(short, long)]
    topic: Option<String>,

    /// Initial filter expression, e.g. "owner:devbisme"
    #[arg(short, long)]
    filter: Option<String>,

    /// Initial sort expression, e.g. "stars:desc"
    #[arg(short, long)]
    sort: Option<String>,
}

fn main() -> ExitCode {
    let _guard = init_tracing();
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// Log to a file when RUST_LOG is set; the terminal belongs to the UI.
fn init_tracing() -> Option<WorkerGuard> {
    if std::env::var("RUST_LOG").is_err() {
        return None;
    }
    let file = std::fs::File::create("reporecon.log").ok()?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn run() -> Result<(), RRError> {
    let cli = Cli::parse();
    info!("Starting reporecon!");

    let cfg = RRConfig {
        data_dir: shellexpand::full(&cli.data_dir)
            .map_err(|e| RRError::LoadingFailed(e.to_string()))?
            .to_string(),
        ..RRConfig::default()
    };
    // A missing catalog is fatal; without it there is nothing to browse.
    let catalog = Catalog::load(Path::new(&cfg.data_dir))?;

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    let mut model = Model::init(&cfg, catalog, size.width as usize, size.height as usize);
    model.startup(
        cli.topic.as_deref(),
        cli.filter.as_deref(),
        cli.sort.as_deref(),
    );

    let controller = Controller::new(&cfg);
    let ui = TableUI::new();

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
