use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod columns;
mod controller;
mod csvio;
mod domain;
mod generator;
mod highlight;
mod inputter;
mod manager;
mod model;
mod record;
mod ui;
mod view;

use controller::Controller;
use domain::{GridConfig, GridError};
use model::{Model, Status};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(name = "gridview", about, version)]
struct Args {
    /// Number of mock records generated on start.
    #[arg(short, long, default_value_t = 10_000)]
    rows: usize,

    /// Rows per page.
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Csv file loaded before the first frame, replacing the generated rows.
    #[arg(short, long)]
    import: Option<String>,

    /// Where log output goes, the terminal belongs to the table.
    #[arg(long, default_value = "gridview.log")]
    log_file: String,

    /// Start with the dark theme.
    #[arg(long)]
    dark: bool,

    /// Start with single line rows.
    #[arg(long)]
    compact: bool,

    /// Match the global filter case insensitively.
    #[arg(long)]
    ignore_case: bool,
}

impl Args {
    fn config(&self) -> GridConfig {
        let config = GridConfig::default()
            .with_initial_rows(self.rows)
            .with_page_size(self.page_size.max(1))
            .with_dark_mode(self.dark)
            .with_compact_mode(self.compact)
            .with_filter_ignore_case(self.ignore_case);
        match self.import.as_deref() {
            Some(path) => config.with_import_path(csvio::expand_path(path)),
            None => config,
        }
    }
}

fn init_logging(log_file: &Path) -> Result<(), GridError> {
    let file = File::create(log_file)?;
    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_ansi(false);

    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&csvio::expand_path(&args.log_file)) {
        eprintln!("Error: could not open log file {}: {}", args.log_file, e);
        return ExitCode::FAILURE;
    }

    let result = run(args.config());
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Terminated with {e}");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cfg: GridConfig) -> Result<(), GridError> {
    info!("Starting gridview with {cfg:?}");

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&cfg, size.width as usize, size.height as usize)?;
    let mut ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        // Timeouts still reach the model so timers and imports progress
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye");
    Ok(())
}
