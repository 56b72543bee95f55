use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Mutex, mpsc};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{debug, error, info, info_span};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod debounce;
mod domain;
mod filter;
mod inputter;
mod links;
mod model;
mod platformer;
mod queue;
mod table;
mod theme;
mod ui;

use controller::Controller;
use domain::{Message, TVConfig, TVError};
use model::{Model, Status};
use platformer::PlatformerConfig;
use table::Dataset;
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Log file, the terminal belongs to the ui
    #[arg(long, global = true)]
    log_file: Option<String>,

    /// Log filter, e.g. `debug` or `tview=trace`. Falls back to RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// View a spreadsheet as a searchable table
    Table(TableArgs),
    /// Run the platformer demo
    Platformer(PlatformerArgs),
}

#[derive(Args, Debug)]
struct TableArgs {
    /// csv, parquet, arrow/ipc/feather, xlsx, xlsm, xls or ods file
    file: String,

    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,

    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Where the theme choice is kept
    #[arg(long)]
    settings: Option<String>,
}

#[derive(Args, Debug)]
struct PlatformerArgs {
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Hold time of a fresh key press on terminals without key release
    /// events, longer than the auto repeat delay
    #[arg(long, default_value_t = 600)]
    key_hold_ms: u64,

    /// Hold time after each auto repeat
    #[arg(long, default_value_t = 150)]
    key_repeat_ms: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Table(args) => run_table(args),
        Command::Platformer(args) => run_platformer(args),
    };
    match result {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(raw: &str) -> Result<PathBuf, TVError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::InvalidArgument(format!("{raw}: {e}")))
}

fn init_logging(cli: &Cli) -> Result<(), TVError> {
    let path = match &cli.log_file {
        Some(raw) => expand_path(raw)?,
        None => std::env::temp_dir().join("tview.log"),
    };
    let file = File::create(&path)?;

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| TVError::InvalidArgument(format!("log level {level}: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(filter)
        .with(ErrorLayer::default())
        .init();
    info!("Logging to {}", path.display());
    Ok(())
}

fn run_table(args: TableArgs) -> Result<(), TVError> {
    let source = expand_path(&args.file)?;
    let mut cfg = TVConfig::default()
        .with_debounce_ms(args.debounce_ms)
        .with_max_column_width(args.max_column_width);
    if let Some(raw) = &args.settings {
        cfg = cfg.with_settings_path(expand_path(raw)?);
    }
    info!("Starting table viewer for {source:?} with {cfg:?}");

    let loaded = spawn_loader(&source);
    let mut terminal = ratatui::init();
    let result = table_loop(&mut terminal, &cfg, &source, loaded);
    ratatui::restore();
    result
}

// The only background work: read the file on a rayon worker and hand the
// result back to the ui loop.
fn spawn_loader(source: &Path) -> mpsc::Receiver<Result<Dataset, TVError>> {
    let (tx, rx) = mpsc::channel();
    let path = source.to_path_buf();
    let span = info_span!("load", path = %path.display());
    rayon::spawn(move || {
        let _guard = span.enter();
        let result = Dataset::load(&path);
        if tx.send(result).is_err() {
            debug!("Viewer closed before loading finished");
        }
    });
    rx
}

fn table_loop(
    terminal: &mut DefaultTerminal,
    cfg: &TVConfig,
    source: &Path,
    loaded: mpsc::Receiver<Result<Dataset, TVError>>,
) -> Result<(), TVError> {
    let mut model = Model::init(cfg, source);
    let ui = TableUI::new();
    let mut controller = Controller::new(cfg);

    let size = terminal.size()?;
    model.update(Some(Message::Resize(size.width as usize, size.height as usize)))?;

    while model.status != Status::QUITTING {
        if model.status == Status::LOADING {
            match loaded.try_recv() {
                Ok(result) => model.finish_loading(result),
                Err(mpsc::TryRecvError::Empty) => (),
                Err(mpsc::TryRecvError::Disconnected) => model.finish_loading(Err(
                    TVError::LoadingFailed("loader stopped without a result".into()),
                )),
            }
        }

        terminal.draw(|f| ui.draw(&model, f))?;

        controller.poll_events(&model)?;
        while let Some(message) = controller.next_message(&model) {
            model.update(Some(message))?;
        }
        model.tick(Instant::now());
    }

    Ok(())
}

fn run_platformer(args: PlatformerArgs) -> Result<(), TVError> {
    let config = PlatformerConfig::default()
        .with_fps(args.fps)
        .with_key_hold_ms(args.key_hold_ms)
        .with_key_repeat_ms(args.key_repeat_ms);
    let _span = info_span!("platformer").entered();
    platformer::run(config)
}
