use chrono::Local;
use clap::Parser;
use env_logger::{Env, Target};
use log::info;
use miette::{IntoDiagnostic, Result};
use std::fs::{self, File};
use std::sync::Arc;
use std::time::Duration;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use navico_radar::config::{self, Config};
use navico_radar::scan::Scanner;
use navico_radar::status::{LogIndicator, StatusIndicator};
use navico_radar::{Cli, PACKAGE, VERSION};

fn init_logging(args: &Cli, config: &Config) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default());
    builder.filter_level(args.log_level.level_filter());

    if args.write_logging {
        fs::create_dir_all(&config.log_dir).into_diagnostic()?;
        let path = config
            .log_dir
            .join(format!("{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        let file = File::create(&path).into_diagnostic()?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = config::load(args.config.as_deref()).into_diagnostic()?;
    init_logging(&args, &config)?;

    info!("{} {} loglevel {:?}", PACKAGE, VERSION, args.log_level);
    info!("Recording to '{}'", config.output_dir.display());

    let indicator: Arc<dyn StatusIndicator> = Arc::new(LogIndicator::new());
    let scanner = Scanner::new(config, indicator);

    Toplevel::new(|s| async move {
        s.start(SubsystemBuilder::new("Scanner", move |a| scanner.run(a)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(5000))
    .await
    .map_err(Into::into)
}
