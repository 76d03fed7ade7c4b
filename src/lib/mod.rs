use clap::Parser;
use std::path::PathBuf;

pub mod config;
pub mod locator;
pub mod navico;
pub mod network;
pub mod radar;
pub mod recording;
pub mod scan;
pub mod status;
pub mod util;
pub mod watchdog;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PACKAGE: &str = env!("CARGO_PKG_NAME");

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Navico radar controller and raw spoke recorder")]
pub struct Cli {
    /// Configuration directory (holding navico-radar.json) or file
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short = 'L', long, value_enum, ignore_case = true, default_value_t)]
    pub log_level: LogLevel,

    /// Write the log to a timestamped file in the configured log directory
    #[arg(short = 'W', long, default_value_t = false)]
    pub write_logging: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arguments() {
        let cli =
            Cli::try_parse_from(["navico-radar", "-L", "DEBUG", "-W", "/etc/radar"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(cli.write_logging);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/radar")));

        let cli = Cli::try_parse_from(["navico-radar", "--log-level", "warning"]).unwrap();
        assert_eq!(cli.log_level.level_filter(), log::LevelFilter::Warn);
        assert!(cli.config.is_none());
        assert!(!cli.write_logging);
    }

    #[test]
    fn default_log_level() {
        let cli = Cli::try_parse_from(["navico-radar"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Info);
        assert!(Cli::try_parse_from(["navico-radar", "-L", "TRACE"]).is_err());
    }
}
