use clap::{Parser, Subcommand};

use lha_scheduler::Cadence;

/// Crate version plus the commit it was built from.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("LHA_GIT_SHA"), ")");

/// Lighthouse audit scheduler.
#[derive(Debug, Parser)]
#[command(name = "lha-daemon", version = VERSION, about)]
pub struct Cli {
    /// Path to lha.toml (falls back to LHA_CONFIG, then ~/.lha/lha.toml).
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the scheduler until Ctrl-C (default).
    Run,
    /// Run one batch of a cadence now and print its summary as JSON.
    Fire {
        /// ten-minutes, hourly, daily, weekend or monthly.
        cadence: Cadence,
    },
    /// Print the next fire time of every armed cadence.
    Next,
    /// List reports that never reached a queue.
    Orphans,
}

impl Cli {
    /// `--config` if given, otherwise `LHA_CONFIG`.
    pub fn config_path(&self) -> Option<String> {
        self.config
            .clone()
            .or_else(|| std::env::var("LHA_CONFIG").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["lha-daemon"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn fire_parses_cadence_names() {
        let cli = Cli::try_parse_from(["lha-daemon", "fire", "ten-minutes"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Fire {
                cadence: Cadence::TenMinutes
            })
        );
    }

    #[test]
    fn fire_rejects_unknown_cadence() {
        assert!(Cli::try_parse_from(["lha-daemon", "fire", "yearly"]).is_err());
    }

    #[test]
    fn version_carries_the_build_commit() {
        assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(VERSION.contains(env!("LHA_GIT_SHA")));

        let err = Cli::try_parse_from(["lha-daemon", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains(VERSION));
    }

    #[test]
    fn explicit_config_wins() {
        let cli = Cli::try_parse_from(["lha-daemon", "next", "--config", "/etc/lha.toml"]).unwrap();
        assert_eq!(cli.config_path().as_deref(), Some("/etc/lha.toml"));
        assert_eq!(cli.command, Some(Command::Next));
    }
}
