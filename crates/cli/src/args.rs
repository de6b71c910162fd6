//! Command-line surface

use std::path::PathBuf;

use clap::Parser;
use tokenkeeper_domain::constants::MAX_REFRESH_THRESHOLD_SECS;

/// Keep an OAuth2 access token fresh for local mail clients.
///
/// The token is refreshed shortly before it expires and published through
/// a Unix socket, a file, or (when neither is given) standard output.
#[derive(Debug, Parser)]
#[command(name = "tokenkeeper", version)]
pub struct Args {
    /// Log refreshes and listener activity
    #[arg(short, long)]
    pub verbose: bool,

    /// Log everything and print full error chains
    #[arg(short, long)]
    pub debug: bool,

    /// Authorize a new session instead of loading an existing one
    #[arg(short, long)]
    pub authorize: bool,

    /// OAuth client id, overriding the provider's
    #[arg(short, long, value_name = "ID")]
    pub client_id: Option<String>,

    /// Port for the local authorization callback listener (0 picks any)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Detach into the background, logging to LOGFILE
    #[arg(short = 'D', long = "daemonize", value_name = "LOGFILE")]
    pub log_file: Option<PathBuf>,

    /// Keep the current access token in this file
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Pidfile guarding against a second instance
    #[arg(short = 'P', long, value_name = "PATH")]
    pub pidfile: Option<PathBuf>,

    /// Answer token requests on this Unix socket
    #[arg(short, long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Provider to authorize against
    #[arg(short = 't', long, value_name = "NAME")]
    pub provider: Option<String>,

    /// Only log errors
    #[arg(short, long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Refresh this many seconds before expiry [default: 300]
    #[arg(
        short = 'T',
        long,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(i64).range(0..=MAX_REFRESH_THRESHOLD_SECS)
    )]
    pub threshold: Option<i64>,

    /// Overwrite an existing session file when authorizing
    #[arg(long)]
    pub force: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Encrypted session file
    #[arg(value_name = "SESSION_FILE")]
    pub session_file: PathBuf,
}

impl Args {
    #[must_use]
    pub fn daemonize(&self) -> bool {
        self.log_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from([
            "tokenkeeper", "-a", "-t", "microsoft", "-c", "abc", "-p", "8080", "-s", "/run/tk.sock",
            "-f", "/run/tk.token", "-P", "/run/tk.pid", "-D", "/var/log/tk.log", "-T", "120",
            "session.enc",
        ])
        .unwrap();

        assert!(args.authorize);
        assert_eq!(args.provider.as_deref(), Some("microsoft"));
        assert_eq!(args.client_id.as_deref(), Some("abc"));
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.threshold, Some(120));
        assert!(args.daemonize());
        assert_eq!(args.session_file, PathBuf::from("session.enc"));
    }

    #[test]
    fn test_session_file_is_required() {
        assert!(Args::try_parse_from(["tokenkeeper", "-v"]).is_err());
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        assert!(Args::try_parse_from(["tokenkeeper", "-T", "-5", "s"]).is_err());
    }

    #[test]
    fn test_threshold_above_one_week_is_rejected() {
        assert!(Args::try_parse_from(["tokenkeeper", "-T", "604800", "s"]).is_ok());
        assert!(Args::try_parse_from(["tokenkeeper", "-T", "604801", "s"]).is_err());
        assert!(Args::try_parse_from(["tokenkeeper", "-T", "9223372036854775807", "s"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["tokenkeeper", "-q", "-v", "s"]).is_err());
    }
}
