//! Logging setup
//!
//! Events go to stderr, which is the log file once the daemon has detached.
//! `RUST_LOG` replaces the level picked from the command line.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::args::Args;

const CRATES: [&str; 5] =
    ["tokenkeeper", "tokenkeeper_common", "tokenkeeper_core", "tokenkeeper_domain", "tokenkeeper_infra"];

/// Level for this program's own events
fn level(args: &Args) -> Level {
    if args.quiet {
        Level::ERROR
    } else if args.debug {
        Level::DEBUG
    } else if args.verbose || args.daemonize() {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// Filter directives: our crates at `level`, dependencies at warn or below.
fn directives(level: Level) -> String {
    let floor = if level < Level::WARN { level } else { Level::WARN };
    let mut directives = floor.as_str().to_ascii_lowercase();
    for krate in CRATES {
        directives.push_str(&format!(",{krate}={}", level.as_str().to_ascii_lowercase()));
    }
    directives
}

pub fn init(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(level(args))));
    let ansi = !args.daemonize() && std::io::stderr().is_terminal();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(ansi).with_target(args.debug))
        .init();
}
