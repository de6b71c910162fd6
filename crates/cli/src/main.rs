//! # tokenkeeper
//!
//! Keeps an OAuth2 access token fresh for mail clients on this host.
//!
//! ```text
//! tokenkeeper -a -t microsoft -s /run/user/1000/tk.sock ~/.tokenkeeper/session
//! tokenkeeper -D ~/.tokenkeeper/log -P ~/.tokenkeeper/pid -f ~/.tokenkeeper/token ~/.tokenkeeper/session
//! ```

mod args;
mod logging;
mod service;
mod terminal;

use std::process::ExitCode;

use clap::Parser;
use tokenkeeper_domain::KeeperError;

use crate::args::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args);

    match service::run(&args) {
        Ok(notice) => {
            if let Some(notice) = notice {
                eprintln!("{notice}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            if args.debug {
                eprintln!("tokenkeeper: {err:?}");
            } else {
                eprintln!("tokenkeeper: {err:#}");
            }
            ExitCode::from(err.downcast_ref::<KeeperError>().map_or(1, KeeperError::exit_code))
        }
    }
}
