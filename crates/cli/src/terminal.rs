//! Terminal side of authorization, and the foreground token echo

use std::io::Write;

use tokenkeeper_core::TokenEcho;
use tokenkeeper_infra::AuthorizationPrompt;

/// Talks to the user on stdout while a new session is authorized
pub struct TerminalPrompt;

impl AuthorizationPrompt for TerminalPrompt {
    fn show_authorization_url(&self, url: &str, listener_port: Option<u16>) {
        println!("Please go to {url} and authorize access.");
        if let Some(port) = listener_port {
            println!();
            println!(
                "A listener has been started at localhost:{port}. When you follow the link, \
                 the authorization response will be received automatically."
            );
            println!(
                "If using this system remotely, forward the port to this host by opening a new \
                 SSH session with '-L {port}:localhost:{port}' before following the link."
            );
            println!();
        }
    }

    fn ask_for_redirect(&self) {
        print!("Please enter the full callback URL: ");
        let _ = std::io::stdout().flush();
    }

    fn reject_redirect(&self) {
        println!("Error: No authcode provided.");
    }

    fn redirect_received_from_browser(&self) {
        println!("<canceled>");
        println!("Response provided by browser session.");
    }
}

/// Prints every refreshed access token on its own line
pub struct StdoutEcho;

impl TokenEcho for StdoutEcho {
    fn echo(&self, access_token: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{access_token}");
        let _ = stdout.flush();
    }
}
