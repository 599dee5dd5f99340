//! CLI command definitions for the `tungs` binary.
//!
//! Uses clap derive macros for argument parsing. Every command runs against
//! the session restored from the local cache and reconciles with the backend
//! as needed.

pub mod account;
pub mod config;
pub mod output;
pub mod status;
pub mod usage;
pub mod watch;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Sign in, track message quota, and keep usage in sync with the backend.
#[derive(Parser)]
#[command(name = "tungs", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Backend-of-record base URL, overriding `config.toml`.
    #[arg(long, global = true, env = "TUNGS_BACKEND_URL")]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and reconcile the profile with the backend.
    Login {
        /// Email address of the account.
        #[arg(long)]
        email: String,

        /// External identity id issued by the identity provider.
        #[arg(long, conflicts_with = "local")]
        id: Option<String>,

        /// Display name (defaults to the local part of the email).
        #[arg(long)]
        name: Option<String>,

        /// Email-only login without an identity provider.
        #[arg(long)]
        local: bool,
    },

    /// Sign out and clear the local session.
    Logout,

    /// Show the current session and quota.
    Status,

    /// Consume one message from the quota.
    Send {
        /// Number of messages to send, each checked separately.
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Flush queued usage and refresh the profile from the backend.
    Sync,

    /// Read identity provider notifications (JSON lines) from stdin and
    /// print session events until stdin closes or Ctrl+C.
    Watch,

    /// Show the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_login_with_identity() {
        let cli = Cli::try_parse_from([
            "tungs", "login", "--email", "ada@example.com", "--id", "u1", "--name", "Ada",
        ])
        .unwrap();
        match cli.command {
            Commands::Login {
                email,
                id,
                name,
                local,
            } => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(id.as_deref(), Some("u1"));
                assert_eq!(name.as_deref(), Some("Ada"));
                assert!(!local);
            }
            _ => panic!("expected login"),
        }
    }

    #[test]
    fn local_login_conflicts_with_id() {
        let parsed = Cli::try_parse_from([
            "tungs", "login", "--email", "a@b.c", "--id", "u1", "--local",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tungs", "send", "-n", "3", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Send { count: 3 }));
    }

    #[test]
    fn send_defaults_to_one() {
        let cli = Cli::try_parse_from(["tungs", "send"]).unwrap();
        assert!(matches!(cli.command, Commands::Send { count: 1 }));
    }
}
