use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chatsync",
    about = "Conversation sync client for the chat API"
)]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List conversations with unread counters
    Conversations {
        /// Number of list pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Print the history of a conversation
    Open {
        conversation_id: i64,
        /// Older history pages to load on top of the newest one
        #[arg(long, default_value_t = 0)]
        older: u32,
    },
    /// Print the private history shared with a user
    History {
        user_id: i64,
        /// The peer is an admin account
        #[arg(long)]
        admin: bool,
        /// History page, 1 being the newest
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Send a message to a conversation
    Send { conversation_id: i64, text: String },
    /// Start (or reuse) a private conversation with a user
    Start {
        user_id: i64,
        /// The peer is an admin account
        #[arg(long)]
        admin: bool,
    },
    /// Walk through a sync session against the built-in demo backend
    Demo,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Demo)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn defaults_to_demo_when_command_is_missing() {
        let cli = Cli::parse_from(["chatsync"]);

        assert_eq!(cli.command_or_default(), Command::Demo);
    }

    #[test]
    fn parses_open_with_older_pages_and_config() {
        let cli = Cli::parse_from(["chatsync", "open", "42", "--older", "2", "--config", "custom.toml"]);

        assert_eq!(
            cli.command_or_default(),
            Command::Open {
                conversation_id: 42,
                older: 2
            }
        );
        assert_eq!(
            cli.config
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("custom.toml".to_owned())
        );
    }

    #[test]
    fn parses_send_text_argument() {
        let cli = Cli::parse_from(["chatsync", "send", "7", "hello there"]);

        assert_eq!(
            cli.command_or_default(),
            Command::Send {
                conversation_id: 7,
                text: "hello there".to_owned()
            }
        );
    }

    #[test]
    fn parses_start_with_admin_flag() {
        let cli = Cli::parse_from(["chatsync", "start", "9", "--admin"]);

        assert_eq!(
            cli.command_or_default(),
            Command::Start {
                user_id: 9,
                admin: true
            }
        );
    }

    #[test]
    fn parses_history_with_defaults() {
        let cli = Cli::parse_from(["chatsync", "history", "3"]);

        assert_eq!(
            cli.command_or_default(),
            Command::History {
                user_id: 3,
                admin: false,
                page: 1
            }
        );
    }
}
