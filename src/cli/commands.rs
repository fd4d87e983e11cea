//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - participants: list configured personas
//! - conversations: list stored conversations
//! - simulate: replay scripted messages through the scoring model
//! - chat: interactive session with live scheduling

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Symposium - several personas, one conversation
#[derive(Parser, Debug)]
#[command(name = "symposium")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to chat)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured participants
    Participants,

    /// List stored conversations
    Conversations,

    /// Print logits and selection odds after each scripted message
    Simulate {
        /// Messages in order; "alpha: text" is spoken by participant alpha, anything else by the user
        #[arg(required = true)]
        messages: Vec<String>,

        /// Override the selection temperature
        #[arg(short, long)]
        temperature: Option<f64>,
    },

    /// Chat with the configured participants
    Chat {
        /// Resume an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Title for a new conversation
        #[arg(short, long)]
        title: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        // No args should result in None command (chat mode)
        let cli = Cli::try_parse_from(["symposium"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["symposium", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["symposium", "-c", "/path/to/symposium.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/symposium.yml")));
    }

    #[test]
    fn test_participants_command() {
        let cli = Cli::try_parse_from(["symposium", "participants"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Participants)));
    }

    #[test]
    fn test_simulate_command() {
        let cli = Cli::try_parse_from(["symposium", "simulate", "Hey Beta", "beta: hi", "-t", "0.5"]).unwrap();
        match cli.command {
            Some(Commands::Simulate { messages, temperature }) => {
                assert_eq!(messages, vec!["Hey Beta".to_string(), "beta: hi".to_string()]);
                assert_eq!(temperature, Some(0.5));
            }
            _ => panic!("Expected simulate command"),
        }
    }

    #[test]
    fn test_simulate_requires_messages() {
        assert!(Cli::try_parse_from(["symposium", "simulate"]).is_err());
    }

    #[test]
    fn test_chat_command() {
        let cli = Cli::try_parse_from(["symposium", "chat", "--conversation", "conv-1"]).unwrap();
        match cli.command {
            Some(Commands::Chat { conversation, title }) => {
                assert_eq!(conversation.as_deref(), Some("conv-1"));
                assert!(title.is_none());
            }
            _ => panic!("Expected chat command"),
        }
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["symposium", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
