use serde::Deserialize;

use super::service::IntakeError;

/// What a slash command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Generate images from the command text.
    Generate,
}

/// Slash commands this service answers to.
pub const COMMANDS: &[(&str, CommandKind)] = &[("/diffusion", CommandKind::Generate)];

/// Look up a slash command by name.
pub fn route_command(name: &str) -> Result<CommandKind, IntakeError> {
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| IntakeError::UnknownCommand(name.to_string()))
}

/// The fields of an inbound slash command this service uses.
///
/// Field names follow the platform's form encoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "channel_id")]
    pub conversation_id: String,
    #[serde(rename = "user_id")]
    pub requester_id: String,
    #[serde(default)]
    pub response_url: String,
}

impl CommandRequest {
    /// The command as the requester typed it.
    pub fn echo_text(&self) -> String {
        if self.text.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.text)
        }
    }
}
