//! Slash commands understood by the terminal front end.
//!
//! Anything starting with `/` is a command and is never sent to the backend.

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Send the last prompt again.
    Retry,

    /// Change the model.
    Model(String),

    /// Set the maximum tokens per response.
    MaxTokens(u32),

    /// Set the sampling temperature.
    Temperature(f32),

    /// Display help information.
    Help,

    /// Exit.
    Quit,

    /// Show the current configuration.
    ShowConfig,

    /// The input looked like a command but could not be parsed.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `None` if the input should be sent as a prompt.
///
/// # Examples
///
/// ```
/// # use streamchat::commands::{parse_command, ChatCommand};
/// assert_eq!(parse_command("/retry"), Some(ChatCommand::Retry));
/// assert!(parse_command("/model llama3").is_some());
/// assert!(parse_command("Hello there").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "retry" | "r" => ChatCommand::Retry,
        "config" => ChatCommand::ShowConfig,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "max_tokens" => match argument.map(str::parse::<u32>) {
            Some(Ok(value)) if value > 0 => ChatCommand::MaxTokens(value),
            Some(_) => ChatCommand::Invalid("/max_tokens expects a positive integer".to_string()),
            None => ChatCommand::Invalid("/max_tokens requires a value".to_string()),
        },
        "temperature" => match argument {
            Some(arg) => match parse_f32_in_range(arg, 0.0, 2.0) {
                Ok(value) => ChatCommand::Temperature(value),
                Err(err) => ChatCommand::Invalid(format!("/temperature {err}")),
            },
            None => ChatCommand::Invalid("/temperature requires a value".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_f32_in_range(value: &str, min: f32, max: f32) -> Result<f32, String> {
    match value.parse::<f32>() {
        Ok(parsed) if parsed.is_finite() && (min..=max).contains(&parsed) => Ok(parsed),
        _ => Err(format!("expects a value between {min} and {max}")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /retry                 Send the last prompt again
  /model <name>          Change the model
  /max_tokens <n>        Set maximum response tokens
  /temperature <v>       Set temperature 0.0-2.0
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit

Press Ctrl+C while a reply is streaming to interrupt it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("  what is 1/2?"), None);
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command(" /RETRY "), Some(ChatCommand::Retry));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model  llama3:8b "),
            Some(ChatCommand::Model("llama3:8b".to_string()))
        );
        assert!(matches!(parse_command("/model"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn parse_max_tokens() {
        assert_eq!(parse_command("/max_tokens 256"), Some(ChatCommand::MaxTokens(256)));
        assert!(matches!(parse_command("/max_tokens 0"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(parse_command("/max_tokens lots"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(parse_command("/max_tokens"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn parse_temperature() {
        assert_eq!(parse_command("/temperature 1.5"), Some(ChatCommand::Temperature(1.5)));
        assert!(matches!(parse_command("/temperature 2.5"), Some(ChatCommand::Invalid(_))));
        assert!(matches!(parse_command("/temperature NaN"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn help_mentions_every_command() {
        let help = help_text();
        for name in ["/retry", "/model", "/max_tokens", "/temperature", "/config", "/help", "/quit"] {
            assert!(help.contains(name), "{name} missing from help");
        }
    }
}
