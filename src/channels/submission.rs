//! Submission types for the REPL.
//!
//! Everything typed at the prompt is either a question for the assistant
//! or a slash command that acts on the session.

use secrecy::SecretString;

/// Parses user input into Submission types.
pub struct SubmissionParser;

impl SubmissionParser {
    /// Parse one line of input.
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/help" | "/?" => Submission::Help,
            "/history" => Submission::History,
            "/quit" | "/exit" => Submission::Quit,
            "/quick" => Submission::QuickAction { index: None },
            "/key" => Submission::Invalid {
                reason: "usage: /key <api key>".into(),
            },
            "/pick" => Submission::Invalid {
                reason: "usage: /pick <number>".into(),
            },

            _ => parse_complex(trimmed, &lower),
        }
    }
}

/// Parameterized commands, then plain text.
fn parse_complex(trimmed: &str, lower: &str) -> Submission {
    parse_quick(lower)
        .or_else(|| parse_pick(lower))
        .or_else(|| parse_key(trimmed, lower))
        .or_else(|| parse_unknown_command(lower))
        .unwrap_or_else(|| Submission::UserInput {
            content: trimmed.to_string(),
        })
}

/// `/quick <n>` — send the n-th quick action prompt.
fn parse_quick(lower: &str) -> Option<Submission> {
    let rest = lower.strip_prefix("/quick ")?.trim();
    Some(match parse_index(rest) {
        Some(index) => Submission::QuickAction { index: Some(index) },
        None => Submission::Invalid {
            reason: format!("'{rest}' is not a quick action number"),
        },
    })
}

/// `/pick <n>` — send the n-th suggestion of the latest reply.
fn parse_pick(lower: &str) -> Option<Submission> {
    let rest = lower.strip_prefix("/pick ")?.trim();
    Some(match parse_index(rest) {
        Some(index) => Submission::PickSuggestion { index },
        None => Submission::Invalid {
            reason: format!("'{rest}' is not a suggestion number"),
        },
    })
}

/// `/key <secret>` — store a new API key. The key keeps its case.
fn parse_key(trimmed: &str, lower: &str) -> Option<Submission> {
    if !lower.starts_with("/key ") {
        return None;
    }
    let secret = trimmed.get("/key ".len()..)?.trim();
    Some(Submission::SetKey {
        secret: SecretString::from(secret),
    })
}

fn parse_unknown_command(lower: &str) -> Option<Submission> {
    let command = lower.strip_prefix('/')?.split_whitespace().next()?;
    Some(Submission::Invalid {
        reason: format!("unknown command '/{command}' (try /help)"),
    })
}

/// 1-based number as typed, converted to a 0-based index.
fn parse_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()?.checked_sub(1)
}

/// A parsed line of REPL input.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Text for the assistant (starts a new turn).
    UserInput { content: String },

    /// Send a preset prompt, or list them when no index is given.
    QuickAction { index: Option<usize> },

    /// Send one of the latest reply's suggestions.
    PickSuggestion { index: usize },

    /// Replace the API key and reconfigure the backend.
    SetKey { secret: SecretString },

    /// Print the conversation so far.
    History,

    Help,

    Quit,

    /// Malformed command; `reason` is shown to the user.
    Invalid { reason: String },
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn plain_text_is_user_input() {
        match SubmissionParser::parse("  How do I save more?  ") {
            Submission::UserInput { content } => assert_eq!(content, "How do I save more?"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn simple_commands() {
        assert!(matches!(SubmissionParser::parse("/help"), Submission::Help));
        assert!(matches!(SubmissionParser::parse("/HISTORY"), Submission::History));
        assert!(matches!(SubmissionParser::parse("/exit"), Submission::Quit));
        assert!(matches!(
            SubmissionParser::parse("/quick"),
            Submission::QuickAction { index: None }
        ));
    }

    #[test]
    fn numbered_commands_are_one_based() {
        assert!(matches!(
            SubmissionParser::parse("/quick 2"),
            Submission::QuickAction { index: Some(1) }
        ));
        assert!(matches!(
            SubmissionParser::parse("/pick 1"),
            Submission::PickSuggestion { index: 0 }
        ));
        assert!(matches!(
            SubmissionParser::parse("/pick 0"),
            Submission::Invalid { .. }
        ));
        assert!(matches!(
            SubmissionParser::parse("/quick two"),
            Submission::Invalid { .. }
        ));
    }

    #[test]
    fn key_preserves_case() {
        match SubmissionParser::parse("/key  sk-AbC123 ") {
            Submission::SetKey { secret } => assert_eq!(secret.expose_secret(), "sk-AbC123"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            SubmissionParser::parse("/key"),
            Submission::Invalid { .. }
        ));
    }

    #[test]
    fn unknown_command() {
        match SubmissionParser::parse("/budget now") {
            Submission::Invalid { reason } => assert!(reason.contains("/budget")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
