//! Follow-up suggestions.
//!
//! A keyword heuristic: the user's text is matched against a fixed,
//! ordered list of finance topics and the first hit picks the follow-up
//! prompts. It stands in for a ranking model, so callers should depend
//! only on [`suggest`] returning at most three prompts.

use crate::conversation::MAX_SUGGESTIONS;

/// Topics recognised by the heuristic, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Budget,
    Credit,
    Saving,
    Investing,
}

impl Topic {
    /// Match priority. The first topic with a matching keyword wins.
    pub const ALL: [Topic; 4] = [Topic::Budget, Topic::Credit, Topic::Saving, Topic::Investing];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Budget => &["budget"],
            Self::Credit => &["credit"],
            Self::Saving => &["save", "saving"],
            Self::Investing => &["invest"],
        }
    }

    pub fn follow_ups(&self) -> &'static [&'static str; 3] {
        match self {
            Self::Budget => &[
                "Help me track expenses",
                "Best budgeting apps",
                "How to stick to my budget",
            ],
            Self::Credit => &[
                "Check my credit report",
                "Credit building tips",
                "Understanding credit utilization",
            ],
            Self::Saving => &[
                "High-yield savings accounts",
                "Automatic savings tips",
                "Emergency fund calculator",
            ],
            Self::Investing => &[
                "Investment basics",
                "Risk assessment",
                "Portfolio diversification",
            ],
        }
    }
}

/// Used when no topic matches.
pub const DEFAULT_SUGGESTIONS: [&str; 3] = ["Tell me more", "What should I do next?", "Any other tips?"];

/// Attached to the fallback reply after a failed turn.
pub const RECOVERY_SUGGESTIONS: [&str; 3] = ["Try again", "Check connection", "Contact support"];

/// Starter prompts attached to the welcome message.
pub const WELCOME_SUGGESTIONS: [&str; 3] = [
    "How do I build an emergency fund?",
    "What's a good credit score?",
    "Help me create a budget",
];

/// Assistant reply used when the backend could not produce one.
pub const FALLBACK_MESSAGE: &str = "I apologize, but I'm having trouble connecting to my AI service right now. Please try again in a moment.";

/// A preset prompt offered before the user types anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const QUICK_ACTIONS: [QuickAction; 4] = [
    QuickAction {
        label: "Savings Tips",
        prompt: "Give me practical tips for saving money on a tight budget",
    },
    QuickAction {
        label: "Credit Help",
        prompt: "How can I improve my credit score?",
    },
    QuickAction {
        label: "Investment Basics",
        prompt: "Explain investing for beginners",
    },
    QuickAction {
        label: "Banking 101",
        prompt: "What's the difference between checking and savings accounts?",
    },
];

/// First topic whose keyword occurs in `text`, case-insensitively.
pub fn classify(text: &str) -> Option<Topic> {
    let text = text.to_lowercase();
    Topic::ALL
        .into_iter()
        .find(|topic| topic.keywords().iter().any(|kw| text.contains(kw)))
}

/// Follow-up prompts for a user message.
pub fn suggest(user_text: &str) -> Vec<String> {
    let prompts: &[&str] = match classify(user_text) {
        Some(topic) => topic.follow_ups(),
        None => &DEFAULT_SUGGESTIONS,
    };
    prompts
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|s| s.to_string())
        .collect()
}
