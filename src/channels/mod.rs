//! User-facing boundaries around a conversation.

pub mod cli;
pub mod submission;

pub use cli::{CliChannel, Outcome};
pub use submission::{Submission, SubmissionParser};
