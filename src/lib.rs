//! Fin Assist — conversational finance assistant core.

pub mod assistant;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod secrets;
pub mod suggestions;
