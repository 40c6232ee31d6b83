//! Triage Bot — chat community triage: moderation, FAQ answers, mentor routing.

pub mod admin;
pub mod channels;
pub mod config;
pub mod error;
pub mod faq;
pub mod llm;
pub mod moderation;
pub mod pipeline;
pub mod prompts;
pub mod routing;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
