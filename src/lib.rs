//! Inbox auto-reply: classify the newest unread email with an LLM and send
//! one deterministically chosen reply.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;
