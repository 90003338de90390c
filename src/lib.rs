//! Afu assistant — conversational assistant orchestration core.

pub mod config;
pub mod error;
pub mod gateway;
pub mod log;
pub mod media;
pub mod message;
pub mod notify;
pub mod prompt;
pub mod tools;
pub mod turn;
