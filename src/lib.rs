#![deny(missing_docs)]
//! httpcat-bot
//!
//! A Telegram bot that answers HTTP status codes with the matching
//! http.cat picture. One real command, a process-wide picture cache,
//! and a layered cooldown pipeline; the rest is plumbing.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Picture fetching and caching
pub mod images;
