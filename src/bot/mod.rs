/// Command grammar and status-code normalization
pub mod commands;
/// Quota buckets and the rate-limit pipeline
pub mod cooldown;
/// Command handling and the error policy
pub mod dispatch;
/// Help text rendering
pub mod help;

pub use commands::Command;
pub use cooldown::RateLimiter;
pub use dispatch::Invocation;
