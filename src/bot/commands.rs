//! Command grammar and status-code normalization
//!
//! Besides the three explicit commands, any other text message counts as
//! an implicit image query: the whole message body is read as a status
//! code, exactly as if it had been passed to `http`.

use crate::config::{DEFAULT_CODE, UNREADABLE_CODE, VALID_RANGES};
use rand::Rng;
use teloxide::utils::command::{BotCommands, ParseError};

/// Commands the bot answers to
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    /// The argument is the rest of the message, so `/http 404` and a bare
    /// `404` resolve to the same invocation.
    #[command(description = "cat picture for a status code", parse_with = optional_rest)]
    Http {
        /// Raw query text, already trimmed, absent when the message was bare
        code: Option<String>,
    },
    /// A cat for one random code out of [`VALID_RANGES`].
    #[command(description = "cat picture for a random status code")]
    Random,
    /// The overview, or one command's page when a name is given.
    #[command(description = "how to use this bot", parse_with = optional_rest)]
    Help {
        /// Command name to describe, absent for the overview
        command: Option<String>,
    },
}

impl Command {
    /// Name the command is registered and rate-limited under
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Random => "random",
            Self::Help { .. } => "help",
        }
    }
}

/// Accepts the whole remainder of the message as one optional argument
///
/// The default parser splits on whitespace and rejects surplus words;
/// here `404 pls` must stay one query (and later normalize to 422, since
/// it is not a number).
fn optional_rest(input: String) -> Result<(Option<String>,), ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok((None,))
    } else {
        Ok((Some(trimmed.to_string()),))
    }
}

/// Reads a query as a status code
///
/// Absent input falls back to 400, anything that does not read as a
/// `u16` becomes 422. No range validation happens here: any number is
/// passed through and the image provider gets to answer for unknown
/// codes.
#[must_use]
pub fn normalize_code(raw: Option<&str>) -> u16 {
    match raw {
        None => DEFAULT_CODE,
        Some(text) => text.trim().parse().unwrap_or(UNREADABLE_CODE),
    }
}

/// Draws a random status code: one of the six ranges uniformly, then one
/// code uniformly within it
///
/// Codes in narrow ranges come up more often than codes in wide ones;
/// 599 alone is as likely as the whole 4xx block. That skew is part of
/// the bot's behavior, not a bug to fix.
pub fn random_code<R: Rng>(rng: &mut R) -> u16 {
    let (lo, hi) = VALID_RANGES[rng.gen_range(0..VALID_RANGES.len())];
    rng.gen_range(lo..=hi)
}
