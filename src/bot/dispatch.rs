//! Command handling pipeline
//!
//! Every invocation walks the same path: typing indicator, quota gate,
//! handler. Failures land in [`verdict`], which decides between the 429
//! picture, a short wait-and-retry, and a plain error reply. Nothing in
//! here is allowed to take the dispatcher down.

use crate::bot::commands::{normalize_code, random_code, Command};
use crate::bot::cooldown::RateLimiter;
use crate::bot::help;
use crate::config::{RETRY_WAIT_CEILING_SECS, Settings, THROTTLED_CODE};
use crate::images::{FetchError, ImageService};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode};
use thiserror::Error;
use tracing::{debug, error};

/// Everything that can go wrong while handling one command
#[derive(Debug, Error)]
pub enum CommandError {
    /// A quota bucket denied the invocation
    #[error(transparent)]
    QuotaExceeded(#[from] crate::bot::cooldown::QuotaExceeded),
    /// The image provider let us down
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Telegram API failure while replying
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),
}

impl CommandError {
    /// Short kind tag, used as the prefix of user-facing error replies
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QuotaExceeded(_) => "QuotaExceeded",
            Self::Fetch(_) => "FetchFailure",
            Self::Telegram(_) => "RequestError",
        }
    }
}

/// One resolved command invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Chat the reply goes to
    pub chat_id: ChatId,
    /// Author, keyed into the member quota buckets
    pub user_id: u64,
    /// The command to run
    pub command: Command,
}

impl Invocation {
    /// Pairs an incoming message with the command resolved from it
    #[must_use]
    pub fn new(msg: &Message, command: Command) -> Self {
        Self {
            chat_id: msg.chat.id,
            user_id: msg.from.as_ref().map_or(0, |u| u.id.0),
            command,
        }
    }
}

/// What to do about a failed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Throttled image query: answer with the 429 picture, quietly
    ServeThrottledImage,
    /// Short denial on a retryable command: wait it out, re-invoke once
    RetryAfter(Duration),
    /// Reply with `Kind: message` and log it
    Surface,
}

/// Decides how a failure of `command` is answered
///
/// Quota denials get the special cases: `http` is paid in kind with the
/// 429 picture, waits under the ceiling are slept through once, and
/// `help` denials are always surfaced so the help text cannot be used
/// to dodge its own cooldown. Everything else is surfaced as-is.
#[must_use]
pub fn verdict(command: &str, error: &CommandError) -> Verdict {
    match error {
        CommandError::QuotaExceeded(denial) => {
            if command == "http" {
                Verdict::ServeThrottledImage
            } else if command != "help"
                && denial.retry_after.as_secs_f64() < RETRY_WAIT_CEILING_SECS
            {
                Verdict::RetryAfter(denial.retry_after)
            } else {
                Verdict::Surface
            }
        }
        _ => Verdict::Surface,
    }
}

/// Handles one invocation end to end, absorbing every absorbable error
///
/// The only errors left to propagate are Telegram failures from the
/// last-resort reply itself; the endpoint just logs those.
pub async fn run(
    bot: &Bot,
    inv: &Invocation,
    settings: &Settings,
    images: &ImageService,
    limiter: &RateLimiter,
) -> Result<(), teloxide::RequestError> {
    match gated_invoke(bot, inv, settings, images, limiter).await {
        Ok(()) => Ok(()),
        Err(error) => apply_verdict(bot, inv, &error, settings, images).await,
    }
}

async fn gated_invoke(
    bot: &Bot,
    inv: &Invocation,
    settings: &Settings,
    images: &ImageService,
    limiter: &RateLimiter,
) -> Result<(), CommandError> {
    bot.send_chat_action(inv.chat_id, ChatAction::Typing).await?;
    limiter.check(inv.command.name(), inv.chat_id.0, inv.user_id)?;
    invoke(bot, inv, settings, images).await
}

/// Runs the handler body without the quota gate
async fn invoke(
    bot: &Bot,
    inv: &Invocation,
    settings: &Settings,
    images: &ImageService,
) -> Result<(), CommandError> {
    match &inv.command {
        Command::Http { code } => {
            send_cat(bot, inv.chat_id, normalize_code(code.as_deref()), images).await
        }
        Command::Random => {
            let code = random_code(&mut rand::thread_rng());
            send_cat(bot, inv.chat_id, code, images).await
        }
        Command::Help { command } => {
            send_help(bot, inv.chat_id, command.as_deref(), settings).await
        }
    }
}

async fn apply_verdict(
    bot: &Bot,
    inv: &Invocation,
    error: &CommandError,
    settings: &Settings,
    images: &ImageService,
) -> Result<(), teloxide::RequestError> {
    match verdict(inv.command.name(), error) {
        Verdict::ServeThrottledImage => {
            debug!("Answering a throttled image query with the {THROTTLED_CODE} picture");
            match send_cat(bot, inv.chat_id, THROTTLED_CODE, images).await {
                Ok(()) => Ok(()),
                Err(substitute_error) => surface(bot, inv, &substitute_error).await,
            }
        }
        Verdict::RetryAfter(wait) => {
            debug!(
                "Re-invoking /{} after a {:.2}s wait",
                inv.command.name(),
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
            // Second attempt skips the gate; a second failure is final
            match invoke(bot, inv, settings, images).await {
                Ok(()) => Ok(()),
                Err(retry_error) => surface(bot, inv, &retry_error).await,
            }
        }
        Verdict::Surface => surface(bot, inv, error).await,
    }
}

/// Last-resort handling: tell the user, then leave a trace in the log
async fn surface(
    bot: &Bot,
    inv: &Invocation,
    error: &CommandError,
) -> Result<(), teloxide::RequestError> {
    bot.send_message(inv.chat_id, format!("{}: {error}", error.kind()))
        .await?;
    error!("/{} failed: {error}", inv.command.name());
    Ok(())
}

async fn send_cat(
    bot: &Bot,
    chat_id: ChatId,
    code: u16,
    images: &ImageService,
) -> Result<(), CommandError> {
    let image = images.get(code).await?;
    let file_name = image.file_name();
    // A fresh InputFile per reply: the cached bytes are shared, the
    // upload view over them is not
    let photo = InputFile::memory(image.bytes).file_name(file_name);
    bot.send_photo(chat_id, photo).await?;
    Ok(())
}

async fn send_help(
    bot: &Bot,
    chat_id: ChatId,
    topic: Option<&str>,
    settings: &Settings,
) -> Result<(), CommandError> {
    let me = bot.get_me().await?;
    let text = match topic {
        None => help::overview(me.username(), settings),
        Some(topic) => help::for_command(topic, me.username(), settings),
    };

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
