// Allow non_std_lazy_statics because the lazy_regex! macro uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use dotenvy::dotenv;
use httpcat_bot::bot::{dispatch, Command, Invocation, RateLimiter};
use httpcat_bot::config::Settings;
use httpcat_bot::images::ImageService;
use lazy_regex::lazy_regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Matches a bot token inside a Bot API URL
static RE_TOKEN_IN_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(https?://[^/\s]+/bot)[0-9]+:[A-Za-z0-9_-]+");
/// Matches a bare bot token
static RE_BARE_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}");

/// Masks Telegram tokens in anything headed for the log
fn redact(input: &str) -> String {
    let output = RE_TOKEN_IN_URL.replace_all(input, "$1[TELEGRAM_TOKEN]");
    RE_BARE_TOKEN
        .replace_all(&output, "[TELEGRAM_TOKEN]")
        .into_owned()
}

struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&s).as_bytes())?;
        // Report the original length to satisfy the contract, even if
        // the redacted string length differs
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Setup logging with token redaction
    init_logging();

    info!("Starting httpcat bot...");

    // Load settings
    let settings = init_settings();

    // Shared picture cache and quota pipeline
    let images = Arc::new(ImageService::new(&settings.image_base_url));
    let limiter = Arc::new(RateLimiter::with_default_buckets());

    // Initialize Bot
    let bot = Bot::new(settings.telegram_token.clone());

    // Setup handlers
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, images, limiter])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging() {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            // Everything else that carries text is an implicit image query
            dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
    images: Arc<ImageService>,
    limiter: Arc<RateLimiter>,
) -> Result<(), teloxide::RequestError> {
    let inv = Invocation::new(&msg, cmd);
    if let Err(e) = dispatch::run(&bot, &inv, &settings, &images, &limiter).await {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    images: Arc<ImageService>,
    limiter: Arc<RateLimiter>,
) -> Result<(), teloxide::RequestError> {
    let code = msg.text().map(ToOwned::to_owned);
    let inv = Invocation::new(&msg, Command::Http { code });
    if let Err(e) = dispatch::run(&bot, &inv, &settings, &images, &limiter).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}
