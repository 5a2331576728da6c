//! Help text rendering
//!
//! Builds the HTML messages behind `/help`. The overview deliberately
//! lists only the two picture commands; `/help help` still works for
//! anyone curious enough to ask.

use crate::config::Settings;

/// Signature and blurb for each command, in overview order
const COMMANDS: [HelpEntry; 3] = [
    HelpEntry {
        name: "http",
        signature: "[code]",
        blurb: "Shows the cat picture for an HTTP status code. Any plain \
                message works too; without a code you get 400.",
        listed: true,
    },
    HelpEntry {
        name: "random",
        signature: "/random",
        blurb: "Shows the cat picture for a random status code.",
        listed: true,
    },
    HelpEntry {
        name: "help",
        signature: "/help [command]",
        blurb: "Shows the command overview, or how one command works.",
        listed: false,
    },
];

struct HelpEntry {
    name: &'static str,
    signature: &'static str,
    blurb: &'static str,
    listed: bool,
}

/// Renders the command overview
#[must_use]
pub fn overview(bot_username: &str, settings: &Settings) -> String {
    let mut sections = vec!["<b>Help</b>".to_string()];

    for entry in COMMANDS.iter().filter(|entry| entry.listed) {
        sections.push(format!("<code>{}</code>\n{}", entry.signature, entry.blurb));
    }

    sections.push(links_section(bot_username, settings));
    sections.join("\n\n")
}

/// Renders the help page for a single command
///
/// Unknown names get the classic not-found line instead of an error.
#[must_use]
pub fn for_command(topic: &str, bot_username: &str, settings: &Settings) -> String {
    let Some(entry) = COMMANDS.iter().find(|entry| entry.name == topic) else {
        return format!(
            "No command called \"{}\" found.",
            html_escape::encode_text(topic)
        );
    };

    format!(
        "<b>{}</b>\n\n<b>description</b>\n{}\n\n{}",
        entry.signature,
        entry.blurb,
        links_section(bot_username, settings)
    )
}

/// The "Useful links" footer: invite first, then whichever of the
/// support and source links are configured
fn links_section(bot_username: &str, settings: &Settings) -> String {
    let mut links = vec![format!(
        "<a href=\"https://t.me/{bot_username}\">Invite</a>"
    )];

    if let Some(url) = &settings.support_server_url {
        links.push(format!("<a href=\"{url}\">Support server</a>"));
    }
    if let Some(url) = &settings.source_url {
        links.push(format!("<a href=\"{url}\">Source</a>"));
    }

    format!("<b>Useful links</b>\n{}", links.join(" | "))
}
