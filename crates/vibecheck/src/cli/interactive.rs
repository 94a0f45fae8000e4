//! Line protocol for `vibecheck session`.
//!
//! One command per line on stdin. The session runs on a tokio runtime so the
//! debounce timers fire in real time while the user types; end of input,
//! `quit` and Ctrl-C all flush pending state before returning.

use std::io::Write;
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::analytics::ConsentState;
use crate::error::Result;
use crate::session::{ChecklistSession, DEFAULT_LINK_LOCATION};

const HELP: &str = "\
commands:
  toggle ID          check an item
  untoggle ID        uncheck an item
  clear SECTION      uncheck every item in a section
  grant | deny       record analytics consent
  theme NAME         record a theme switch
  view PATH [TITLE]  record a page view
  link URL [TEXT]    record an external link click
  status             show progress
  flush              write pending state now
  quit               flush and exit";

/// A parsed session line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Check an item.
    Toggle(String),
    /// Uncheck an item.
    Untoggle(String),
    /// Uncheck a whole section.
    Clear(String),
    /// Grant consent.
    Grant,
    /// Deny consent.
    Deny,
    /// Switch theme.
    Theme(String),
    /// View a page, with an optional title (rest of the line).
    View {
        /// Page path.
        path: String,
        /// Page title.
        title: Option<String>,
    },
    /// Follow a link, with optional link text (rest of the line).
    Link {
        /// Link target.
        url: String,
        /// Link text.
        text: String,
    },
    /// Print progress.
    Status,
    /// Flush pending state.
    Flush,
    /// Print the command list.
    Help,
    /// End the session.
    Quit,
}

/// A session line that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    /// The first word is not a command.
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    /// A command is missing its argument.
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        /// The command.
        command: &'static str,
        /// What was expected.
        argument: &'static str,
    },

    /// The line was blank.
    #[error("empty command")]
    Empty,
}

impl FromStr for SessionCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let rest = (!rest.is_empty()).then(|| rest.to_string());

        let required = |command: &'static str, argument: &'static str| {
            rest.clone()
                .ok_or(ParseCommandError::MissingArgument { command, argument })
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseCommandError::Empty),
            "toggle" | "check" => required("toggle", "an item id").map(Self::Toggle),
            "untoggle" | "uncheck" => required("untoggle", "an item id").map(Self::Untoggle),
            "clear" => required("clear", "a section id").map(Self::Clear),
            "grant" => Ok(Self::Grant),
            "deny" => Ok(Self::Deny),
            "theme" => required("theme", "a theme name").map(Self::Theme),
            "view" => {
                let rest = required("view", "a page path")?;
                let (path, title) = split_first(&rest);
                Ok(Self::View { path, title })
            }
            "link" => {
                let rest = required("link", "a url")?;
                let (url, text) = split_first(&rest);
                Ok(Self::Link {
                    url,
                    text: text.unwrap_or_default(),
                })
            }
            "status" => Ok(Self::Status),
            "flush" => Ok(Self::Flush),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

fn split_first(s: &str) -> (String, Option<String>) {
    match s.split_once(char::is_whitespace) {
        Some((first, rest)) => {
            let rest = rest.trim();
            (first.to_string(), (!rest.is_empty()).then(|| rest.to_string()))
        }
        None => (s.to_string(), None),
    }
}

/// Read commands from `input` until end of input, `quit` or Ctrl-C.
///
/// Bad lines and unknown ids are reported on `out` and the session carries
/// on. Pending state is flushed before returning.
///
/// # Errors
///
/// Returns an error if reading `input` or writing `out` fails.
pub async fn run<R, W>(session: &mut ChecklistSession, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, flushing state");
                break;
            }
        };
        let Some(line) = line else {
            debug!("End of input");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<SessionCommand>() {
            Ok(SessionCommand::Quit) => break,
            Ok(command) => execute(session, command, &mut out)?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
        out.flush()?;
    }

    session.flush();
    Ok(())
}

/// Apply one command to the session and report the outcome on `out`.
///
/// # Errors
///
/// Returns an error only if writing to `out` fails.
pub fn execute<W: Write>(
    session: &mut ChecklistSession,
    command: SessionCommand,
    out: &mut W,
) -> Result<()> {
    match command {
        SessionCommand::Toggle(id) => report_toggle(session, &id, true, out)?,
        SessionCommand::Untoggle(id) => report_toggle(session, &id, false, out)?,
        SessionCommand::Clear(section) => match session.clear_section(&section) {
            Ok(cleared) => writeln!(out, "cleared {cleared} item(s) in {section}")?,
            Err(e) => writeln!(out, "error: {e}")?,
        },
        SessionCommand::Grant => {
            session.set_consent(ConsentState::Granted);
            writeln!(out, "analytics consent granted")?;
        }
        SessionCommand::Deny => {
            session.set_consent(ConsentState::Denied);
            writeln!(out, "analytics consent denied")?;
        }
        SessionCommand::Theme(theme) => {
            session.set_theme(&theme);
            writeln!(out, "theme: {theme}")?;
        }
        SessionCommand::View { path, title } => {
            session.view_page(&path, title.as_deref());
            writeln!(out, "viewed {path}")?;
        }
        SessionCommand::Link { url, text } => {
            match session.follow_link(&url, &text, DEFAULT_LINK_LOCATION) {
                Ok(()) => writeln!(out, "followed {url}")?,
                Err(e) => writeln!(out, "error: {e}")?,
            }
        }
        SessionCommand::Status => write_status(session, out)?,
        SessionCommand::Flush => {
            session.flush();
            writeln!(out, "state saved")?;
        }
        SessionCommand::Help => writeln!(out, "{HELP}")?,
        SessionCommand::Quit => {}
    }
    Ok(())
}

fn report_toggle<W: Write>(
    session: &mut ChecklistSession,
    item_id: &str,
    checked: bool,
    out: &mut W,
) -> Result<()> {
    match session.toggle(item_id, checked) {
        Ok(()) => {
            let progress = session.progress();
            writeln!(
                out,
                "{} {item_id} ({}/{}, {:.0}%)",
                if checked { "checked" } else { "unchecked" },
                progress.checked,
                progress.total,
                progress.percent()
            )?;
        }
        Err(e) => writeln!(out, "error: {e}")?,
    }
    Ok(())
}

/// Write per-section and overall progress.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_status<W: Write>(session: &ChecklistSession, out: &mut W) -> Result<()> {
    let checklist = session.checklist();
    writeln!(out, "{}", checklist.title)?;
    for section in &checklist.sections {
        let progress = section.progress(session.state());
        let mark = if progress.is_complete() { "x" } else { " " };
        writeln!(
            out,
            "  [{mark}] {:<32} {}/{}  ({})",
            section.title, progress.checked, progress.total, section.id
        )?;
    }
    let overall = session.progress();
    writeln!(
        out,
        "Overall: {}/{} ({:.0}%)",
        overall.checked,
        overall.total,
        overall.percent()
    )?;
    Ok(())
}
