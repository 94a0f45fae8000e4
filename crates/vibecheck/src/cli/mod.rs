//! Command-line interface for vibecheck.
//!
//! This module provides the CLI structure for the `vibecheck` binary and the
//! line protocol spoken by `vibecheck session`.

mod commands;
pub mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ClearCommand, ConfigCommand, ConsentCommand, EventsCommand, LinkCommand, StatusCommand,
    ThemeCommand, ToggleCommand, ViewCommand,
};

/// vibecheck - Work through a security checklist
///
/// Tracks checklist progress on disk and records usage analytics locally,
/// only once you have granted consent.
#[derive(Debug, Parser)]
#[command(name = "vibecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grant, deny or inspect analytics consent
    #[command(subcommand)]
    Consent(ConsentCommand),

    /// Check (or uncheck) a checklist item
    Toggle(ToggleCommand),

    /// Uncheck every item in a section
    Clear(ClearCommand),

    /// Show checklist progress
    Status(StatusCommand),

    /// Record a theme switch
    Theme(ThemeCommand),

    /// Record a page view
    View(ViewCommand),

    /// Record an external link being followed
    Link(LinkCommand),

    /// List delivered analytics events
    Events(EventsCommand),

    /// Run an interactive session reading commands from stdin
    Session,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
