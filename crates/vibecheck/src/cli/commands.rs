//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::session::DEFAULT_LINK_LOCATION;

/// Analytics consent commands.
#[derive(Debug, Subcommand)]
pub enum ConsentCommand {
    /// Allow analytics; queued events are delivered
    Grant,

    /// Refuse analytics; events stay queued
    Deny,

    /// Show the stored consent decision
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Toggle command arguments.
#[derive(Debug, Args)]
pub struct ToggleCommand {
    /// Id of the checklist item
    pub item_id: String,

    /// Uncheck the item instead of checking it
    #[arg(short, long)]
    pub uncheck: bool,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Id of the section to clear
    pub section_id: String,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Theme command arguments.
#[derive(Debug, Args)]
pub struct ThemeCommand {
    /// Theme name (e.g. "light", "dark")
    pub name: String,
}

/// View command arguments.
#[derive(Debug, Args)]
pub struct ViewCommand {
    /// Page path, e.g. "/resources"
    pub path: String,

    /// Page title
    #[arg(short, long)]
    pub title: Option<String>,
}

/// Link command arguments.
#[derive(Debug, Args)]
pub struct LinkCommand {
    /// Link target
    pub url: String,

    /// Link text
    #[arg(short, long, default_value = "")]
    pub text: String,

    /// Where the link was shown
    #[arg(short, long, default_value = DEFAULT_LINK_LOCATION)]
    pub location: String,
}

/// Events command arguments.
#[derive(Debug, Args)]
pub struct EventsCommand {
    /// Maximum number of events to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Only show events with this name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
