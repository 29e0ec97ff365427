//! This module contains the command-line interface [`Cli`] parser for managing class attendance
//! records.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(version, about = "Track class attendance in a local SQLite store")]
pub struct Cli {
    /// Path of the attendance store. Overrides `database_path` from the configuration.
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Name of the class to work on. Overrides `class_name` from the configuration.
    #[arg(long, global = true)]
    pub class: Option<String>,

    /// The command to run. Starts the interactive menu when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interactive menu.
    Menu,

    /// List every class.
    Classes,

    /// List the students of the class.
    Students,

    /// Add a new student to the class.
    AddStudent { name: String },

    /// Mark students as present. Prompts for selections when no indices are given.
    Mark {
        /// Date to mark (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// 1-based positions of the students to mark present, as listed by `students`.
        indices: Vec<usize>,
    },

    /// Randomly mark a fraction of the class absent and everyone else present.
    AutoMark {
        /// Date to mark (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Fraction of the class to mark absent, between 0 and 1.
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Show attendance for one date, or for every recorded date.
    View {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show each student's presence rate.
    Report,

    /// Add every student listed in a CSV file with a `name` column.
    ImportRoster { file_path: PathBuf },
}
