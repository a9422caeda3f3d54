/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! bundle-html - assemble bundle HTML pages from a manifest

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod manifest;

#[derive(Parser)]
#[command(name = "bundle-html")]
#[command(about = "Assemble HTML pages for multi-bundle web builds", long_about = None)]
struct Cli {
    /// Bundle manifest
    #[arg(short, long, global = true, default_value = "bundles.yml")]
    manifest: PathBuf,

    /// Log more (repeat for trace output)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an HTML entry with the fragments of every required bundle
    Build {
        /// Bundle the entry belongs to
        bundle: String,

        /// Entry filename
        entry: String,

        /// Language to build (defaults to the manifest's default language)
        #[arg(short, long)]
        language: Option<String>,

        /// Only render the entry's own fragments
        #[arg(long)]
        shallow: bool,
    },

    /// Build a test page for an entry (its own fragments only)
    Test {
        bundle: String,

        entry: String,

        #[arg(short, long)]
        language: Option<String>,
    },

    /// Print the fragments a build would render, in order
    Resolve {
        bundle: String,

        entry: String,

        #[arg(short, long)]
        language: Option<String>,

        /// Only list the entry's own fragments
        #[arg(long)]
        shallow: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "bundle_html=info,bundle_html_cli=info",
        1 => "bundle_html=debug,bundle_html_cli=debug",
        _ => "bundle_html=trace,bundle_html_cli=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Build {
            bundle,
            entry,
            language,
            shallow,
        } => commands::build::execute(commands::build::BuildArgs {
            manifest: cli.manifest,
            bundle,
            entry,
            language,
            deep: !shallow,
        }),
        Commands::Test {
            bundle,
            entry,
            language,
        } => commands::build::execute_test(commands::build::BuildArgs {
            manifest: cli.manifest,
            bundle,
            entry,
            language,
            deep: false,
        }),
        Commands::Resolve {
            bundle,
            entry,
            language,
            shallow,
        } => commands::resolve::execute(commands::resolve::ResolveArgs {
            manifest: cli.manifest,
            bundle,
            entry,
            language,
            deep: !shallow,
        }),
    }
}
