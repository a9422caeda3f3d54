/*
 * build.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Build and test command implementation
 */

//! Build and test commands.
//!
//! `build` renders an entry with the fragments of every bundle its bundle
//! requires and writes it under the manifest's build root. `test` renders
//! only the entry's own fragments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bundle_html::HtmlBuilder;
use tracing::{debug, info};

use crate::manifest::Project;

/// Arguments for the build and test commands
#[derive(Debug)]
pub struct BuildArgs {
    pub manifest: PathBuf,
    pub bundle: String,
    pub entry: String,
    pub language: Option<String>,
    /// Pull fragments from required bundles
    pub deep: bool,
}

/// Execute the build command
pub fn execute(args: BuildArgs) -> Result<()> {
    let (project, builder) = load(&args)?;
    let bundle = project.bundle(&args.bundle)?;
    let entry = project.entry(&args.bundle, &args.entry, args.language.as_deref())?;

    let written = builder
        .build_html(&entry, &bundle, args.deep)
        .with_context(|| format!("Failed to build {} in bundle {}", args.entry, args.bundle))?;

    info!(path = %written.display(), "Built");
    println!("{}", written.display());
    Ok(())
}

/// Execute the test command
pub fn execute_test(args: BuildArgs) -> Result<()> {
    let (project, builder) = load(&args)?;
    let bundle = project.bundle(&args.bundle)?;
    let entry = project.entry(&args.bundle, &args.entry, args.language.as_deref())?;

    let written = builder
        .build_test(&entry, &bundle)
        .with_context(|| format!("Failed to build test page {}", args.entry))?;

    info!(path = %written.display(), "Built test page");
    println!("{}", written.display());
    Ok(())
}

fn load(args: &BuildArgs) -> Result<(Project, HtmlBuilder)> {
    debug!(manifest = %args.manifest.display(), "Loading manifest");
    let project = Project::load(&args.manifest)?;
    debug!(
        bundle = %args.bundle,
        language = args.language.as_deref().unwrap_or(project.default_language()),
        "Loaded manifest"
    );
    Ok((project, HtmlBuilder::native()))
}
