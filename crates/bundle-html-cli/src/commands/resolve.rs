/*
 * resolve.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Resolve command: list the fragments a build would render.

use std::path::PathBuf;

use anyhow::Result;
use bundle_html::HtmlBuilder;

use crate::manifest::Project;

#[derive(Debug)]
pub struct ResolveArgs {
    pub manifest: PathBuf,
    pub bundle: String,
    pub entry: String,
    pub language: Option<String>,
    pub deep: bool,
}

/// Print one fragment per line as `filename<TAB>source path`.
pub fn execute(args: ResolveArgs) -> Result<()> {
    let project = Project::load(&args.manifest)?;
    let bundle = project.bundle(&args.bundle)?;
    let entry = project.entry(&args.bundle, &args.entry, args.language.as_deref())?;

    let fragments = HtmlBuilder::native().fragments(&entry, &bundle, args.deep);
    for fragment in &fragments {
        println!("{}\t{}", fragment.filename(), fragment.source_path().display());
    }
    Ok(())
}
