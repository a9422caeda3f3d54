/*
 * cli_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for the bundle-html command line.
 */

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

const MANIFEST: &str = r#"
build_root: build
bundles:
  - name: app
    layout: apps/app/layout.rhtml
    requires: [desktop]
    entries:
      - source: apps/app/english.lproj/index.rhtml
      - name: main
        composite: [index.rhtml]
  - name: desktop
    layout: frameworks/desktop/layout.rhtml
    entries:
      - source: frameworks/desktop/english.lproj/panel.haml
      - source: frameworks/desktop/shared.rhtml
"#;

/// Lay out a two-bundle project in a temporary directory.
fn project() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let root = temp.path();
    let files = [
        ("bundles.yml", MANIFEST),
        (
            "apps/app/layout.rhtml",
            "<html>\n<body>\n<%= @content_for_resources %></body>\n</html>\n",
        ),
        (
            "apps/app/english.lproj/index.rhtml",
            "<h1><%= bundle_name %>/<%= language %></h1>\n",
        ),
        ("frameworks/desktop/layout.rhtml", "<%= content_for_resources %>"),
        ("frameworks/desktop/english.lproj/panel.haml", ".panel= filename\n"),
        ("frameworks/desktop/shared.rhtml", "<p>not localized</p>\n"),
    ];
    for (path, content) in files {
        write(&root.join(path), content);
    }
    temp
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bundle-html"))
        .current_dir(root)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_resolve_lists_fragments_in_order() {
    let temp = project();
    let output = run(temp.path(), &["resolve", "app", "index.rhtml"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout
        .lines()
        .map(|line| line.split('\t').next().unwrap())
        .collect();
    assert_eq!(names, vec!["index.rhtml", "panel.haml"]);
}

#[test]
fn test_resolve_shallow_lists_entry_only() {
    let temp = project();
    let output = run(temp.path(), &["resolve", "app", "index.rhtml", "--shallow"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim_end(),
        "index.rhtml\tapps/app/english.lproj/index.rhtml"
    );
}

#[test]
fn test_composite_builds_to_html_file() {
    let temp = project();
    let output = run(temp.path(), &["build", "app", "main"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let html = fs::read_to_string(temp.path().join("build/app/en/main.html")).unwrap();
    assert_eq!(
        html,
        "<html>\n<body>\n<h1>app/en</h1>\n<div class='panel'>panel.haml</div>\n</body>\n</html>\n"
    );
    assert!(!temp.path().join("build/app/en/main").exists());
}

#[test]
fn test_build_writes_document() {
    let temp = project();
    let output = run(temp.path(), &["build", "app", "index.rhtml"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let html = fs::read_to_string(temp.path().join("build/app/en/index.html")).unwrap();
    assert_eq!(
        html,
        "<html>\n<body>\n<h1>app/en</h1>\n<div class='panel'>panel.haml</div>\n</body>\n</html>\n"
    );
}

#[test]
fn test_test_command_renders_entry_only() {
    let temp = project();
    let output = run(temp.path(), &["test", "app", "index.rhtml"]);
    assert!(output.status.success());

    let html = fs::read_to_string(temp.path().join("build/app/en/index.html")).unwrap();
    assert_eq!(html, "<html>\n<body>\n<h1>app/en</h1>\n</body>\n</html>\n");
}

#[test]
fn test_explicit_manifest_path() {
    let temp = project();
    let elsewhere = TempDir::new().unwrap();
    let manifest = temp.path().join("bundles.yml");
    let output = run(
        elsewhere.path(),
        &["-m", manifest.to_str().unwrap(), "build", "app", "index.rhtml", "--shallow"],
    );
    assert!(output.status.success());
    assert!(temp.path().join("build/app/en/index.html").exists());
}

#[test]
fn test_unsupported_layout_fails_without_output() {
    let temp = project();
    let manifest = MANIFEST.replace("apps/app/layout.rhtml", "apps/app/layout.txt");
    write(&temp.path().join("bundles.yml"), &manifest);
    write(&temp.path().join("apps/app/layout.txt"), "plain");

    let output = run(temp.path(), &["build", "app", "index.rhtml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported template type"), "{}", stderr);
    assert!(!temp.path().join("build").exists());
}

#[test]
fn test_unknown_entry_fails() {
    let temp = project();
    let output = run(temp.path(), &["build", "app", "missing.rhtml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.rhtml"));
}
