// gate-adapters/src/bin/gate_adapter_content.rs
// ============================================================================
// Binary: gate-adapter-content
// Description: Content Adapter (spec.md §4.7).
// Purpose: Word/heading/image inventory for content verification tasks.
// Dependencies: clap, gate-adapters, gate-core, regex, walkdir-free fs walk
// ============================================================================

//! ## Overview
//! All four content capabilities (`content:scan`, `content:wordcount`,
//! `content:headings`, `content:images`) share one measurement: spec.md
//! §4.7 names a single output artifact, `content/scan.json`, so each
//! capability runs the same scan and writes the same file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gate_adapters::cli_support::AdapterArgs;
use gate_adapters::cli_support::load_commitment;
use gate_adapters::cli_support::write_artifact;
use regex::Regex;
use serde::Serialize;

const ALLOWED_EXTENSIONS: [&str; 3] = ["md", "txt", "html"];

// ============================================================================
// SECTION: Output Shapes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ContentFileReport {
    path: String,
    word_count: u64,
    heading_counts: BTreeMap<String, u64>,
    image_count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
struct ContentScanReport {
    files: Vec<ContentFileReport>,
}

// ============================================================================
// SECTION: Main
// ============================================================================

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(message) => emit_error(&message),
    }
}

fn run() -> Result<ExitCode, String> {
    let args = AdapterArgs::parse();
    let (store, task_id) = args.store_and_task_id().map_err(|err| err.to_string())?;
    let commitment = load_commitment(&args.commitment).map_err(|err| err.to_string())?;

    let root = commitment
        .scope
        .target_directory
        .as_deref()
        .map_or_else(|| args.task_dir.clone(), PathBuf::from);

    let report = match args.capability.as_str() {
        "content:scan" | "content:wordcount" | "content:headings" | "content:images" => scan_directory(&root)?,
        other => return Err(format!("unsupported capability: {other}")),
    };

    write_artifact(&store, &task_id, "content/scan.json", &report).map_err(|err| err.to_string())?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Scanning
// ============================================================================

fn scan_directory(root: &Path) -> Result<ContentScanReport, String> {
    let mut paths = Vec::new();
    collect_content_files(root, root, &mut paths)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for relative in paths {
        let full = root.join(&relative);
        let text = fs::read_to_string(&full).map_err(|err| format!("failed to read {}: {err}", full.display()))?;
        files.push(ContentFileReport {
            path: relative,
            word_count: count_words(&text),
            heading_counts: count_headings(&text),
            image_count: count_images(&text),
        });
    }
    Ok(ContentScanReport {
        files,
    })
}

fn collect_content_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };
    for entry in entries {
        let entry = entry.map_err(|err| format!("failed to read {}: {err}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_content_files(root, &path, out)?;
            continue;
        }
        let has_allowed_extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !has_allowed_extension {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[allow(clippy::expect_used, reason = "heading regexes are fixed literals, never user input")]
fn count_headings(text: &str) -> BTreeMap<String, u64> {
    let markdown_heading = Regex::new(r"(?m)^(#{1,6})\s+\S").expect("valid heading regex");
    let html_heading = Regex::new(r"(?i)<h([1-6])[ >]").expect("valid html heading regex");

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for captures in markdown_heading.captures_iter(text) {
        let level = captures[1].len();
        *counts.entry(format!("h{level}")).or_insert(0) += 1;
    }
    for captures in html_heading.captures_iter(text) {
        let level = &captures[1];
        *counts.entry(format!("h{level}")).or_insert(0) += 1;
    }
    counts
}

#[allow(clippy::expect_used, reason = "image regexes are fixed literals, never user input")]
fn count_images(text: &str) -> u64 {
    let markdown_image = Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid markdown image regex");
    let html_image = Regex::new(r"(?i)<img[ >]").expect("valid html image regex");
    (markdown_image.find_iter(text).count() + html_image.find_iter(text).count()) as u64
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
