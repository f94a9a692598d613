// gate-adapters/src/bin/gate_adapter_code.rs
// ============================================================================
// Binary: gate-adapter-code
// Description: Code Adapter (spec.md §4.4).
// Purpose: Diff/lint/test/coverage/build measurement and claim correlation.
// Dependencies: clap, gate-adapters, gate-core, regex
// ============================================================================

//! ## Overview
//! Six capabilities over one working tree: `diff` extracts lexical change
//! facts from `git diff`, `lint`/`tests`/`build` shell to whatever the
//! project manifest identifies, `coverage` reads the test framework's
//! summary, and `map-functions` correlates the Claim's declared units
//! against the diff using the priority-ordered matching rules from
//! spec.md §4.4.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use gate_adapters::cli_support::AdapterArgs;
use gate_adapters::cli_support::load_claim;
use gate_adapters::cli_support::load_commitment;
use gate_adapters::cli_support::write_artifact;
use gate_adapters::levenshtein;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Output Shapes
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DiffReport {
    files_modified: Vec<String>,
    files_created: Vec<String>,
    files_deleted: Vec<String>,
    functions_modified: Vec<String>,
    endpoints_modified: Vec<String>,
    total_changes: u64,
}

#[derive(Debug, Clone, Serialize)]
struct LintReport {
    #[serde(rename = "exitCode")]
    exit_code: i32,
    errors: u64,
    warnings: u64,
    files_checked: u64,
    issues: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
struct TestsReport {
    passed: u64,
    failed: u64,
    skipped: u64,
    total: u64,
    duration_ms: u64,
    details: Vec<serde_json::Value>,
    summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct CoverageReport {
    pct: f64,
    lines: Option<f64>,
    branches: Option<f64>,
    functions: Option<f64>,
    statements: Option<f64>,
    report_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum MatchCertainty {
    Certain,
    Fuzzy,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionMatch {
    claimed: String,
    matched: String,
    certainty: MatchCertainty,
}

#[derive(Debug, Clone, Default, Serialize)]
struct FunctionMapReport {
    matches: Vec<FunctionMatch>,
    unmatched_claims: Vec<String>,
    unmatched_diffs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct BuildReport {
    success: bool,
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

    match args.capability.as_str() {
        "code:diff" => {
            let (report, patch_text) = run_diff(&root);
            write_artifact(&store, &task_id, "diff.json", &report).map_err(|err| err.to_string())?;
            let names: Vec<&str> = report
                .files_modified
                .iter()
                .chain(report.files_created.iter())
                .chain(report.files_deleted.iter())
                .map(String::as_str)
                .collect();
            write_artifact(&store, &task_id, "diff_names.json", &names).map_err(|err| err.to_string())?;
            store.put(&task_id, "diffs.patch", patch_text.as_bytes(), true).map_err(|err| err.to_string())?;
        }
        "code:lint" => {
            let report = run_lint(&root);
            write_artifact(&store, &task_id, "lint.json", &report).map_err(|err| err.to_string())?;
        }
        "code:tests" => {
            let report = run_tests(&root);
            write_artifact(&store, &task_id, "tests.json", &report).map_err(|err| err.to_string())?;
        }
        "code:coverage" => {
            let report = parse_coverage(&root);
            write_artifact(&store, &task_id, "coverage.json", &report).map_err(|err| err.to_string())?;
        }
        "code:build" => {
            let report = run_build(&root);
            write_artifact(&store, &task_id, "build.json", &report).map_err(|err| err.to_string())?;
        }
        "code:map-functions" => {
            let claim = load_claim(&args.claim).map_err(|err| err.to_string())?;
            let diff: DiffReport = fs::read(args.task_dir.join("diff.json"))
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
                .unwrap_or_default();
            let units = claim.map_or_else(Vec::new, |claim| claim.claim.units_list);
            let report = map_functions(&units, &diff);
            write_artifact(&store, &task_id, "function_map.json", &report).map_err(|err| err.to_string())?;
        }
        other => return Err(format!("unsupported capability: {other}")),
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Diff
// ============================================================================

fn run_diff(root: &Path) -> (DiffReport, String) {
    let Ok(name_status) = Command::new("git").args(["-C", &root.to_string_lossy(), "diff", "--name-status", "HEAD"]).output()
    else {
        return (DiffReport::default(), String::new());
    };
    let patch_output = Command::new("git")
        .args(["-C", &root.to_string_lossy(), "diff", "--unified=0", "HEAD"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
        .unwrap_or_default();

    let mut report = DiffReport::default();
    for line in String::from_utf8_lossy(&name_status.stdout).lines() {
        let mut parts = line.splitn(2, '\t');
        let (Some(status), Some(path)) = (parts.next(), parts.next()) else {
            continue;
        };
        match status.chars().next() {
            Some('A') => report.files_created.push(path.to_string()),
            Some('D') => report.files_deleted.push(path.to_string()),
            Some('M') => report.files_modified.push(path.to_string()),
            _ => {}
        }
    }
    report.files_modified.sort();
    report.files_created.sort();
    report.files_deleted.sort();
    report.files_modified.dedup();
    report.files_created.dedup();
    report.files_deleted.dedup();
    report.total_changes =
        (report.files_modified.len() + report.files_created.len() + report.files_deleted.len()) as u64;

    let (functions, endpoints) = extract_changed_symbols(&patch_output);
    report.functions_modified = functions;
    report.endpoints_modified = endpoints;
    (report, patch_output)
}

/// Lexically scans added patch lines for function/endpoint definitions
/// (spec.md §4.4: named function, arrow-with-identifier, class method,
/// `export function`, Python `def`, route decorators).
#[allow(clippy::expect_used, reason = "symbol-extraction regexes are fixed literals, never user input")]
fn extract_changed_symbols(patch_text: &str) -> (Vec<String>, Vec<String>) {
    let patterns = [
        Regex::new(r"^\bfn\s+(\w+)").expect("valid regex"),
        Regex::new(r"^\bfunction\s+(\w+)").expect("valid regex"),
        Regex::new(r"^export\s+function\s+(\w+)").expect("valid regex"),
        Regex::new(r"^const\s+(\w+)\s*=\s*(?:async\s*)?\(").expect("valid regex"),
        Regex::new(r"^\s*(\w+)\s*\([^)]*\)\s*\{").expect("valid regex"),
        Regex::new(r"^def\s+(\w+)").expect("valid regex"),
    ];
    let route_pattern =
        Regex::new(r#"(?i)\bapp\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#).expect("valid regex");

    let mut functions = Vec::new();
    let mut endpoints = Vec::new();
    for raw_line in patch_text.lines() {
        let Some(added) = raw_line.strip_prefix('+') else {
            continue;
        };
        if added.starts_with('+') {
            continue;
        }
        let trimmed = added.trim_start();
        for pattern in &patterns {
            if let Some(captures) = pattern.captures(trimmed) {
                functions.push(captures[1].to_string());
            }
        }
        if let Some(captures) = route_pattern.captures(trimmed) {
            endpoints.push(format!("{} {}", captures[1].to_ascii_uppercase(), &captures[2]));
        }
    }
    functions.sort();
    functions.dedup();
    endpoints.sort();
    endpoints.dedup();
    (functions, endpoints)
}

// ============================================================================
// SECTION: Lint / Tests / Build
// ============================================================================

enum ProjectKind {
    Rust,
    Node,
    Python,
    Unknown,
}

fn detect_project_kind(root: &Path) -> ProjectKind {
    if root.join("Cargo.toml").is_file() {
        ProjectKind::Rust
    } else if root.join("package.json").is_file() {
        ProjectKind::Node
    } else if root.join("pyproject.toml").is_file() || root.join("requirements.txt").is_file() {
        ProjectKind::Python
    } else {
        ProjectKind::Unknown
    }
}

fn run_lint(root: &Path) -> LintReport {
    let command = match detect_project_kind(root) {
        ProjectKind::Rust => Some(("cargo", vec!["clippy", "--quiet", "--message-format=short"])),
        ProjectKind::Node => Some(("npm", vec!["run", "--silent", "lint"])),
        ProjectKind::Python => Some(("ruff", vec!["check", "."])),
        ProjectKind::Unknown => None,
    };
    let Some((program, command_args)) = command else {
        return LintReport {
            exit_code: 0,
            errors: 0,
            warnings: 0,
            files_checked: 0,
            issues: vec![serde_json::json!({"message": "no linter detected", "raw": true})],
        };
    };
    let output = Command::new(program).args(&command_args).current_dir(root).output();
    let Ok(output) = output else {
        return LintReport {
            exit_code: -1,
            errors: 1,
            warnings: 0,
            files_checked: 0,
            issues: vec![serde_json::json!({"message": format!("failed to spawn {program}"), "raw": true})],
        };
    };
    let exit_code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let issues: Vec<serde_json::Value> = stderr
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::json!({"message": line, "raw": true}))
        .collect();
    LintReport {
        exit_code,
        errors: if exit_code == 0 { 0 } else { 1 },
        warnings: 0,
        files_checked: 0,
        issues,
    }
}

fn run_tests(root: &Path) -> TestsReport {
    let command = match detect_project_kind(root) {
        ProjectKind::Rust => Some(("cargo", vec!["test", "--quiet"])),
        ProjectKind::Node => Some(("npm", vec!["test", "--silent"])),
        ProjectKind::Python => Some(("pytest", vec!["-q"])),
        ProjectKind::Unknown => None,
    };
    let Some((program, command_args)) = command else {
        return TestsReport {
            passed: 0,
            failed: 0,
            skipped: 0,
            total: 0,
            duration_ms: 0,
            details: Vec::new(),
            summary: Some("no test framework detected".to_string()),
        };
    };
    let start = Instant::now();
    let output = Command::new(program).args(&command_args).current_dir(root).output();
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let Ok(output) = output else {
        return TestsReport {
            passed: 0,
            failed: 1,
            skipped: 0,
            total: 1,
            duration_ms,
            details: Vec::new(),
            summary: Some(format!("failed to spawn {program}")),
        };
    };
    let success = output.status.success();
    TestsReport {
        passed: u64::from(success),
        failed: u64::from(!success),
        skipped: 0,
        total: 1,
        duration_ms,
        details: Vec::new(),
        summary: None,
    }
}

fn run_build(root: &Path) -> BuildReport {
    let command = match detect_project_kind(root) {
        ProjectKind::Rust => Some(("cargo", vec!["build", "--quiet"])),
        ProjectKind::Node => Some(("npm", vec!["run", "--silent", "build"])),
        ProjectKind::Python => None,
        ProjectKind::Unknown => None,
    };
    let Some((program, command_args)) = command else {
        return BuildReport {
            success: true,
        };
    };
    let success = Command::new(program).args(&command_args).current_dir(root).status().is_ok_and(|status| status.success());
    BuildReport {
        success,
    }
}

fn parse_coverage(root: &Path) -> CoverageReport {
    let lcov_path = root.join("coverage").join("lcov.info");
    let Ok(text) = fs::read_to_string(&lcov_path) else {
        return CoverageReport::default();
    };
    let mut hit = 0_f64;
    let mut found = 0_f64;
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("LH:") {
            hit += value.trim().parse::<f64>().unwrap_or(0.0);
        } else if let Some(value) = line.strip_prefix("LF:") {
            found += value.trim().parse::<f64>().unwrap_or(0.0);
        }
    }
    let pct = if found > 0.0 { (hit / found) * 100.0 } else { 0.0 };
    CoverageReport {
        pct,
        lines: Some(pct),
        branches: None,
        functions: None,
        statements: None,
        report_path: Some(lcov_path.to_string_lossy().into_owned()),
    }
}

// ============================================================================
// SECTION: Map Functions
// ============================================================================

const FUZZY_THRESHOLD: f64 = 0.7;

fn map_functions(units: &[String], diff: &DiffReport) -> FunctionMapReport {
    let mut candidates: Vec<String> = diff.functions_modified.clone();
    candidates.extend(diff.endpoints_modified.iter().map(|entry| format!("ep:{entry}")));
    candidates.sort();
    candidates.dedup();

    let mut matched_candidates: Vec<bool> = vec![false; candidates.len()];
    let mut matches = Vec::new();
    let mut unmatched_claims = Vec::new();

    for unit in units {
        let bare = unit.strip_prefix("func:").or_else(|| unit.strip_prefix("ep:")).unwrap_or(unit.as_str());
        let Some((index, certainty)) = best_candidate(bare, &candidates, &matched_candidates) else {
            unmatched_claims.push(unit.clone());
            continue;
        };
        matched_candidates[index] = true;
        matches.push(FunctionMatch {
            claimed: unit.clone(),
            matched: candidates[index].clone(),
            certainty,
        });
    }

    let mut unmatched_diffs: Vec<String> = candidates
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched_candidates[*index])
        .map(|(_, name)| name.clone())
        .collect();

    matches.sort_by(|a, b| a.claimed.cmp(&b.claimed));
    unmatched_claims.sort();
    unmatched_diffs.sort();

    FunctionMapReport {
        matches,
        unmatched_claims,
        unmatched_diffs,
    }
}

fn best_candidate(bare: &str, candidates: &[String], taken: &[bool]) -> Option<(usize, MatchCertainty)> {
    if let Some(index) = candidates.iter().position(|candidate| candidate == bare)
        && !taken[index]
    {
        return Some((index, MatchCertainty::Certain));
    }
    if let Some(index) = candidates.iter().position(|candidate| candidate.eq_ignore_ascii_case(bare))
        && !taken[index]
    {
        return Some((index, MatchCertainty::Certain));
    }
    if let Some((index, _)) = candidates.iter().enumerate().find(|(index, candidate)| !taken[*index] && candidate.contains(bare))
    {
        return Some((index, MatchCertainty::Fuzzy));
    }
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if taken[index] {
            continue;
        }
        let ratio = levenshtein::ratio(bare, candidate);
        if ratio >= FUZZY_THRESHOLD && best.is_none_or(|(_, best_ratio)| ratio > best_ratio) {
            best = Some((index, ratio));
        }
    }
    best.map(|(index, _)| (index, MatchCertainty::Fuzzy))
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
