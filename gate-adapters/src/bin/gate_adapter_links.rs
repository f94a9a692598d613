// gate-adapters/src/bin/gate_adapter_links.rs
// ============================================================================
// Binary: gate-adapter-links
// Description: Link Adapter (spec.md §4.5).
// Purpose: Discover, check, and resample URLs reachable from Claim targets.
// Dependencies: clap, gate-adapters, gate-core, regex, reqwest, roxmltree, url
// ============================================================================

//! ## Overview
//! `discover` walks each Claim target (a seed URL, a local HTML file, or a
//! sitemap) to a deduplicated URL set; `check` probes it with bounded
//! concurrency; `resample` retries the failure-class subset with
//! exponential backoff. Each capability reads the prior stage's artifact
//! rather than repeating its work.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use clap::Parser;
use gate_adapters::cli_support::AdapterArgs;
use gate_adapters::cli_support::load_claim;
use gate_adapters::cli_support::load_profile;
use gate_adapters::cli_support::write_artifact;
use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;
use url::Url;

const DISALLOWED_SCHEMES: [&str; 3] = ["data", "javascript", "mailto"];

// ============================================================================
// SECTION: Output Shapes
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
struct DiscoveryReport {
    seeds: Vec<String>,
    discovered: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
struct CheckReport {
    total_checked: u64,
    passed: u64,
    failed: u64,
    summary: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct ResampleReport {
    total_resampled: u64,
    recovered: u64,
    still_failed: Vec<String>,
    resample_attempts: Vec<serde_json::Value>,
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
    let profile = load_profile(&args.profile).map_err(|err| err.to_string())?;

    match args.capability.as_str() {
        "links:discover" => {
            let claim = load_claim(&args.claim).map_err(|err| err.to_string())?;
            let seeds = claim.map(|claim| claim.claim.scope.targets).unwrap_or_default();
            let mut urls = Vec::new();
            for seed in &seeds {
                discover_from_seed(seed, &mut urls);
            }
            urls.sort();
            urls.dedup();
            write_artifact(&store, &task_id, "links/urlset.json", &urls).map_err(|err| err.to_string())?;
            let discovery = DiscoveryReport {
                seeds,
                discovered: urls.len() as u64,
            };
            write_artifact(&store, &task_id, "links/discovery.json", &discovery).map_err(|err| err.to_string())?;
        }
        "links:check" => {
            let urls: Vec<String> = fs::read(args.task_dir.join("links/urlset.json"))
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
                .unwrap_or_default();
            let statuses = check_urls(&urls, &profile);
            let report = summarize_check(&statuses, &profile);
            write_artifact(&store, &task_id, "links/statuses.json", &statuses).map_err(|err| err.to_string())?;
            write_artifact(&store, &task_id, "links/check.json", &report).map_err(|err| err.to_string())?;
        }
        "links:resample" => {
            let mut statuses: BTreeMap<String, serde_json::Value> = fs::read(args.task_dir.join("links/statuses.json"))
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
                .unwrap_or_default();
            let report = resample_failures(&mut statuses, &profile);
            write_artifact(&store, &task_id, "links/statuses.json", &statuses).map_err(|err| err.to_string())?;
            write_artifact(&store, &task_id, "links/resample.json", &report).map_err(|err| err.to_string())?;
        }
        other => return Err(format!("unsupported capability: {other}")),
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

#[allow(clippy::expect_used, reason = "\"file:///\" is a fixed, always-valid base URL literal")]
fn discover_from_seed(seed: &str, out: &mut Vec<String>) {
    if seed.starts_with("http://") || seed.starts_with("https://") {
        let Ok(base) = Url::parse(seed) else {
            return;
        };
        let Ok(client) = Client::builder().timeout(Duration::from_secs(10)).build() else {
            return;
        };
        let Ok(response) = client.get(seed).send() else {
            return;
        };
        let Ok(body) = response.text() else {
            return;
        };
        if seed.ends_with(".xml") {
            extract_sitemap_locs(&body, &client, out);
        } else {
            extract_html_links(&body, &base, out);
        }
    } else {
        let Ok(body) = fs::read_to_string(seed) else {
            return;
        };
        let base = Url::parse("file:///").unwrap_or_else(|_| Url::parse("file:///tmp/").expect("valid fallback url"));
        if seed.ends_with(".xml") {
            for loc in sitemap_locs(&body) {
                push_allowed(&loc, out);
            }
        } else {
            extract_html_links(&body, &base, out);
        }
    }
}

#[allow(clippy::expect_used, reason = "href/src attribute regex is a fixed literal, never user input")]
fn extract_html_links(body: &str, base: &Url, out: &mut Vec<String>) {
    let attr_pattern = Regex::new(r#"(?i)\b(?:href|src)\s*=\s*["']([^"']+)["']"#).expect("valid regex");
    for captures in attr_pattern.captures_iter(body) {
        let raw = &captures[1];
        let resolved = base.join(raw).map_or_else(|_| raw.to_string(), |resolved| resolved.to_string());
        push_allowed(&resolved, out);
    }
}

fn extract_sitemap_locs(body: &str, client: &Client, out: &mut Vec<String>) {
    let locs = sitemap_locs(body);
    let is_index = body.contains("<sitemapindex");
    for loc in locs {
        if is_index {
            if let Ok(response) = client.get(&loc).send()
                && let Ok(nested) = response.text()
            {
                extract_sitemap_locs(&nested, client, out);
            }
        } else {
            push_allowed(&loc, out);
        }
    }
}

fn sitemap_locs(body: &str) -> Vec<String> {
    let Ok(document) = roxmltree::Document::parse(body) else {
        return Vec::new();
    };
    document
        .descendants()
        .filter(|node| node.has_tag_name("loc"))
        .filter_map(|node| node.text().map(str::trim).map(ToString::to_string))
        .collect()
}

fn push_allowed(raw: &str, out: &mut Vec<String>) {
    if raw.starts_with('#') {
        return;
    }
    let Ok(parsed) = Url::parse(raw) else {
        return;
    };
    if DISALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return;
    }
    out.push(parsed.to_string());
}

// ============================================================================
// SECTION: Check
// ============================================================================

fn check_urls(urls: &[String], profile: &gate_core::Profile) -> BTreeMap<String, serde_json::Value> {
    let concurrency = usize::try_from(profile.concurrent_checks_or_default().max(1)).unwrap_or(1);
    let timeout = Duration::from_millis(profile.timeout_ms_or_default());
    let rate_limit = Duration::from_millis(profile.rate_limit_ms_or_default());
    let statuses: Mutex<BTreeMap<String, serde_json::Value>> = Mutex::new(BTreeMap::new());

    for chunk in urls.chunks(concurrency) {
        thread::scope(|scope| {
            for url in chunk {
                scope.spawn(|| {
                    let value = probe_url(url, timeout);
                    if let Ok(mut guard) = statuses.lock() {
                        guard.insert(url.clone(), value);
                    }
                });
            }
        });
        thread::sleep(rate_limit);
    }
    statuses.into_inner().unwrap_or_default()
}

fn probe_url(url: &str, timeout: Duration) -> serde_json::Value {
    let Ok(client) = Client::builder().timeout(timeout).redirect(reqwest::redirect::Policy::none()).build() else {
        return serde_json::json!("error");
    };
    match client.head(url).send() {
        Ok(response) => serde_json::json!(response.status().as_u16()),
        Err(head_err) => {
            if head_err.is_timeout() {
                return serde_json::json!("timeout");
            }
            match client.get(url).send() {
                Ok(response) => serde_json::json!(response.status().as_u16()),
                Err(get_err) if get_err.is_timeout() => serde_json::json!("timeout"),
                Err(_) => serde_json::json!("error"),
            }
        }
    }
}

fn classify_status(value: &serde_json::Value) -> &'static str {
    if let Some(code) = value.as_u64() {
        return match code {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "error",
        };
    }
    match value.as_str() {
        Some("timeout") => "timeout",
        _ => "error",
    }
}

fn is_passing(value: &serde_json::Value, treat_3xx_as_pass: bool) -> bool {
    let category = classify_status(value);
    category == "2xx" || (category == "3xx" && treat_3xx_as_pass)
}

fn summarize_check(statuses: &BTreeMap<String, serde_json::Value>, profile: &gate_core::Profile) -> CheckReport {
    let treat_3xx_as_pass = profile.treat_3xx_as_pass == Some(true);
    let mut summary: BTreeMap<String, u64> = BTreeMap::new();
    let mut passed = 0_u64;
    for value in statuses.values() {
        *summary.entry(classify_status(value).to_string()).or_insert(0) += 1;
        if is_passing(value, treat_3xx_as_pass) {
            passed += 1;
        }
    }
    let total_checked = statuses.len() as u64;
    CheckReport {
        total_checked,
        passed,
        failed: total_checked - passed,
        summary,
    }
}

// ============================================================================
// SECTION: Resample
// ============================================================================

fn resample_failures(
    statuses: &mut BTreeMap<String, serde_json::Value>,
    profile: &gate_core::Profile,
) -> ResampleReport {
    let treat_3xx_as_pass = profile.treat_3xx_as_pass == Some(true);
    let max_attempts = profile.resample_failures_or_default();
    let timeout = Duration::from_millis(profile.timeout_ms_or_default());

    let failing: Vec<String> = statuses
        .iter()
        .filter(|(_, value)| !is_passing(value, treat_3xx_as_pass))
        .map(|(url, _)| url.clone())
        .collect();

    let mut recovered = 0_u64;
    let mut still_failed = Vec::new();
    let mut attempts_log = Vec::new();

    for url in &failing {
        let mut recovered_this_url = false;
        for attempt in 1..=max_attempts {
            let backoff_ms = (1000_u64.saturating_mul(1_u64 << (attempt.saturating_sub(1)))).min(10_000);
            thread::sleep(Duration::from_millis(backoff_ms));
            let value = probe_url(url, timeout);
            let passing = is_passing(&value, treat_3xx_as_pass);
            attempts_log.push(serde_json::json!({
                "url": url,
                "attempt": attempt,
                "status": value,
            }));
            if passing {
                statuses.insert(url.clone(), value);
                recovered_this_url = true;
                break;
            }
        }
        if recovered_this_url {
            recovered += 1;
        } else {
            still_failed.push(url.clone());
        }
    }
    still_failed.sort();

    ResampleReport {
        total_resampled: failing.len() as u64,
        recovered,
        still_failed,
        resample_attempts: attempts_log,
    }
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
