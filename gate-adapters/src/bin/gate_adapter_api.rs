// gate-adapters/src/bin/gate_adapter_api.rs
// ============================================================================
// Binary: gate-adapter-api
// Description: API Adapter (spec.md §4.6).
// Purpose: Probe declared endpoints for status, schema conformance, latency.
// Dependencies: clap, gate-adapters, gate-core, jsonschema, reqwest
// ============================================================================

//! ## Overview
//! Endpoint specs come from `commitment.quality["endpoints"]` (an array of
//! `{url, method, headers?, body?, schema?}` objects) when present,
//! falling back to the Claim's declared scope targets as bare `GET`
//! probes. `check` records one result per endpoint; `latency` repeats
//! each probe and reports p50/p95.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use gate_adapters::cli_support::AdapterArgs;
use gate_adapters::cli_support::load_claim;
use gate_adapters::cli_support::load_commitment;
use gate_adapters::cli_support::load_profile;
use gate_adapters::cli_support::write_artifact;
use gate_core::Commitment;
use gate_core::HashAlgorithm;
use gate_core::hashing::hash_bytes;
use jsonschema::Draft;
use reqwest::blocking::Client;
use serde::Serialize;

/// Default per-request timeout for API probes (spec.md §4.6), distinct
/// from the Link Adapter's 5000ms default on the same profile field.
const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;
const LATENCY_SAMPLES: u32 = 5;

// ============================================================================
// SECTION: Endpoint Spec
// ============================================================================

#[derive(Debug, Clone, serde::Deserialize)]
struct EndpointSpec {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
    #[serde(default)]
    schema: Option<serde_json::Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

// ============================================================================
// SECTION: Output Shapes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ApiEndpointResult {
    url: String,
    method: String,
    status: u16,
    latency_ms: u64,
    schema_ok: Option<bool>,
    schema_errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct ApiCheckReport {
    total_checked: u64,
    passed: u64,
    failed: u64,
    endpoints: Vec<ApiEndpointResult>,
}

#[derive(Debug, Clone, Serialize)]
struct EndpointLatency {
    url: String,
    method: String,
    p50_ms: u64,
    p95_ms: u64,
    samples: Vec<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct ApiLatencyReport {
    endpoints: Vec<EndpointLatency>,
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
    let profile = load_profile(&args.profile).map_err(|err| err.to_string())?;
    let claim = load_claim(&args.claim).map_err(|err| err.to_string())?;

    let endpoints = resolve_endpoints(&commitment, claim.as_ref().map(|claim| claim.claim.scope.targets.as_slice()));
    let timeout = Duration::from_millis(profile.timeout_ms.unwrap_or(DEFAULT_API_TIMEOUT_MS));
    let client = Client::builder().timeout(timeout).build().map_err(|err| err.to_string())?;

    match args.capability.as_str() {
        "api:check" => {
            let mut schema_hash: Option<String> = None;
            let mut results = Vec::with_capacity(endpoints.len());
            for spec in &endpoints {
                let (status, latency_ms) = probe_once(&client, spec);
                let (schema_ok, schema_errors) = match &spec.schema {
                    Some(schema) if profile.validate_schema == Some(true) => {
                        schema_hash = Some(hash_bytes(HashAlgorithm::Sha256, serde_json::to_vec(schema).unwrap_or_default().as_slice()).value);
                        validate_last_body(&client, spec, schema)
                    }
                    _ => (None, Vec::new()),
                };
                results.push(ApiEndpointResult {
                    url: spec.url.clone(),
                    method: spec.method.clone(),
                    status,
                    latency_ms,
                    schema_ok,
                    schema_errors,
                });
            }
            let passed = results.iter().filter(|entry| entry.status < 400 && entry.schema_ok != Some(false)).count() as u64;
            let total_checked = results.len() as u64;
            let report = ApiCheckReport {
                total_checked,
                passed,
                failed: total_checked - passed,
                endpoints: results,
            };
            write_artifact(&store, &task_id, "api/check.json", &report).map_err(|err| err.to_string())?;
            if let Some(hash) = schema_hash {
                store.put(&task_id, "api/schema_hash.txt", hash.as_bytes(), true).map_err(|err| err.to_string())?;
            }
        }
        "api:latency" => {
            let mut results = Vec::with_capacity(endpoints.len());
            for spec in &endpoints {
                let mut samples = Vec::with_capacity(LATENCY_SAMPLES as usize);
                for _ in 0..LATENCY_SAMPLES {
                    let (_, latency_ms) = probe_once(&client, spec);
                    samples.push(latency_ms);
                }
                let mut sorted = samples.clone();
                sorted.sort_unstable();
                results.push(EndpointLatency {
                    url: spec.url.clone(),
                    method: spec.method.clone(),
                    p50_ms: percentile(&sorted, 50),
                    p95_ms: percentile(&sorted, 95),
                    samples,
                });
            }
            let report = ApiLatencyReport {
                endpoints: results,
            };
            write_artifact(&store, &task_id, "api/latency.json", &report).map_err(|err| err.to_string())?;
        }
        other => return Err(format!("unsupported capability: {other}")),
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Endpoint Resolution
// ============================================================================

fn resolve_endpoints(commitment: &Commitment, claim_targets: Option<&[String]>) -> Vec<EndpointSpec> {
    if let Some(raw) = commitment.quality.get("endpoints")
        && let Ok(specs) = serde_json::from_value::<Vec<EndpointSpec>>(raw.clone())
    {
        return specs;
    }
    claim_targets
        .unwrap_or_default()
        .iter()
        .map(|url| EndpointSpec {
            url: url.clone(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
            schema: None,
        })
        .collect()
}

// ============================================================================
// SECTION: Probing
// ============================================================================

fn probe_once(client: &Client, spec: &EndpointSpec) -> (u16, u64) {
    let start = Instant::now();
    let mut request = client.request(parse_method(&spec.method), &spec.url);
    for (name, value) in &spec.headers {
        request = request.header(name, value);
    }
    if let Some(body) = &spec.body {
        request = request.json(body);
    }
    let status = request.send().map(|response| response.status().as_u16()).unwrap_or(599);
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    (status, latency_ms)
}

fn validate_last_body(client: &Client, spec: &EndpointSpec, schema: &serde_json::Value) -> (Option<bool>, Vec<String>) {
    let mut request = client.request(parse_method(&spec.method), &spec.url);
    for (name, value) in &spec.headers {
        request = request.header(name, value);
    }
    let Ok(response) = request.send() else {
        return (Some(false), vec!["request failed".to_string()]);
    };
    let Ok(body) = response.json::<serde_json::Value>() else {
        return (Some(false), vec!["response body is not valid JSON".to_string()]);
    };
    let Ok(validator) = jsonschema::options().with_draft(Draft::Draft7).should_validate_formats(true).build(schema) else {
        return (Some(false), vec!["schema itself is invalid".to_string()]);
    };
    let errors: Vec<String> = validator.iter_errors(&body).map(|error| error.to_string()).collect();
    (Some(errors.is_empty()), errors)
}

fn parse_method(method: &str) -> reqwest::Method {
    method.parse().unwrap_or(reqwest::Method::GET)
}

fn percentile(sorted: &[u64], pct: u64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let pct = usize::try_from(pct).unwrap_or(100);
    let rank = (sorted.len().saturating_sub(1) * pct) / 100;
    sorted[rank]
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
