// gate-monitor/src/client.rs
// ============================================================================
// Module: client
// Description: Blocking HTTP push client implementing
//              `gate_orchestrator::VerdictSink` (spec.md §4.9-§4.10).
// Dependencies: gate-core, gate-orchestrator, reqwest
// ============================================================================

//! ## Overview
//! [`Orchestrator::run_task`](gate_orchestrator::Orchestrator::run_task)
//! calls [`gate_orchestrator::VerdictSink::push`] synchronously between
//! adapter-plan steps and state transitions, so this client uses
//! `reqwest::blocking` rather than an async client the Orchestrator would
//! have no runtime to drive.

use gate_core::Verdict;
use gate_orchestrator::SinkError;
use gate_orchestrator::VerdictSink;

/// Posts verdicts to a running Monitor's `POST /api/verdict`.
pub struct HttpVerdictSink {
    /// Monitor base URL, e.g. `http://127.0.0.1:8090`.
    base_url: String,
    /// Blocking HTTP client.
    client: reqwest::blocking::Client,
}

impl HttpVerdictSink {
    /// Builds a sink that pushes to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpVerdictSinkError::Build`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, HttpVerdictSinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(HttpVerdictSinkError::Build)?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

impl VerdictSink for HttpVerdictSink {
    fn push(&self, verdict: &Verdict) -> Result<(), SinkError> {
        let url = format!("{}/api/verdict", self.base_url);
        let response = self
            .client
            .post(url)
            .json(verdict)
            .send()
            .map_err(|err| SinkError(format!("monitor push request failed: {err}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError(format!("monitor push rejected with status {}", response.status())))
        }
    }
}

/// Errors raised while building an [`HttpVerdictSink`].
#[derive(Debug, thiserror::Error)]
pub enum HttpVerdictSinkError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build monitor http client: {0}")]
    Build(#[source] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_builds_with_a_valid_base_url() {
        assert!(HttpVerdictSink::new("http://127.0.0.1:8090").is_ok());
    }
}
