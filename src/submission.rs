//! Outbound test submission and evaluation results.
//!
//! A finished session is packaged into one multipart request: a `meta`
//! JSON document describing every card, plus one binary part per card that
//! actually finished recording, field-named `audio_<cardId>`. Cards with
//! no artifact are omitted, never padded. The assembled submission stays
//! in memory so a failed upload can be retried without re-recording.

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capture::Artifact;
use crate::domain::Card;

/// Per-card metadata sent to the evaluation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CardMeta {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(rename = "durationSec")]
    pub duration_sec: u32,
}

/// The `meta` document of a submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionMeta {
    pub rubric: String,
    pub items: Vec<CardMeta>,
}

/// An assembled submission, retained until upload succeeds.
#[derive(Debug, Clone)]
pub struct Submission {
    pub meta: SubmissionMeta,
    /// (card id, artifact) pairs in deck order, recorded cards only
    pub recordings: Vec<(String, Artifact)>,
}

/// Package a finished session for upload.
///
/// `items` covers the whole deck; the binary parts cover only cards with a
/// recording (acquisition failures and skipped cards simply have none).
pub fn assemble(
    rubric: &str,
    deck: &[Card],
    recordings: &HashMap<String, Artifact>,
) -> Submission {
    let items = deck
        .iter()
        .map(|card| CardMeta {
            id: card.id.clone(),
            front: card.front.clone(),
            back: card.back.clone(),
            duration_sec: card.duration_sec,
        })
        .collect();

    let recorded = deck
        .iter()
        .filter_map(|card| {
            recordings
                .get(&card.id)
                .map(|artifact| (card.id.clone(), artifact.clone()))
        })
        .collect();

    Submission {
        meta: SubmissionMeta {
            rubric: rubric.to_string(),
            items,
        },
        recordings: recorded,
    }
}

/// Per-card evaluation returned by the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CardResult {
    pub id: String,
    pub front: Option<String>,
    pub back: Option<String>,
    #[serde(rename = "durationSec")]
    pub duration_sec: Option<i64>,
    pub has_audio: bool,
    #[serde(default)]
    pub transcript: String,
    pub similarity: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub extra_terms: Vec<String>,
    pub feedback: String,
    pub score: f64,
}

/// Evaluation response document.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalReport {
    pub ok: bool,
    pub session_id: String,
    pub results: Vec<CardResult>,
}

/// Submission failures, surfaced verbatim to the caller.
#[derive(Debug)]
pub enum SubmitError {
    /// The metadata document could not be encoded
    Encode(serde_json::Error),
    /// Connection-level failure, including response decoding
    Transport(reqwest::Error),
    /// The endpoint answered with a non-success status
    Endpoint { status: u16, body: String },
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Encode(e) => write!(f, "Failed to encode submission meta: {}", e),
            SubmitError::Transport(e) => write!(f, "Submission failed: {}", e),
            SubmitError::Endpoint { status, body } => {
                write!(f, "Evaluation endpoint returned {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for SubmitError {}

/// Client for the evaluation endpoint.
pub struct SubmissionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SubmissionClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Client pointed at the configured endpoint.
    pub fn from_config() -> Self {
        Self::new(crate::config::evaluation_endpoint())
    }

    /// Upload a submission and parse the evaluation report.
    ///
    /// The submission is borrowed: on failure the caller still holds the
    /// artifacts and can retry without re-recording.
    pub async fn submit(&self, submission: &Submission) -> Result<EvalReport, SubmitError> {
        let meta_json =
            serde_json::to_string(&submission.meta).map_err(SubmitError::Encode)?;

        let mut form = Form::new().text("meta", meta_json);
        for (card_id, artifact) in &submission.recordings {
            let part = Part::bytes(artifact.bytes().to_vec())
                .file_name(format!("{}.webm", card_id))
                .mime_str("audio/webm")
                .map_err(SubmitError::Transport)?;
            form = form.part(format!("audio_{}", card_id), part);
        }

        tracing::debug!(
            "submitting {} cards ({} recordings) to {}",
            submission.meta.items.len(),
            submission.recordings.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(SubmitError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<EvalReport>()
            .await
            .map_err(SubmitError::Transport)
    }
}
