//! Wire contract with the external NLP classifier (spec §6).

use ash_core::types::StoredMessage;
use ash_core::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct AnalyzeRequest<'a> {
    pub text: &'a str,
    pub user_id: &'a str,
    pub channel_id: &'a str,
    pub history: Vec<HistoryEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry<'a> {
    pub text: &'a str,
    pub timestamp: i64,
    pub crisis_score: f64,
    pub severity: Severity,
}

impl<'a> From<&'a StoredMessage> for HistoryEntry<'a> {
    fn from(m: &'a StoredMessage) -> Self {
        Self {
            text: &m.text,
            timestamp: m.timestamp,
            crisis_score: m.crisis_score,
            severity: m.severity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeResponse {
    pub crisis_score: f64,
    pub severity: Severity,
    #[serde(default)]
    pub categories: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub model_agreement: String,
    #[serde(default)]
    pub gaps_detected: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
}
