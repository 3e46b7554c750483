//! Drying-optimization analysis boundary
//!
//! The analysis itself (a language model turning live readings into
//! recommendations) lives outside this crate. This module defines the
//! request/response schema, the reference drying profile, the prompt the
//! model is given, and the [`Analyzer`] trait a backend implements.

pub mod prompt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::Snapshot;

pub use prompt::Prompt;

/// Parameters of a drying run sent by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub dryer: String,
    pub crop: String,
    pub initial_moisture_content: String,
    pub final_moisture_content: String,
    pub timestamp: DateTime<Utc>,
}

/// Recommendations produced by the analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationResponse {
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub estimated_moisture_content: String,
    #[serde(default)]
    pub optimal_drying_time_range: String,
}

impl OptimizationResponse {
    /// Response returned when the analysis backend fails
    pub fn fallback() -> Self {
        Self {
            recommendations: vec!["An error occurred during optimization".to_string()],
            estimated_moisture_content: String::new(),
            optimal_drying_time_range: String::new(),
        }
    }
}

/// Reference drying conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryingProfile {
    /// Optimal air temperature range (°C)
    pub optimal_temp_range: String,
    /// Optimal air velocity range (m/s)
    pub optimal_velocity_range: String,
    /// Typical drying time range (hours)
    pub optimal_drying_time_range: String,
    /// Temperature above which the crop is damaged (°C)
    pub critical_temp: String,
    /// Recommended final moisture content (%)
    pub recommended_moisture_content: String,
}

impl Default for DryingProfile {
    fn default() -> Self {
        Self {
            optimal_temp_range: "55 - 65".to_string(),
            optimal_velocity_range: "1 - 2".to_string(),
            optimal_drying_time_range: "6 - 10".to_string(),
            critical_temp: "70".to_string(),
            recommended_moisture_content: "10 - 20".to_string(),
        }
    }
}

/// Everything the analysis needs for one request
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub request: OptimizationRequest,
    pub snapshot: Snapshot,
    pub profile: DryingProfile,
}

impl AnalysisInput {
    pub fn new(request: OptimizationRequest, snapshot: Snapshot, profile: DryingProfile) -> Self {
        Self {
            request,
            snapshot,
            profile,
        }
    }

    /// Hours since the live reading arrived
    pub fn drying_time_elapsed_hours(&self) -> f64 {
        self.snapshot.elapsed_hours()
    }

    /// Render the model prompt for this input
    pub fn render_prompt(&self) -> Prompt {
        Prompt::render(self)
    }
}

/// Analysis failures
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No backend configured
    #[error("analysis backend unavailable")]
    Unavailable,

    /// Backend call failed
    #[error("analysis backend failed: {0}")]
    Backend(String),

    /// Backend replied with something that is not an `OptimizationResponse`
    #[error("invalid analysis output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

/// A drying-optimization backend
#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn analyse(&self, input: &AnalysisInput) -> Result<OptimizationResponse, AnalysisError>;
}

/// Analyzer used when no model backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAnalyzer;

#[async_trait]
impl Analyzer for OfflineAnalyzer {
    async fn analyse(&self, _input: &AnalysisInput) -> Result<OptimizationResponse, AnalysisError> {
        Err(AnalysisError::Unavailable)
    }
}

/// Parse a model's raw reply, tolerating a fenced ```json block around it
pub fn parse_response(raw: &str) -> Result<OptimizationResponse, AnalysisError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    Ok(serde_json::from_str(body.trim())?)
}
