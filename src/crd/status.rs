//! # TemplatedSecret Status
//!
//! Status types for reporting the outcome of the last reconciliation pass.

use serde::{Deserialize, Serialize};

/// Status of the TemplatedSecret resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplatedSecretStatus {
    /// Human-readable outcome of the last reconciliation
    /// Examples: "Secret 'team-a/app' is up to date.",
    /// "Unable to resolve variable '$(db > host)' because the secret does not exist."
    #[serde(default)]
    pub message: String,
    /// Generation of the spec the message refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
