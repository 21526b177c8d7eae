//! Structured action results
//!
//! Every action, successful or not, ends in exactly one `ActionReport` so an
//! orchestrating caller always has a result object to inspect.

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CheckExists,
    Create,
    AddPr,
    CheckPromotion,
    CheckResponse,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CheckExists => "check_exists",
            Action::Create => "create",
            Action::AddPr => "add_pr",
            Action::CheckPromotion => "check_promotion",
            Action::CheckResponse => "check_response",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub action: Action,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ActionReport {
    /// Successful action carrying its outcome as JSON.
    pub fn completed<T: Serialize>(action: Action, message: impl Into<String>, outcome: &T) -> Self {
        match serde_json::to_value(outcome) {
            Ok(value) => Self {
                action,
                success: true,
                message: message.into(),
                error_kind: None,
                recoverable: None,
                result: Some(value),
            },
            Err(e) => Self {
                action,
                success: false,
                message: format!("Failed to encode result: {e}"),
                error_kind: Some("serialization".to_string()),
                recoverable: Some(false),
                result: None,
            },
        }
    }

    /// Action that ran but did not achieve its effect (e.g. invalid identity).
    pub fn rejected<T: Serialize>(action: Action, message: impl Into<String>, outcome: &T) -> Self {
        let mut report = Self::completed(action, message, outcome);
        report.success = false;
        report
    }

    pub fn failed(action: Action, error: &RegistryError) -> Self {
        Self {
            action,
            success: false,
            message: error.to_string(),
            error_kind: Some(error.kind().to_string()),
            recoverable: Some(error.is_recoverable()),
            result: None,
        }
    }

    pub fn from_result<T: Serialize>(
        action: Action,
        message: impl Into<String>,
        result: Result<T, RegistryError>,
    ) -> Self {
        match result {
            Ok(outcome) => Self::completed(action, message, &outcome),
            Err(e) => Self::failed(action, &e),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                r#"{{"action":"{}","success":false,"message":"report encoding failed: {}"}}"#,
                self.action,
                e.to_string().replace('"', "'")
            )
        })
    }
}
