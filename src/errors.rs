use thiserror::Error;

/// Errors that abort a simulation before the main loop starts.
///
/// Local conditions (no gate, no path, no free runway) are not errors:
/// the spawner or movement kernel handles them in place and the run
/// continues.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Layout validation failed")]
    LayoutInvalid { details: Vec<String> },

    #[error("Parameter validation failed")]
    ParamInvalid { details: Vec<String> },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal simulation error")]
    Internal(String),
}

impl SimError {
    /// Detail messages for the error result document.
    pub fn details(&self) -> Vec<String> {
        match self {
            SimError::LayoutInvalid { details } | SimError::ParamInvalid { details } => {
                details.clone()
            }
            SimError::Json(e) => vec![e.to_string()],
            SimError::Internal(msg) => vec![msg.clone()],
        }
    }

    /// Render as the error result JSON defined by the driver contract:
    /// `{error, details}` for pre-run failures, `{error, traceback}`
    /// for an uncaught failure inside the loop.
    pub fn to_result_json(&self) -> serde_json::Value {
        match self {
            SimError::Internal(msg) => serde_json::json!({
                "error": self.to_string(),
                "traceback": msg,
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
                "details": self.details(),
            }),
        }
    }
}
