//! Error types for policy construction and gated access

use thiserror::Error;

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Direction of a gated property access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOperation {
    Get,
    Set,
}

impl std::fmt::Display for GateOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateOperation::Get => f.write_str("get"),
            GateOperation::Set => f.write_str("set"),
        }
    }
}

/// Policy errors
///
/// Evaluation never fails: a request that matches nothing is a plain `false`.
/// Errors only come from building statements, decoding documents, or the
/// property gate refusing an access.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Statement has neither the positive nor the negated field for an axis
    #[error("{shape} statement requires `{axis}` or `not{axis_title}`", axis_title = title_case(.axis))]
    MissingAxis {
        shape: &'static str,
        axis: &'static str,
    },

    /// Statement carries both the positive and the negated field for an axis
    #[error("{shape} statement cannot combine `{axis}` with `not{axis_title}`", axis_title = title_case(.axis))]
    ConflictingAxis {
        shape: &'static str,
        axis: &'static str,
    },

    /// JSON policy document could not be decoded
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML policy document could not be decoded
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Property gate refused the access
    #[error("Unauthorized to {operation} {property} property")]
    AccessDenied {
        operation: GateOperation,
        property: String,
    },
}

fn title_case(axis: &str) -> String {
    let mut chars = axis.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
