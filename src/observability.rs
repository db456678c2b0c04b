//! Correlation and trace identifiers for submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID shared by every span of one caller request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Trace identifiers attached to a submission and its log span
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub correlation_id: CorrelationId,
    pub parent_span_id: Option<String>,
    /// What is being traced, e.g. `submit` or `estimate`
    pub operation: String,
    pub started_at: DateTime<Utc>,
}

impl TraceContext {
    pub fn new(operation: &str) -> Self {
        Self::with_correlation(operation, CorrelationId::new())
    }

    /// Root span joined to a caller-supplied correlation id
    pub fn with_correlation(operation: &str, correlation_id: CorrelationId) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id,
            parent_span_id: None,
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }

    /// Same trace and correlation, new span parented to this one
    pub fn child_span(&self, operation: &str) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id: self.correlation_id.clone(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new("default")
    }
}
