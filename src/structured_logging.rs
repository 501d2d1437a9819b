use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;
use crate::errors::DecodeError;
use crate::felt::Address;
use crate::memecoin::Resolution;
use crate::security::SafetyAssessment;

/// Global correlation ID generator
static CORRELATION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new correlation ID
pub fn new_correlation_id() -> u64 {
    CORRELATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
/// A second call is a no-op.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Structured logging with correlation ID support
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    correlation_id: u64,
    component: String,
}

impl StructuredLogger {
    pub fn new(component: &str) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            component: component.to_string(),
        }
    }

    pub fn with_correlation_id(component: &str, correlation_id: u64) -> Self {
        Self {
            correlation_id,
            component: component.to_string(),
        }
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    fn entry(&self, level: &str, message: &str, fields: serde_json::Value) -> serde_json::Value {
        json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level,
            "component": self.component,
            "correlation_id": self.correlation_id,
            "message": message,
            "fields": fields
        })
    }

    fn log_structured(&self, level: &str, message: &str, fields: serde_json::Value) {
        let line = self.entry(level, message, fields).to_string();
        match level {
            "DEBUG" => debug!(target: "structured", "{}", line),
            "WARN" => warn!(target: "structured", "{}", line),
            "ERROR" => error!(target: "structured", "{}", line),
            _ => info!(target: "structured", "{}", line),
        }
    }

    pub fn info(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("INFO", message, fields);
    }

    pub fn warn(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("WARN", message, fields);
    }

    pub fn error(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("ERROR", message, fields);
    }

    pub fn debug(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("DEBUG", message, fields);
    }

    pub fn log_resolution(&self, memecoin: &Address, resolution: &Resolution, latency_ms: u64) {
        let state = resolution.memecoin();
        let fields = json!({
            "memecoin": memecoin.to_string(),
            "outcome": resolution.label(),
            "launched": state.map(|s| s.is_launched()),
            "symbol": state.map(|s| s.base.symbol.as_str()),
            "latency_ms": latency_ms,
            "action": "resolve"
        });
        match resolution {
            Resolution::TransientError { reason } => self.warn(
                "resolution_transient",
                json!({ "memecoin": memecoin.to_string(), "reason": reason, "latency_ms": latency_ms }),
            ),
            Resolution::Indexing => self.info("resolution_indexing", fields),
            _ => self.debug("resolution_complete", fields),
        }
    }

    pub fn log_decode_failure(&self, memecoin: &Address, failure: &DecodeError) {
        self.error("decode_mismatch", json!({
            "memecoin": memecoin.to_string(),
            "error": failure.to_string(),
            "action": "resolve"
        }));
    }

    pub fn log_safety(&self, memecoin: &Address, assessment: &SafetyAssessment) {
        self.info("safety_assessed", json!({
            "memecoin": memecoin.to_string(),
            "aggregate": assessment.aggregate.to_string(),
            "flagged": assessment.flagged().iter().map(|(metric, tier)| format!("{metric}={tier}")).collect::<Vec<_>>(),
            "action": "classify"
        }));
    }

    pub fn log_launch_calldata(&self, memecoin: &Address, amm: &str, calls: usize) {
        self.info("launch_calldata_built", json!({
            "memecoin": memecoin.to_string(),
            "amm": amm,
            "calls": calls,
            "action": "build_launch"
        }));
    }
}

/// Pipeline context that carries correlation ID through operations
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub correlation_id: u64,
    pub logger: StructuredLogger,
}

impl PipelineContext {
    pub fn new(component: &str) -> Self {
        let logger = StructuredLogger::new(component);
        let correlation_id = logger.correlation_id();
        Self {
            correlation_id,
            logger,
        }
    }

    pub fn with_correlation_id(component: &str, correlation_id: u64) -> Self {
        let logger = StructuredLogger::with_correlation_id(component, correlation_id);
        Self {
            correlation_id,
            logger,
        }
    }

    pub fn child(&self, component: &str) -> Self {
        Self::with_correlation_id(component, self.correlation_id)
    }
}
