//! Global subscriber setup and request-scoped trace ids.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing::Instrument;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};
use uuid::Uuid;

use crate::config::AppConfig;

pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Correlation data for the request being served.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

impl TraceContext {
    pub fn generate() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
        }
    }
}

task_local! {
    static ACTIVE_TRACE_CONTEXT: TraceContext;
}

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber once. `log::` records are bridged into tracing.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        // Another LogTracer already installed is fine
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "Warning: Failed to install log tracer bridge: {}. `log::` records will not reach the subscriber.",
                err
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!(
            "Warning: Failed to set global tracing subscriber: {}. Default subscriber remains in effect.",
            err
        );
    }

    Ok(())
}

/// Run `future` with `context` available through [`current_trace_id`].
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_TRACE_CONTEXT.scope(context, future).await
}

pub fn current_trace_id() -> Option<String> {
    ACTIVE_TRACE_CONTEXT
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}

/// Assign a trace id to each request (reusing a well-formed incoming
/// `X-Trace-Id`), scope it for the handler and echo it on the response.
pub async fn trace_middleware(request: Request, next: Next) -> Response {
    let context = request
        .headers()
        .get(&TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| {
            !value.is_empty()
                && value.len() <= 64
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
        .map(|value| TraceContext {
            trace_id: value.to_string(),
        })
        .unwrap_or_else(TraceContext::generate);

    let span = tracing::info_span!(
        "request",
        trace_id = %context.trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let trace_id = context.trace_id.clone();

    let mut response = with_trace_context(context, next.run(request).instrument(span)).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trace_id_scoped_to_future() {
        assert!(current_trace_id().is_none());
        let seen = with_trace_context(
            TraceContext {
                trace_id: "abc123".to_string(),
            },
            async { current_trace_id() },
        )
        .await;
        assert_eq!(seen.as_deref(), Some("abc123"));
        assert!(current_trace_id().is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = TraceContext::generate();
        let b = TraceContext::generate();
        assert_ne!(a.trace_id, b.trace_id);
        assert_eq!(a.trace_id.len(), 32);
    }
}
