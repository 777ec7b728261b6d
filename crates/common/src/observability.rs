use std::borrow::Cow;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Flushes the global tracer provider when dropped. Hold it until the run ends.
pub struct OtelGuard {
    _private: (),
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

struct ErrorCounterLayer;

impl<S> Layer<S> for ErrorCounterLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level == tracing::Level::ERROR {
            metrics::counter!("tracing_error_events").increment(1);
        } else if level == tracing::Level::WARN {
            metrics::counter!("tracing_warn_events").increment(1);
        }
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Batch span exporter for the collector named by `OTEL_EXPORTER_OTLP_ENDPOINT`.
/// `None` when the variable is unset or the exporter cannot be built.
fn otlp_tracer(service_name: Cow<'static, str>) -> Option<opentelemetry_sdk::trace::Tracer> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .ok()?;

    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([
            KeyValue::new("service.name", service_name.into_owned()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build();
    let tracer = provider.tracer("wallet_credit_scorer");
    let _ = opentelemetry::global::set_tracer_provider(provider);
    Some(tracer)
}

/// Build a `tracing` dispatcher for a batch run:
/// - JSON logs to stdout
/// - `RUST_LOG` wins over `default_level`
/// - `tracing_error_events` / `tracing_warn_events` counters
/// - OTLP span export only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///
/// The OTLP exporter batches on the Tokio runtime, so call this from inside one.
pub fn build_dispatch(
    service_name: impl Into<Cow<'static, str>>,
    default_level: &str,
) -> (tracing::Dispatch, Option<OtelGuard>) {
    let json_logs = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let base = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(json_logs)
        .with(ErrorCounterLayer);

    match otlp_tracer(service_name.into()) {
        Some(tracer) => (
            tracing::Dispatch::new(base.with(tracing_opentelemetry::layer().with_tracer(tracer))),
            Some(OtelGuard { _private: () }),
        ),
        None => (tracing::Dispatch::new(base), None),
    }
}
