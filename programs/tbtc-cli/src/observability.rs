//! Logging to stdout with optional OpenTelemetry trace export.

use anyhow::{Context, Result};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    resource::Resource,
    trace::{Sampler, SdkTracerProvider, SpanExporter, Tracer},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::ObservabilityConfig;

/// Shuts the trace exporter down on drop, flushing pending spans.
pub struct ObservabilityGuard {
    otel_provider: Option<SdkTracerProvider>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.otel_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Keep the returned guard alive for the lifetime of the program.
pub fn init_observability(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // A closure, so every branch gets a layer typed for its own subscriber.
    let create_fmt_layer = || {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
    };
    let filter = || EnvFilter::new(config.level().as_str().to_lowercase());

    let otel_provider = if config.use_otel {
        match setup_otlp_tracer(config) {
            Ok((tracer, provider)) => {
                let subscriber = Registry::default()
                    .with(filter())
                    .with(create_fmt_layer())
                    .with(tracing_opentelemetry::layer().with_tracer(tracer));

                try_init_subscriber(subscriber)?;
                Some(provider)
            }
            Err(err) => {
                try_init_subscriber(Registry::default().with(filter()).with(create_fmt_layer()))?;
                tracing::warn!("OpenTelemetry disabled: {err}");
                None
            }
        }
    } else {
        try_init_subscriber(Registry::default().with(filter()).with(create_fmt_layer()))?;
        None
    };

    Ok(ObservabilityGuard { otel_provider })
}

fn try_init_subscriber(subscriber: impl SubscriberInitExt) -> Result<()> {
    subscriber
        .try_init()
        .context("failed to set global default subscriber")
}

fn setup_otlp_tracer(config: &ObservabilityConfig) -> Result<(Tracer, SdkTracerProvider)> {
    let resource = Resource::builder()
        .with_attributes(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_batch_exporter(build_otlp_grpc_exporter(config)?)
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    Ok((tracer, provider))
}

fn build_otlp_grpc_exporter(config: &ObservabilityConfig) -> Result<impl SpanExporter> {
    let mut exporter_builder = opentelemetry_otlp::SpanExporter::builder().with_tonic();

    if let Some(endpoint) = &config.otel_endpoint {
        exporter_builder = exporter_builder.with_endpoint(endpoint);
    }

    Ok(exporter_builder.build()?)
}
