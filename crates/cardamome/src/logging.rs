//! Tracing setup for hosts embedding the engine
//!
//! Provides:
//! - [`init_tracing`] / [`try_init_tracing`]: an fmt subscriber filtered by `RUST_LOG`
//! - [`SlowSpanLayer`]: reports `render` and `action` spans that run long

use std::time::{Duration, Instant};
use tracing::Subscriber;
use tracing::span::{Attributes, Id};
use tracing_subscriber::{
    Layer,
    filter::EnvFilter,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
};

/// Spans at least this long are reported by the default layer
pub const SLOW_SPAN_THRESHOLD: Duration = Duration::from_millis(50);

/// Span names the engine opens around templates and action invocations
const TIMED_SPANS: &[&str] = &["render", "action"];

/// A span that ran past the threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowSpan {
    pub name: &'static str,
    pub elapsed: Duration,
}

type Report = Box<dyn Fn(SlowSpan) + Send + Sync>;

/// Times engine spans and reports the slow ones
pub struct SlowSpanLayer {
    threshold: Duration,
    report: Report,
}

impl SlowSpanLayer {
    /// Report slow spans as `warn` events
    pub fn new(threshold: Duration) -> Self {
        Self::with_report(threshold, |slow| {
            tracing::warn!(
                span = slow.name,
                elapsed_ms = slow.elapsed.as_millis() as u64,
                "slow {}",
                slow.name
            );
        })
    }

    pub fn with_report(threshold: Duration, report: impl Fn(SlowSpan) + Send + Sync + 'static) -> Self {
        Self {
            threshold,
            report: Box::new(report),
        }
    }
}

/// Extension data stored with each timed span
struct SpanTiming {
    start: Instant,
}

impl<S> Layer<S> for SlowSpanLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !TIMED_SPANS.contains(&attrs.metadata().name()) {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanTiming {
                start: Instant::now(),
            });
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let elapsed = match span.extensions().get::<SpanTiming>() {
            Some(timing) => timing.start.elapsed(),
            None => return,
        };
        if elapsed >= self.threshold {
            (self.report)(SlowSpan {
                name: span.name(),
                elapsed,
            });
        }
    }
}

/// Install the standard subscriber (uses the `RUST_LOG` env var, `info` by default)
pub fn try_init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(filter),
        )
        .with(SlowSpanLayer::new(SLOW_SPAN_THRESHOLD))
        .try_init()
}

/// Like [`try_init_tracing`], leaving an already installed subscriber in place
pub fn init_tracing() {
    if let Err(err) = try_init_tracing() {
        tracing::debug!(%err, "tracing already initialized");
    }
}
