// self
use crate::{_prelude::*, obs::Stage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span tagged with the stage and the operation being performed.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span for `stage`, labeled with `op`.
	pub fn new(stage: Stage, op: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("sp_api.stage", stage = stage.as_str(), op);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, op);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn log_refresh_failure(error: &Error, retry_in: StdDuration) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%error, retry_in_ms = retry_in.as_millis() as u64, "token refresh failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (error, retry_in);
}

pub(crate) fn log_refresh_scheduled(next_in: StdDuration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(next_in_secs = next_in.as_secs(), "token refreshed");
	#[cfg(not(feature = "tracing"))]
	let _ = next_in;
}

pub(crate) fn log_refresher_stopped() {
	#[cfg(feature = "tracing")]
	tracing::info!("token refresher stopped");
}

pub(crate) fn log_throttled(attempt: u32, delay: StdDuration, request_id: Option<&str>) {
	#[cfg(feature = "tracing")]
	tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, request_id, "request throttled");
	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, delay, request_id);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = StageSpan::new(Stage::Call, "instrument_passes_output_through");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
