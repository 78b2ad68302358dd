//! Pattern clock: turns a [`Pattern`] into timed phase transitions.
//!
//! ```text
//! on_phase(true, p[0]) -> sleep p[0] -> on_phase(false, p[1]) -> sleep p[1] -> ... -> on_phase(false, 0)
//! ```
//!
//! The trailing `on_phase(false, 0)` is always issued, whether the run
//! completes, is cancelled, or fails, so "off" is the last observable state.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::pattern::Pattern;

/// Receives phase boundaries from the clock.
#[async_trait]
pub trait PhaseSink: Send {
    /// Apply one phase. `hold` is how long the phase lasts; the forced
    /// terminal phase has `hold == Duration::ZERO`.
    async fn on_phase(&mut self, engaged: bool, hold: Duration) -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOutcome {
    Completed,
    Cancelled,
}

pub struct PatternClock;

impl PatternClock {
    /// Run `pattern` against `sink` until it finishes or `cancel` fires.
    ///
    /// Cancellation is checked before and after each phase callback, and the
    /// inter-phase sleep is raced against the token so a stop wakes the clock
    /// without waiting out the phase.
    pub async fn run<S>(
        pattern: &Pattern,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<ClockOutcome, PlatformError>
    where
        S: PhaseSink + ?Sized,
    {
        let outcome = Self::run_phases(pattern, sink, cancel).await;
        let off = sink.on_phase(false, Duration::ZERO).await;

        match (outcome, off) {
            (Ok(ClockOutcome::Completed), Err(err)) => Err(err),
            (Ok(outcome), Err(err)) => {
                warn!(error = %err, "failed to force effect off after cancellation");
                Ok(outcome)
            }
            (Err(err), Err(off_err)) => {
                warn!(error = %off_err, "failed to force effect off after phase error");
                Err(err)
            }
            (result, Ok(())) => result,
        }
    }

    async fn run_phases<S>(
        pattern: &Pattern,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<ClockOutcome, PlatformError>
    where
        S: PhaseSink + ?Sized,
    {
        for (index, (engaged, hold)) in pattern.phases().enumerate() {
            if cancel.is_cancelled() {
                debug!(phase = index, "pattern cancelled before phase");
                return Ok(ClockOutcome::Cancelled);
            }
            sink.on_phase(engaged, hold).await?;
            if cancel.is_cancelled() {
                debug!(phase = index, "pattern cancelled after phase start");
                return Ok(ClockOutcome::Cancelled);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(phase = index, "pattern cancelled during hold");
                    return Ok(ClockOutcome::Cancelled);
                }
                _ = tokio::time::sleep(hold) => {}
            }
        }
        Ok(ClockOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PresetName;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<bool>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl PhaseSink for Recorder {
        async fn on_phase(&mut self, engaged: bool, _hold: Duration) -> Result<(), PlatformError> {
            self.calls.push(engaged);
            if self.fail_on_call == Some(self.calls.len()) {
                return Err(PlatformError::Io("boom".into()));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_with_forced_off() {
        let mut rec = Recorder::default();
        let token = CancellationToken::new();
        let pattern = PresetName::Short.pattern();

        let outcome = PatternClock::run(&pattern, &mut rec, &token).await.unwrap();

        assert_eq!(outcome, ClockOutcome::Completed);
        assert_eq!(rec.calls, vec![true, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_off_phase_ends_off() {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut rec = Recorder::default();
            let outcome = PatternClock::run(&PresetName::Medium.pattern(), &mut rec, &child).await;
            (outcome, rec.calls)
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        token.cancel();
        let (outcome, calls) = handle.await.unwrap();

        assert_eq!(outcome.unwrap(), ClockOutcome::Cancelled);
        assert_eq!(calls, vec![true, false, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_only_forces_off() {
        let mut rec = Recorder::default();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = PatternClock::run(&PresetName::Long.pattern(), &mut rec, &token)
            .await
            .unwrap();

        assert_eq!(outcome, ClockOutcome::Cancelled);
        assert_eq!(rec.calls, vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn phase_error_propagates_after_forcing_off() {
        let mut rec = Recorder {
            fail_on_call: Some(2),
            ..Default::default()
        };
        let token = CancellationToken::new();

        let result = PatternClock::run(&PresetName::Urgent.pattern(), &mut rec, &token).await;

        assert_eq!(result, Err(PlatformError::Io("boom".into())));
        assert_eq!(rec.calls, vec![true, false, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_phases_still_fire() {
        let mut rec = Recorder::default();
        let token = CancellationToken::new();
        let pattern = Pattern::new(vec![0, 0, 0, 0]).unwrap();

        PatternClock::run(&pattern, &mut rec, &token).await.unwrap();

        assert_eq!(rec.calls, vec![true, false, true, false, false]);
    }

    proptest! {
        #[test]
        fn invokes_sink_len_plus_one_times(durations in prop::collection::vec(0u64..50, 1..12)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let pattern = Pattern::new(durations.clone()).unwrap();
            let calls = rt.block_on(async {
                let mut rec = Recorder::default();
                let token = CancellationToken::new();
                PatternClock::run(&pattern, &mut rec, &token).await.unwrap();
                rec.calls
            });
            prop_assert_eq!(calls.len(), durations.len() + 1);
            prop_assert_eq!(calls.last(), Some(&false));
        }
    }
}
