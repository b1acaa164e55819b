//! Per-run sampling session.
//!
//! [`run_sampled`] wraps one model call with a background task that polls
//! the [`SamplerSet`] on a fixed interval. The task is cancelled and joined
//! before the session is sealed, so the returned readings are complete and
//! nothing is sampled on behalf of this run afterwards.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lminsight_core::config::DEFAULT_SAMPLING_INTERVAL_MS;
use lminsight_core::types::{SampleReading, SamplerSession};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sampler::SamplerSet;

/// Default interval between readings.
pub const DEFAULT_SAMPLING_INTERVAL: Duration =
    Duration::from_millis(DEFAULT_SAMPLING_INTERVAL_MS);

/// Await `call` while sampling host resources, returning its output and
/// the sealed session.
///
/// `start_time` is taken immediately before the call and `end_time`
/// immediately after it resolves. If `call` is dropped mid-flight by an
/// outer timeout, wrap the timeout *inside* `call` instead so the session
/// still closes: the window then ends when the timeout fires.
pub async fn run_sampled<F, T>(
    samplers: Arc<SamplerSet>,
    interval: Duration,
    call: F,
) -> (T, SamplerSession)
where
    F: Future<Output = T>,
{
    let cancel = CancellationToken::new();

    let start_time = Instant::now();
    let task = tokio::spawn(sample_until_cancelled(samplers, interval, cancel.clone()));

    let output = call.await;
    let end_time = Instant::now();

    cancel.cancel();
    let readings = match task.await {
        Ok(readings) => readings,
        Err(e) => {
            tracing::error!(error = %e, "Sampling task failed -- run has no system samples");
            Vec::new()
        }
    };

    tracing::debug!(
        samples = readings.len(),
        elapsed_ms = end_time.saturating_duration_since(start_time).as_millis() as u64,
        "Sampling session sealed",
    );

    (output, SamplerSession::seal(readings, start_time, end_time))
}

/// Poll every sampler each tick until `cancel` fires.
///
/// Readings stay local to this task and are handed back through the join
/// handle; nothing else is written.
async fn sample_until_cancelled(
    samplers: Arc<SamplerSet>,
    interval: Duration,
    cancel: CancellationToken,
) -> Vec<SampleReading> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut readings = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match samplers.read_all(Instant::now()) {
                    Some(reading) => readings.push(reading),
                    None => tracing::debug!("Sample dropped -- no sampler produced data"),
                }
            }
        }
    }

    readings
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::sampler::{MetricSampler, Reading, SamplerKind};

    struct CountingCpu {
        calls: Arc<AtomicUsize>,
    }

    impl MetricSampler for CountingCpu {
        fn kind(&self) -> SamplerKind {
            SamplerKind::Cpu
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn sample(&self) -> Option<Reading> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Some(Reading::Cpu {
                percent: 10.0 * (n + 1) as f64,
                load_1m_normalized: None,
            })
        }
    }

    fn counting_set() -> (Arc<SamplerSet>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = SamplerSet::new(vec![Box::new(CountingCpu {
            calls: Arc::clone(&calls),
        })]);
        (Arc::new(set), calls)
    }

    fn max_samples(session: &SamplerSession, interval: Duration) -> usize {
        let ratio = session.duration().as_secs_f64() / interval.as_secs_f64();
        ratio.ceil() as usize + 1
    }

    #[tokio::test(start_paused = true)]
    async fn samples_during_call_within_bounds() {
        let (set, _) = counting_set();
        let interval = Duration::from_millis(500);

        let (value, session) = run_sampled(set, interval, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        })
        .await;

        assert_eq!(value, 7);
        assert_eq!(session.duration(), Duration::from_secs(1));
        assert!(!session.readings().is_empty());
        assert!(session.readings().len() <= max_samples(&session, interval));

        let stamps: Vec<_> = session.readings().iter().map(|r| r.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert!(stamps.iter().all(|t| *t >= session.start_time()));
    }

    #[test]
    fn default_interval_matches_config_default() {
        assert_eq!(
            DEFAULT_SAMPLING_INTERVAL,
            lminsight_core::config::BenchConfig::default().sampling_interval()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn instant_call_yields_at_most_one_reading() {
        let (set, _) = counting_set();

        let (_, session) = run_sampled(set, DEFAULT_SAMPLING_INTERVAL, async {}).await;

        assert!(session.readings().len() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_sampling_after_session_returns() {
        let (set, calls) = counting_set();

        let (_, session) = run_sampled(set, Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(350)).await;
        })
        .await;

        let calls_at_seal = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(calls.load(Ordering::SeqCst), calls_at_seal);
        assert_eq!(session.readings().len(), calls_at_seal);
    }
}
