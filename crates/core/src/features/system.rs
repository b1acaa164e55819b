//! System features derived from a sealed sampler session.

use crate::metric_names::{avg_feature, peak_feature};
use crate::types::{FeatureMap, SamplerSession, SAMPLE_COLUMNS};

/// Average and peak of every sample column over one session.
///
/// Columns are aggregated independently: a reading missing one column
/// still contributes to the others. Only readings inside the session
/// window count. A column with no present values reports "no data" for
/// both its average and peak, which also covers an empty session.
pub fn extract(session: &SamplerSession) -> FeatureMap {
    let mut features = FeatureMap::new();

    for column in SAMPLE_COLUMNS {
        let values: Vec<f64> = session
            .in_window()
            .filter_map(|reading| reading.value(column))
            .filter(|v| v.is_finite())
            .collect();

        let (avg, peak) = if values.is_empty() {
            (None, None)
        } else {
            let sum: f64 = values.iter().sum();
            let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (Some(sum / values.len() as f64), Some(peak))
        };

        features.insert(avg_feature(column), avg);
        features.insert(peak_feature(column), peak);
    }

    features
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::types::SampleReading;

    fn cpu_reading(base: Instant, millis: u64, cpu: Option<f64>) -> SampleReading {
        SampleReading {
            cpu_percent: cpu,
            ..SampleReading::empty(base + Duration::from_millis(millis))
        }
    }

    #[test]
    fn average_and_peak_over_present_values() {
        let base = Instant::now();
        let session = SamplerSession::seal(
            vec![
                cpu_reading(base, 0, Some(10.0)),
                cpu_reading(base, 500, Some(20.0)),
                cpu_reading(base, 1000, Some(30.0)),
            ],
            base,
            base + Duration::from_secs(1),
        );

        let features = extract(&session);
        assert_eq!(features["avg_cpu_percent"], Some(20.0));
        assert_eq!(features["peak_cpu_percent"], Some(30.0));
    }

    #[test]
    fn absent_values_are_skipped_not_zeroed() {
        let base = Instant::now();
        let session = SamplerSession::seal(
            vec![
                cpu_reading(base, 0, Some(10.0)),
                cpu_reading(base, 200, None),
                cpu_reading(base, 400, Some(30.0)),
            ],
            base,
            base + Duration::from_secs(1),
        );

        assert_eq!(extract(&session)["avg_cpu_percent"], Some(20.0));
    }

    #[test]
    fn all_absent_column_is_no_data() {
        let base = Instant::now();
        let session = SamplerSession::seal(
            vec![cpu_reading(base, 0, Some(10.0))],
            base,
            base + Duration::from_secs(1),
        );

        let features = extract(&session);
        assert_eq!(features["avg_gpu_load_percent"], None);
        assert_eq!(features["peak_gpu_mem_percent"], None);
    }

    #[test]
    fn empty_session_reports_no_data_everywhere() {
        let base = Instant::now();
        let session = SamplerSession::seal(vec![], base, base);

        let features = extract(&session);
        assert_eq!(features.len(), SAMPLE_COLUMNS.len() * 2);
        assert!(features.values().all(Option::is_none));
    }

    #[test]
    fn samples_after_end_time_are_excluded_from_peak() {
        let base = Instant::now();
        let session = SamplerSession::seal(
            vec![
                cpu_reading(base, 0, Some(10.0)),
                cpu_reading(base, 1200, Some(99.0)),
            ],
            base,
            base + Duration::from_secs(1),
        );

        let features = extract(&session);
        assert_eq!(features["peak_cpu_percent"], Some(10.0));
        assert_eq!(features["avg_cpu_percent"], Some(10.0));
    }

    #[test]
    fn extraction_is_idempotent() {
        let base = Instant::now();
        let session = SamplerSession::seal(
            vec![
                cpu_reading(base, 0, Some(12.5)),
                cpu_reading(base, 100, Some(47.25)),
            ],
            base,
            base + Duration::from_millis(150),
        );

        assert_eq!(
            serde_json::to_string(&extract(&session)).unwrap(),
            serde_json::to_string(&extract(&session)).unwrap()
        );
    }
}
