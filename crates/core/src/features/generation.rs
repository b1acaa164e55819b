//! Generation features derived from timestamps and backend counters.

use std::collections::HashSet;

use tokio::time::Instant;

use crate::metric_names::{
    FEATURE_BACKEND_TOTAL_SECONDS, FEATURE_COMPLETION_TOKENS, FEATURE_EVAL_TOKENS_PER_SECOND,
    FEATURE_LATENCY_SECONDS, FEATURE_LOAD_DURATION_SECONDS, FEATURE_PROMPT_TOKENS,
    FEATURE_RESPONSE_LENGTH, FEATURE_TOKENS_PER_SECOND, FEATURE_UNIQUE_WORDS_RATIO,
    GENERATION_FEATURES,
};
use crate::types::{FeatureMap, GenerationResult};

/// Compute generation features for one run.
///
/// `result` is `None` for failed or timed-out runs, in which case every
/// generation feature is "no data". Latency always comes from the
/// monotonic `start`/`end` pair, never from the backend's own clock.
pub fn extract(result: Option<&GenerationResult>, start: Instant, end: Instant) -> FeatureMap {
    let mut features: FeatureMap = GENERATION_FEATURES
        .iter()
        .map(|name| (name.to_string(), None))
        .collect();

    let Some(result) = result else {
        return features;
    };

    let latency = end.saturating_duration_since(start).as_secs_f64();
    let tokens = result.token_count.map(|n| n as f64);

    let mut set = |name: &str, value: Option<f64>| {
        features.insert(name.to_string(), value);
    };

    set(FEATURE_LATENCY_SECONDS, Some(latency));
    set(FEATURE_TOKENS_PER_SECOND, rate(tokens, Some(latency)));
    set(
        FEATURE_RESPONSE_LENGTH,
        Some(result.response_text.chars().count() as f64),
    );
    set(FEATURE_COMPLETION_TOKENS, tokens);
    set(
        FEATURE_PROMPT_TOKENS,
        result.prompt_token_count.map(|n| n as f64),
    );
    set(
        FEATURE_BACKEND_TOTAL_SECONDS,
        Some(result.raw_latency_seconds),
    );
    set(FEATURE_LOAD_DURATION_SECONDS, result.load_duration_seconds);
    set(
        FEATURE_EVAL_TOKENS_PER_SECOND,
        rate(tokens, result.eval_duration_seconds),
    );
    set(
        FEATURE_UNIQUE_WORDS_RATIO,
        unique_words_ratio(&result.response_text),
    );

    features
}

/// `count / seconds`, or `None` unless both are present and time is positive.
fn rate(count: Option<f64>, seconds: Option<f64>) -> Option<f64> {
    match (count, seconds) {
        (Some(count), Some(seconds)) if seconds > 0.0 => Some(count / seconds),
        _ => None,
    }
}

/// Distinct lowercase words over total words; `None` for empty text.
fn unique_words_ratio(text: &str) -> Option<f64> {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() {
        return None;
    }
    let distinct: HashSet<&str> = words.iter().map(String::as_str).collect();
    Some(distinct.len() as f64 / words.len() as f64)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn window(seconds: f64) -> (Instant, Instant) {
        let start = Instant::now();
        (start, start + Duration::from_secs_f64(seconds))
    }

    fn result(text: &str, tokens: Option<u64>) -> GenerationResult {
        GenerationResult {
            token_count: tokens,
            ..GenerationResult::text_only(text, 2.4)
        }
    }

    #[test]
    fn latency_is_end_minus_start() {
        let (start, end) = window(2.5);
        let features = extract(Some(&result("hi", Some(50))), start, end);
        assert_eq!(features[FEATURE_LATENCY_SECONDS], Some(2.5));
    }

    #[test]
    fn tokens_per_second_uses_wall_latency() {
        let (start, end) = window(2.5);
        let features = extract(Some(&result("hi", Some(50))), start, end);
        assert_eq!(features[FEATURE_TOKENS_PER_SECOND], Some(20.0));
        assert_eq!(features[FEATURE_COMPLETION_TOKENS], Some(50.0));
    }

    #[test]
    fn missing_token_count_is_no_data_not_zero() {
        let (start, end) = window(2.5);
        let features = extract(Some(&result("hi", None)), start, end);
        assert_eq!(features[FEATURE_TOKENS_PER_SECOND], None);
        assert_eq!(features[FEATURE_COMPLETION_TOKENS], None);
    }

    #[test]
    fn zero_latency_gives_no_rate() {
        let (start, end) = window(0.0);
        let features = extract(Some(&result("hi", Some(10))), start, end);
        assert_eq!(features[FEATURE_TOKENS_PER_SECOND], None);
    }

    #[test]
    fn response_length_counts_characters() {
        let (start, end) = window(1.0);
        let features = extract(Some(&result("héllo", None)), start, end);
        assert_eq!(features[FEATURE_RESPONSE_LENGTH], Some(5.0));
    }

    #[test]
    fn eval_rate_from_backend_duration() {
        let (start, end) = window(3.0);
        let gen = GenerationResult {
            token_count: Some(40),
            eval_duration_seconds: Some(2.0),
            load_duration_seconds: Some(0.5),
            ..GenerationResult::text_only("x", 3.1)
        };
        let features = extract(Some(&gen), start, end);
        assert_eq!(features[FEATURE_EVAL_TOKENS_PER_SECOND], Some(20.0));
        assert_eq!(features[FEATURE_LOAD_DURATION_SECONDS], Some(0.5));
        assert_eq!(features[FEATURE_BACKEND_TOTAL_SECONDS], Some(3.1));
    }

    #[test]
    fn unique_words_ratio_ignores_case() {
        assert_eq!(unique_words_ratio("The cat the CAT"), Some(0.5));
        assert_eq!(unique_words_ratio("   "), None);
    }

    #[test]
    fn failed_run_has_every_key_as_no_data() {
        let (start, end) = window(1.0);
        let features = extract(None, start, end);
        assert_eq!(features.len(), GENERATION_FEATURES.len());
        assert!(features.values().all(Option::is_none));
    }

    #[test]
    fn extraction_is_idempotent() {
        let (start, end) = window(1.7);
        let gen = result("same input every time", Some(33));
        let first = extract(Some(&gen), start, end);
        let second = extract(Some(&gen), start, end);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
