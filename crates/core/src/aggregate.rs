//! Record merging and the run-lifetime record store.

use std::collections::BTreeSet;

use crate::error::BenchError;
use crate::metric_names::RESERVED_COLUMNS;
use crate::types::{FeatureMap, MetricRecord, RunIdentity, RunOutcome, RunStatus, RunSummary};

/// Merge run identity, outcome and both feature maps into one flat record.
///
/// A feature name produced by both extractors, or shadowing an identity
/// column, is a programming error and fails immediately instead of letting
/// one value overwrite the other.
pub fn merge(
    identity: RunIdentity,
    outcome: RunOutcome,
    generation: FeatureMap,
    system: FeatureMap,
) -> Result<MetricRecord, BenchError> {
    let mut features = FeatureMap::new();

    for (name, value) in generation.into_iter().chain(system) {
        if RESERVED_COLUMNS.contains(&name.as_str()) || features.contains_key(&name) {
            return Err(BenchError::AggregationConflict { field: name });
        }
        features.insert(name, value);
    }

    Ok(MetricRecord {
        identity,
        prompt: outcome.prompt,
        status: outcome.status,
        error: outcome.error,
        response_text: outcome.response_text,
        features,
    })
}

/// Append-only collection of every record produced by one pipeline run.
///
/// The first appended record fixes the feature schema; every later record
/// must carry exactly the same feature names.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    records: Vec<MetricRecord>,
    schema: Option<BTreeSet<String>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge and append in one step.
    pub fn record(
        &mut self,
        identity: RunIdentity,
        outcome: RunOutcome,
        generation: FeatureMap,
        system: FeatureMap,
    ) -> Result<&MetricRecord, BenchError> {
        let record = merge(identity, outcome, generation, system)?;
        self.append(record)?;
        Ok(&self.records[self.records.len() - 1])
    }

    /// Append a record. This is the only mutation the store exposes.
    pub fn append(&mut self, record: MetricRecord) -> Result<(), BenchError> {
        let keys: BTreeSet<String> = record.features.keys().cloned().collect();

        match &self.schema {
            Some(schema) if *schema != keys => {
                return Err(BenchError::SchemaMismatch {
                    model: record.identity.model_name.clone(),
                    prompt_index: record.identity.prompt_index,
                    iteration_index: record.identity.iteration_index,
                });
            }
            Some(_) => {}
            None => self.schema = Some(keys),
        }

        self.records.push(record);
        Ok(())
    }

    /// Read-only view of all records in append order.
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Feature column names shared by every record, sorted.
    pub fn feature_columns(&self) -> Vec<String> {
        self.schema
            .as_ref()
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts of records by outcome.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.records.len(),
            ..RunSummary::default()
        };
        for record in &self.records {
            match record.status {
                RunStatus::Ok => summary.succeeded += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::TimedOut => summary.timed_out += 1,
            }
        }
        summary
    }

    /// Hand the records over to the reporting step.
    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }
}
