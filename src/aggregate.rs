use std::collections::BTreeMap;

use crate::record::{AggregatedRecord, NormalizedRecord};

/// Fold normalized records into one bucket per (period, category),
/// summing the measures. Accumulation is associative and commutative,
/// and the BTreeMap keying makes the output deterministic: the same
/// input rows produce byte-identical results in any order, which is
/// what makes re-analysis of stored raw data idempotent.
pub fn aggregate<I>(records: I) -> Vec<AggregatedRecord>
where
    I: IntoIterator<Item = NormalizedRecord>,
{
    let mut buckets: BTreeMap<(String, String), f64> = BTreeMap::new();

    for record in records {
        *buckets
            .entry((record.period, record.category))
            .or_insert(0.0) += record.measure;
    }

    buckets
        .into_iter()
        .map(|((month, region), revenue)| AggregatedRecord {
            month,
            region,
            revenue,
        })
        .collect()
}
