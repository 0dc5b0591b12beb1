//! Aggregator - buckets raw samples into rate statistics with honest
//! uncertainty
//!
//! Aggregation is a pure function of its inputs: commutative and
//! associative over sample order (envelopes from the same tenant arrive
//! unordered), idempotent given the same input window, no I/O.

pub mod bucket;
pub mod wilson;

pub use bucket::{bucket_key, Granularity, Period};
pub use wilson::{wilson_interval, ConfidenceLevel};

use pulse_common::envelope::MetricSample;
use std::collections::BTreeMap;

/// Aggregated counters and derived rates for one bucket
#[derive(Debug, Clone, PartialEq)]
pub struct BucketStat {
    pub bucket_key: String,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
    /// clicks / impressions, 0 when there were no impressions
    pub ctr: f64,
    pub ctr_ci: (f64, f64),
    /// conversions / clicks, 0 when there were no clicks
    pub cvr: f64,
    pub cvr_ci: (f64, f64),
}

/// Fold samples into per-bucket stats at the given granularity
///
/// Buckets are returned in key order. A bucket's counters are plain sums
/// over its contributing samples; rates are paired with Wilson intervals so
/// low-volume buckets report honest uncertainty instead of invalid bounds.
pub fn aggregate(
    samples: &[MetricSample],
    granularity: Granularity,
    level: ConfidenceLevel,
) -> Vec<BucketStat> {
    let mut sums: BTreeMap<String, (i64, i64, i64, f64)> = BTreeMap::new();

    for sample in samples {
        let key = bucket_key(sample.timestamp, granularity);
        let entry = sums.entry(key).or_insert((0, 0, 0, 0.0));
        entry.0 += sample.impressions;
        entry.1 += sample.clicks;
        entry.2 += sample.conversions;
        entry.3 += sample.revenue;
    }

    sums.into_iter()
        .map(|(key, (impressions, clicks, conversions, revenue))| {
            let ctr = rate(clicks, impressions);
            let cvr = rate(conversions, clicks);
            BucketStat {
                bucket_key: key,
                impressions,
                clicks,
                conversions,
                revenue,
                ctr,
                ctr_ci: wilson_interval(clicks, impressions, level),
                cvr,
                cvr_ci: wilson_interval(conversions, clicks, level),
            }
        })
        .collect()
}

/// Safe proportion: 0 when the denominator is 0, never a division error
fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
