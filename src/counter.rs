//! Per-platform aggregation of an import result.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::import::ImportData;

pub type PlatformCounts = BTreeMap<String, u64>;
pub type TypeCounts = BTreeMap<String, PlatformCounts>;

/// Aggregate counters: distribution -> type -> platform -> count.
pub type Counters = BTreeMap<String, TypeCounts>;

/// Count, for every {distribution, type} cell, how many records target each
/// configured platform. Every configured platform appears in the result,
/// zero included; records with a platform outside the configured list are
/// dropped from all buckets.
///
/// Counts are computed from a borrow of the import result, so the raw
/// records stay available for the snapshot write in either order.
pub fn count_platforms(config: &Config, data: &ImportData) -> Counters {
    let mut counters = Counters::new();

    for (distribution, types) in data {
        let mut per_type = TypeCounts::new();

        for (type_name, records) in types {
            let mut counts: PlatformCounts = config
                .platforms
                .iter()
                .map(|platform| (platform.clone(), 0))
                .collect();

            for record in records {
                if let Some(count) = counts.get_mut(&record.platform) {
                    *count += 1;
                }
            }

            per_type.insert(type_name.clone(), counts);
        }

        counters.insert(distribution.clone(), per_type);
    }

    counters
}
