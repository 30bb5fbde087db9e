//! Range-filtered, reshaped views over the history series.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::counter::{PlatformCounts, TypeCounts};
use crate::error::{Error, Result};
use crate::store::{HistoryPoint, Store};

/// Selector for the type dimension of a history query.
pub const ALL_TYPES: &str = "all";

/// One history row narrowed to a single distribution, with its per-type
/// counters either summed ("all") or reduced to one type.
#[derive(Debug, Clone, Serialize)]
pub struct ReshapedPoint {
    pub id: i64,
    pub datetime: DateTime<Utc>,
    pub counters: PlatformCounts,
}

/// Validate the selector, query the inclusive `[start, end]` range, and
/// reshape every row. Rejection of an unknown distribution or type happens
/// before the database is touched.
pub fn get_historical_data(
    store: &Store,
    config: &Config,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    distribution: &str,
    type_selector: &str,
) -> Result<Vec<ReshapedPoint>> {
    validate_selector(config, distribution, type_selector)?;

    let points = store.get_history_range(start, end)?;
    Ok(points
        .into_iter()
        .map(|point| reshape(point, distribution, type_selector))
        .collect())
}

pub fn validate_selector(config: &Config, distribution: &str, type_selector: &str) -> Result<()> {
    if !config.has_distribution(distribution) {
        return Err(Error::Validation(format!(
            "unknown distribution '{distribution}'"
        )));
    }
    if type_selector != ALL_TYPES && !config.has_type(type_selector) {
        return Err(Error::Validation(format!(
            "unknown type '{type_selector}'"
        )));
    }
    Ok(())
}

fn reshape(point: HistoryPoint, distribution: &str, type_selector: &str) -> ReshapedPoint {
    let per_type = point
        .counters
        .get(distribution)
        .cloned()
        .unwrap_or_default();

    let counters = if type_selector == ALL_TYPES {
        sum_types(&per_type)
    } else {
        per_type.get(type_selector).cloned().unwrap_or_default()
    };

    ReshapedPoint {
        id: point.id,
        datetime: point.datetime,
        counters,
    }
}

/// Key-wise sum of the platform maps across all types. A platform missing
/// from one type's map contributes zero.
fn sum_types(per_type: &TypeCounts) -> PlatformCounts {
    let mut summed = PlatformCounts::new();
    for counts in per_type.values() {
        for (platform, count) in counts {
            *summed.entry(platform.clone()).or_insert(0) += count;
        }
    }
    summed
}
