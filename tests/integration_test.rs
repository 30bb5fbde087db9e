use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use intrack::config::Config;
use intrack::counter::{self, Counters};
use intrack::error::Error;
use intrack::history;
use intrack::import::{ImportData, Intervention};
use intrack::store::Store;

fn test_config() -> Config {
    toml::from_str(
        r#"
        distributions = ["stable", "beta"]
        types = ["injection", "ua_override"]
        platforms = ["all", "desktop", "android"]

        [sources.stable]
        injection = "https://example.com/stable/injections.js"
        ua_override = "https://example.com/stable/ua_overrides.js"

        [sources.beta]
        injection = "https://example.com/beta/injections.js"
        ua_override = "https://example.com/beta/ua_overrides.js"
    "#,
    )
    .unwrap()
}

fn open_store(dir: &tempfile::TempDir) -> Store {
    Store::open(&dir.path().join("intrack.db")).unwrap()
}

fn record(id: &str, platform: &str, domain: &str) -> Intervention {
    Intervention {
        id: id.to_string(),
        platform: platform.to_string(),
        domain: domain.to_string(),
        bug: "1234567".to_string(),
    }
}

fn import_data() -> ImportData {
    let mut stable = BTreeMap::new();
    stable.insert(
        "injection".to_string(),
        vec![
            record("css-fix", "all", "Zebra.example"),
            record("js-fix", "desktop", "apple.example"),
        ],
    );
    stable.insert(
        "ua_override".to_string(),
        vec![record("ua-spoof", "android", "mango.example")],
    );

    let mut beta = BTreeMap::new();
    beta.insert(
        "injection".to_string(),
        vec![record("css-fix", "all", "Zebra.example")],
    );
    beta.insert("ua_override".to_string(), Vec::new());

    let mut data = ImportData::new();
    data.insert("stable".to_string(), stable);
    data.insert("beta".to_string(), beta);
    data
}

#[test]
fn replace_inserts_exactly_the_fetched_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);

    let data = import_data();
    let inserted = store.replace_current_interventions(&data).unwrap();

    assert_eq!(inserted, 4);
    assert_eq!(inserted, intrack::import::record_count(&data));
    assert_eq!(store.count_active_interventions().unwrap(), 4);
}

#[test]
fn reimport_with_unchanged_data_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let config = test_config();
    let data = import_data();

    for _ in 0..2 {
        let counters = counter::count_platforms(&config, &data);
        store.replace_current_interventions(&data).unwrap();
        store.append_history_point(&counters).unwrap();
    }

    // snapshot content is stable across runs
    assert_eq!(store.count_active_interventions().unwrap(), 4);
    let rows = store.get_interventions_for_distribution("stable").unwrap();
    assert_eq!(rows.len(), 3);

    // but each run appended its own history point
    let all_points = store
        .get_history_range(
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            Utc::now(),
        )
        .unwrap();
    assert_eq!(all_points.len(), 2);
}

#[test]
fn failed_replace_leaves_prior_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);

    store.replace_current_interventions(&import_data()).unwrap();
    assert_eq!(store.count_active_interventions().unwrap(), 4);

    // an empty key violates the schema check partway through the insert
    // loop, after valid rows have already been written to the transaction
    let mut poisoned = import_data();
    poisoned
        .get_mut("stable")
        .unwrap()
        .get_mut("ua_override")
        .unwrap()
        .push(record("", "all", "broken.example"));

    let result = store.replace_current_interventions(&poisoned);
    assert!(result.is_err());

    // the rollback restored the previous snapshot in full
    assert_eq!(store.count_active_interventions().unwrap(), 4);
    let rows = store.get_interventions_for_distribution("stable").unwrap();
    assert!(rows.iter().all(|row| !row.key.is_empty()));
}

#[test]
fn list_orders_by_domain_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);

    store.replace_current_interventions(&import_data()).unwrap();

    let rows = store.get_interventions_for_distribution("stable").unwrap();
    let domains: Vec<&str> = rows.iter().map(|row| row.domain.as_str()).collect();

    // "Zebra.example" sorts after the lowercase domains despite its case
    assert_eq!(
        domains,
        vec!["apple.example", "mango.example", "Zebra.example"]
    );
}

#[test]
fn rows_carry_distribution_and_type_context() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);

    store.replace_current_interventions(&import_data()).unwrap();

    let rows = store.get_interventions_for_distribution("beta").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "css-fix");
    assert_eq!(rows[0].distribution, "beta");
    assert_eq!(rows[0].type_name, "injection");
}

#[test]
fn history_range_is_inclusive_on_both_ends() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let counters = Counters::new();

    let days = [
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap(),
    ];
    for day in days {
        store.append_history_point_at(day, &counters).unwrap();
    }

    let points = store.get_history_range(days[1], days[2]).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].datetime, days[1]);
    assert_eq!(points[1].datetime, days[2]);
}

#[test]
fn latest_counts_returns_the_newest_point() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    assert!(store.get_latest_counts().unwrap().is_none());

    let older: Counters = serde_json::from_value(serde_json::json!({
        "stable": { "injection": { "all": 1 } }
    }))
    .unwrap();
    let newer: Counters = serde_json::from_value(serde_json::json!({
        "stable": { "injection": { "all": 5 } }
    }))
    .unwrap();

    store
        .append_history_point_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), &older)
        .unwrap();
    store
        .append_history_point_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), &newer)
        .unwrap();

    let latest = store.get_latest_counts().unwrap().unwrap();
    assert_eq!(latest.counters["stable"]["injection"]["all"], 5);
}

#[test]
fn historical_data_filters_and_reshapes() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let config = test_config();
    let data = import_data();

    let counters = counter::count_platforms(&config, &data);
    store.replace_current_interventions(&data).unwrap();

    let in_range = Utc.with_ymd_and_hms(2024, 3, 2, 0, 30, 0).unwrap();
    let out_of_range = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    store.append_history_point_at(in_range, &counters).unwrap();
    store
        .append_history_point_at(out_of_range, &counters)
        .unwrap();

    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();

    let points =
        history::get_historical_data(&store, &config, start, end, "stable", "all").unwrap();
    assert_eq!(points.len(), 1);

    // stable has 2 injection records (all, desktop) and 1 ua_override
    // (android); "all" sums the two type maps key-wise
    assert_eq!(points[0].counters["all"], 1);
    assert_eq!(points[0].counters["desktop"], 1);
    assert_eq!(points[0].counters["android"], 1);

    let injections =
        history::get_historical_data(&store, &config, start, end, "stable", "injection").unwrap();
    assert_eq!(injections[0].counters["all"], 1);
    assert_eq!(injections[0].counters["desktop"], 1);
    assert_eq!(injections[0].counters["android"], 0);
}

#[test]
fn unknown_selectors_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let config = test_config();

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc::now();

    let err =
        history::get_historical_data(&store, &config, start, end, "nightly", "all").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err =
        history::get_historical_data(&store, &config, start, end, "stable", "banner").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
