//! Process-wide context tying the configuration and the store together.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::counter;
use crate::error::Result;
use crate::history::{self, ReshapedPoint};
use crate::import;
use crate::store::{HistoryPoint, InterventionRow, Store};

/// Long-lived service state shared by the scheduler and any manual trigger.
///
/// The store mutex doubles as the run-level critical section: an import run
/// holds it from before the first fetch until both writes are done, so the
/// scheduled run, the bootstrap run, and a manual trigger can never
/// interleave on the snapshot replace. The guard is per-process; a second
/// process writing to the same database is still limited to the sqlite
/// transaction boundaries, which keep the replace atomic but not the
/// ordering between two whole runs.
pub struct Service {
    config: Config,
    store: Mutex<Store>,
}

impl Service {
    pub fn new(config: Config, store: Store) -> Self {
        Service {
            config,
            store: Mutex::new(store),
        }
    }

    /// One full import run: fetch the whole matrix, replace the snapshot,
    /// append a history point.
    ///
    /// The snapshot replace and the history append have different
    /// durability guarantees: the replace is transactional and aborts the
    /// run on failure, while a failed history append is logged and dropped
    /// rather than undoing an already-committed snapshot.
    pub fn run_import_and_count(&self) -> Result<()> {
        let mut store = self.store.lock().unwrap();

        let data = import::run(&self.config)?;
        let fetched = import::record_count(&data);
        let counters = counter::count_platforms(&self.config, &data);

        let inserted = store.replace_current_interventions(&data)?;
        if inserted != fetched {
            log::warn!("snapshot holds {inserted} rows but the run fetched {fetched} records");
        }
        log::info!("snapshot replaced with {inserted} interventions");

        match store.append_history_point(&counters) {
            Ok(id) => log::info!("appended history point {id}"),
            Err(e) => log::warn!("failed to append history point: {e}"),
        }

        Ok(())
    }

    pub fn count_active_interventions(&self) -> Result<i64> {
        self.store.lock().unwrap().count_active_interventions()
    }

    pub fn get_latest_counts(&self) -> Result<Option<HistoryPoint>> {
        self.store.lock().unwrap().get_latest_counts()
    }

    pub fn get_interventions_for_distribution(
        &self,
        distribution: &str,
    ) -> Result<Vec<InterventionRow>> {
        if !self.config.has_distribution(distribution) {
            return Err(crate::error::Error::Validation(format!(
                "unknown distribution '{distribution}'"
            )));
        }
        self.store
            .lock()
            .unwrap()
            .get_interventions_for_distribution(distribution)
    }

    pub fn get_historical_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        distribution: &str,
        type_selector: &str,
    ) -> Result<Vec<ReshapedPoint>> {
        // selector validation happens before the store lock is taken
        history::validate_selector(&self.config, distribution, type_selector)?;

        let store = self.store.lock().unwrap();
        history::get_historical_data(&store, &self.config, start, end, distribution, type_selector)
    }
}
