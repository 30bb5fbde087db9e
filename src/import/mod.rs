pub mod loader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

/// One intervention as published by a remote source script.
///
/// The script only carries the record itself; which distribution and type it
/// belongs to is context the importer adds when persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: String,
    pub platform: String,
    pub domain: String,
    pub bug: String,
}

/// Import result: distribution -> type -> valid records.
pub type ImportData = BTreeMap<String, BTreeMap<String, Vec<Intervention>>>;

/// Fetch every configured {distribution, type} cell and assemble the nested
/// result. Cells are fetched sequentially and the first fetch or evaluation
/// failure fails the whole run; a partially imported matrix never reaches
/// the store.
pub fn run(config: &Config) -> Result<ImportData> {
    let agent = loader::agent(config.fetch_timeout());
    let eval_timeout = config.eval_timeout();

    let mut data = ImportData::new();

    for distribution in &config.distributions {
        let mut per_type = BTreeMap::new();

        for type_name in &config.types {
            // config validation guarantees a URL for every cell
            let url = config
                .source_url(distribution, type_name)
                .ok_or_else(|| {
                    crate::error::Error::Validation(format!(
                        "no source url for {distribution}/{type_name}"
                    ))
                })?;

            let records = loader::fetch_and_evaluate(&agent, url, eval_timeout)?;
            log::debug!(
                "imported {} interventions for {distribution}/{type_name}",
                records.len()
            );

            per_type.insert(type_name.clone(), records);
        }

        data.insert(distribution.clone(), per_type);
    }

    Ok(data)
}

/// Total number of records across every cell of an import result.
pub fn record_count(data: &ImportData) -> usize {
    data.values()
        .flat_map(|types| types.values())
        .map(Vec::len)
        .sum()
}
