use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::import::parse_rule_tables;
use super::table::{RuleTable, RuleTableKey};
use crate::error::EngineError;

/// Read side of the rule table collaborator.
pub trait RuleTableStore: Send + Sync {
    fn rule_table(&self, key: &RuleTableKey) -> Result<Arc<RuleTable>, EngineError>;

    fn get_rule_table(
        &self,
        jurisdiction: &str,
        program: &str,
        fiscal_year: u16,
    ) -> Result<Arc<RuleTable>, EngineError> {
        self.rule_table(&RuleTableKey::new(jurisdiction, program, fiscal_year))
    }
}

/// Publish-once registry. Readers share `Arc` snapshots of each table.
#[derive(Debug, Default)]
pub struct InMemoryRuleTableStore {
    tables: RwLock<BTreeMap<RuleTableKey, Arc<RuleTable>>>,
}

impl InMemoryRuleTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish `table`. Re-publishing an existing key is a conflict.
    pub fn publish(&self, table: RuleTable) -> Result<Arc<RuleTable>, EngineError> {
        table.validate()?;

        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(&table.key) {
            return Err(EngineError::conflict(format!(
                "rule table {} is already published; publish a new fiscal year instead",
                table.key
            )));
        }

        let key = table.key.clone();
        let table = Arc::new(table);
        guard.insert(key.clone(), Arc::clone(&table));
        info!(%key, sizes = table.income_limits.len(), "rule table published");
        Ok(table)
    }

    /// Parse a CSV export and publish every table in it.
    pub fn publish_csv<R: Read>(&self, reader: R) -> Result<Vec<RuleTableKey>, EngineError> {
        let tables = parse_rule_tables(reader)?;
        tables
            .into_iter()
            .map(|table| self.publish(table).map(|published| published.key.clone()))
            .collect()
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, EngineError> {
        let store = Self::new();
        store.publish_csv(reader)?;
        Ok(store)
    }

    pub fn keys(&self) -> Vec<RuleTableKey> {
        let guard = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        guard.keys().cloned().collect()
    }
}

impl RuleTableStore for InMemoryRuleTableStore {
    fn rule_table(&self, key: &RuleTableKey) -> Result<Arc<RuleTable>, EngineError> {
        let guard = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        match guard.get(key) {
            Some(table) => Ok(Arc::clone(table)),
            None => {
                debug!(%key, "rule table lookup missed");
                Err(EngineError::not_found("rule table", key))
            }
        }
    }
}
