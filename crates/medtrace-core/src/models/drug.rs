//! Drug batch models.

use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Status assigned to every newly created drug.
pub const INITIAL_DRUG_STATUS: &str = "Manufactured";

/// A drug batch tracked by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    /// Sequential ID, starting at 1
    pub id: u64,
    pub name: String,
    pub manufacturer: String,
    pub batch_number: String,
    /// Unix seconds
    pub manufacturing_date: i64,
    /// Unix seconds
    pub expiry_date: i64,
    pub location: String,
    /// Current holder
    pub owner: Identity,
    /// Free-form status text
    pub status: String,
    /// Every holder in order, creator first; the last entry is always `owner`
    pub history: Vec<Identity>,
}

impl Drug {
    /// Whether ownership has moved away from the creator at least once.
    pub fn has_been_transferred(&self) -> bool {
        self.history.len() > 1
    }

    /// Whether the batch is still within its shelf life at `now`.
    pub fn is_active_at(&self, now: i64) -> bool {
        self.expiry_date > now
    }
}

/// Input for creating a drug batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDrug {
    pub name: String,
    pub manufacturer: String,
    pub batch_number: String,
    pub manufacturing_date: i64,
    pub expiry_date: i64,
    pub location: String,
}

impl NewDrug {
    pub fn new(
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        batch_number: impl Into<String>,
        manufacturing_date: i64,
        expiry_date: i64,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            manufacturer: manufacturer.into(),
            batch_number: batch_number.into(),
            manufacturing_date,
            expiry_date,
            location: location.into(),
        }
    }
}

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrugStats {
    pub total: u64,
    /// Not yet expired
    pub active: u64,
    /// Changed hands at least once
    pub transferred: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_drug(history: &[&str], expiry_date: i64) -> Drug {
        let history: Vec<Identity> = history.iter().map(|h| Identity::from(*h)).collect();
        Drug {
            id: 1,
            name: "Amoxicillin".into(),
            manufacturer: "Acme Pharma".into(),
            batch_number: "BATCH001".into(),
            manufacturing_date: 1_700_000_000,
            expiry_date,
            location: "Lagos".into(),
            owner: history.last().cloned().unwrap(),
            status: INITIAL_DRUG_STATUS.into(),
            history,
        }
    }

    #[test]
    fn test_transferred_flag() {
        assert!(!make_drug(&["0xmaker"], 0).has_been_transferred());
        assert!(make_drug(&["0xmaker", "0xdist"], 0).has_been_transferred());
    }

    #[test]
    fn test_active_is_strictly_before_expiry() {
        let drug = make_drug(&["0xmaker"], 1_800_000_000);
        assert!(drug.is_active_at(1_799_999_999));
        assert!(!drug.is_active_at(1_800_000_000));
    }
}
