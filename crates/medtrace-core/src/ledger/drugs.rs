//! Drug ownership ledger.

use log::{debug, info, warn};

use crate::audit::EventLog;
use crate::db::Database;
use crate::error::{LedgerError, LedgerResult, NOT_THE_OWNER};
use crate::models::{
    now_unix, Drug, DrugStats, Identity, LedgerEvent, NewDrug, INITIAL_DRUG_STATUS,
};

/// Drug batches, their holders and status.
///
/// Only the current owner may transfer a drug or change its status. Status
/// is free text; there is no transition table.
pub struct DrugLedger<'a> {
    db: &'a Database,
}

impl<'a> DrugLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a drug owned by `caller`. Ids are assigned 1, 2, 3, ...
    pub fn create_drug(&self, drug: &NewDrug, caller: &Identity) -> LedgerResult<Drug> {
        let tx = self.db.begin()?;
        let id = self.db.insert_drug(drug, caller)?;
        EventLog::new(self.db).append(
            &LedgerEvent::DrugCreated {
                id,
                name: drug.name.clone(),
                owner: caller.clone(),
            },
            now_unix(),
        )?;
        tx.commit()?;

        info!("Drug {} ({}) created by {}", id, drug.batch_number, caller);
        Ok(Drug {
            id,
            name: drug.name.clone(),
            manufacturer: drug.manufacturer.clone(),
            batch_number: drug.batch_number.clone(),
            manufacturing_date: drug.manufacturing_date,
            expiry_date: drug.expiry_date,
            location: drug.location.clone(),
            owner: caller.clone(),
            status: INITIAL_DRUG_STATUS.to_string(),
            history: vec![caller.clone()],
        })
    }

    /// Fails with `NotFound` for id 0 and any id never assigned, which is
    /// what lets callers enumerate by probing 1, 2, 3, ...
    pub fn get_drug_details(&self, id: u64) -> LedgerResult<Drug> {
        debug!("Looking up drug {}", id);
        self.db.get_drug(id)?.ok_or_else(|| drug_not_found(id))
    }

    /// Hand the drug to `to`. Returns the `DrugTransferred` event.
    pub fn transfer_drug(
        &self,
        id: u64,
        to: &Identity,
        caller: &Identity,
    ) -> LedgerResult<LedgerEvent> {
        let tx = self.db.begin()?;
        let drug = self.require_owner(id, caller)?;

        self.db.record_drug_transfer(id, to)?;
        let event = LedgerEvent::DrugTransferred {
            id,
            from: drug.owner,
            to: to.clone(),
        };
        EventLog::new(self.db).append(&event, now_unix())?;
        tx.commit()?;

        info!("Drug {} transferred from {} to {}", id, caller, to);
        Ok(event)
    }

    /// Replace the status text. Returns the `DrugStatusUpdated` event.
    pub fn update_drug_status(
        &self,
        id: u64,
        new_status: &str,
        caller: &Identity,
    ) -> LedgerResult<LedgerEvent> {
        let tx = self.db.begin()?;
        self.require_owner(id, caller)?;

        self.db.set_drug_status(id, new_status)?;
        let event = LedgerEvent::DrugStatusUpdated {
            id,
            new_status: new_status.to_string(),
        };
        EventLog::new(self.db).append(&event, now_unix())?;
        tx.commit()?;

        info!("Drug {} status set to {:?} by {}", id, new_status, caller);
        Ok(event)
    }

    /// Every holder in order, creator first.
    pub fn get_drug_history(&self, id: u64) -> LedgerResult<Vec<Identity>> {
        let history = self.db.get_drug_history(id)?;
        if history.is_empty() {
            return Err(drug_not_found(id));
        }
        Ok(history)
    }

    pub fn drug_count(&self) -> LedgerResult<u64> {
        Ok(self.db.count_drugs()?)
    }

    /// All drugs in id order.
    pub fn list_drugs(&self) -> LedgerResult<Vec<Drug>> {
        Ok(self.db.list_drugs()?)
    }

    /// Drugs currently held by `owner`.
    pub fn drugs_owned_by(&self, owner: &Identity) -> LedgerResult<Vec<Drug>> {
        Ok(self.db.list_drugs_by_owner(owner)?)
    }

    /// Dashboard counts as of `now` (Unix seconds).
    pub fn stats(&self, now: i64) -> LedgerResult<DrugStats> {
        let drugs = self.db.list_drugs()?;
        Ok(DrugStats {
            total: drugs.len() as u64,
            active: drugs.iter().filter(|d| d.is_active_at(now)).count() as u64,
            transferred: drugs.iter().filter(|d| d.has_been_transferred()).count() as u64,
        })
    }

    fn require_owner(&self, id: u64, caller: &Identity) -> LedgerResult<Drug> {
        let drug = self.get_drug_details(id)?;
        if &drug.owner != caller {
            warn!("{} tried to act on drug {} owned by {}", caller, id, drug.owner);
            return Err(LedgerError::unauthorized(NOT_THE_OWNER));
        }
        Ok(drug)
    }
}

fn drug_not_found(id: u64) -> LedgerError {
    LedgerError::NotFound(format!("Drug {} does not exist", id))
}
