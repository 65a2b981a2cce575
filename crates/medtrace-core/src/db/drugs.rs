//! Drug database operations.

use rusqlite::{params, OptionalExtension};

use super::{to_rowid, Database, DbResult};
use crate::models::{Drug, Identity, NewDrug, INITIAL_DRUG_STATUS};

impl Database {
    /// Insert a drug owned by `owner` and seed its history. Returns the new id.
    pub fn insert_drug(&self, drug: &NewDrug, owner: &Identity) -> DbResult<u64> {
        self.conn.execute(
            r#"
            INSERT INTO drugs (
                name, manufacturer, batch_number, manufacturing_date,
                expiry_date, location, owner, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                drug.name,
                drug.manufacturer,
                drug.batch_number,
                drug.manufacturing_date,
                drug.expiry_date,
                drug.location,
                owner.as_str(),
                INITIAL_DRUG_STATUS,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn.execute(
            "INSERT INTO drug_history (drug_id, position, holder) VALUES (?1, 0, ?2)",
            params![id, owner.as_str()],
        )?;
        Ok(id as u64)
    }

    /// Get a drug with its full history.
    pub fn get_drug(&self, id: u64) -> DbResult<Option<Drug>> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(None);
        };

        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, name, manufacturer, batch_number, manufacturing_date,
                       expiry_date, location, owner, status
                FROM drugs
                WHERE id = ?
                "#,
                [rowid],
                read_drug_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let history = self.get_drug_history(id)?;
                Ok(Some(row.with_history(history)))
            }
            None => Ok(None),
        }
    }

    /// Holders of a drug in order, creator first. Empty for unknown ids.
    pub fn get_drug_history(&self, id: u64) -> DbResult<Vec<Identity>> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare(
            "SELECT holder FROM drug_history WHERE drug_id = ? ORDER BY position",
        )?;
        let holders = stmt
            .query_map([rowid], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(holders.into_iter().map(Identity::from).collect())
    }

    /// Record a new holder: update the owner column and append to history.
    pub fn record_drug_transfer(&self, id: u64, to: &Identity) -> DbResult<bool> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(false);
        };

        let rows_affected = self.conn.execute(
            "UPDATE drugs SET owner = ?2 WHERE id = ?1",
            params![rowid, to.as_str()],
        )?;
        if rows_affected == 0 {
            return Ok(false);
        }

        self.conn.execute(
            r#"
            INSERT INTO drug_history (drug_id, position, holder)
            SELECT ?1, COALESCE(MAX(position), -1) + 1, ?2
            FROM drug_history WHERE drug_id = ?1
            "#,
            params![rowid, to.as_str()],
        )?;
        Ok(true)
    }

    /// Set the status text.
    pub fn set_drug_status(&self, id: u64, status: &str) -> DbResult<bool> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(false);
        };

        let rows_affected = self.conn.execute(
            "UPDATE drugs SET status = ?2 WHERE id = ?1",
            params![rowid, status],
        )?;
        Ok(rows_affected > 0)
    }

    /// Number of drugs ever created (ids are never reused, so this is also
    /// the highest assigned id).
    pub fn count_drugs(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM drugs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// List all drugs in id order.
    pub fn list_drugs(&self) -> DbResult<Vec<Drug>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, manufacturer, batch_number, manufacturing_date,
                   expiry_date, location, owner, status
            FROM drugs
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map([], read_drug_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_histories(rows)
    }

    /// List drugs currently held by `owner`, in id order.
    pub fn list_drugs_by_owner(&self, owner: &Identity) -> DbResult<Vec<Drug>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, manufacturer, batch_number, manufacturing_date,
                   expiry_date, location, owner, status
            FROM drugs
            WHERE owner = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map([owner.as_str()], read_drug_row)?
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_histories(rows)
    }

    fn attach_histories(&self, rows: Vec<DrugRow>) -> DbResult<Vec<Drug>> {
        let mut drugs = Vec::with_capacity(rows.len());
        for row in rows {
            let history = self.get_drug_history(row.id)?;
            drugs.push(row.with_history(history));
        }
        Ok(drugs)
    }
}

/// Intermediate row struct for database mapping.
struct DrugRow {
    id: u64,
    name: String,
    manufacturer: String,
    batch_number: String,
    manufacturing_date: i64,
    expiry_date: i64,
    location: String,
    owner: String,
    status: String,
}

impl DrugRow {
    fn with_history(self, history: Vec<Identity>) -> Drug {
        Drug {
            id: self.id,
            name: self.name,
            manufacturer: self.manufacturer,
            batch_number: self.batch_number,
            manufacturing_date: self.manufacturing_date,
            expiry_date: self.expiry_date,
            location: self.location,
            owner: Identity::from(self.owner),
            status: self.status,
            history,
        }
    }
}

fn read_drug_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DrugRow> {
    Ok(DrugRow {
        id: row.get::<_, i64>(0)? as u64,
        name: row.get(1)?,
        manufacturer: row.get(2)?,
        batch_number: row.get(3)?,
        manufacturing_date: row.get(4)?,
        expiry_date: row.get(5)?,
        location: row.get(6)?,
        owner: row.get(7)?,
        status: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample() -> NewDrug {
        NewDrug::new(
            "Test Drug",
            "Test Manufacturer",
            "BATCH001",
            1_700_000_000,
            1_731_536_000,
            "Test Location",
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let owner = Identity::from("0xowner");

        let id = db.insert_drug(&sample(), &owner).unwrap();
        assert_eq!(id, 1);

        let drug = db.get_drug(id).unwrap().unwrap();
        assert_eq!(drug.name, "Test Drug");
        assert_eq!(drug.batch_number, "BATCH001");
        assert_eq!(drug.owner, owner);
        assert_eq!(drug.status, "Manufactured");
        assert_eq!(drug.history, vec![owner]);
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_drug(0).unwrap().is_none());
        assert!(db.get_drug(1).unwrap().is_none());
        assert!(db.get_drug(u64::MAX).unwrap().is_none());
    }

    #[test]
    fn test_transfer_appends_history() {
        let db = setup_db();
        let id = db.insert_drug(&sample(), &"0xa".into()).unwrap();

        assert!(db.record_drug_transfer(id, &"0xb".into()).unwrap());
        assert!(db.record_drug_transfer(id, &"0xc".into()).unwrap());

        let drug = db.get_drug(id).unwrap().unwrap();
        assert_eq!(drug.owner, Identity::from("0xc"));
        assert_eq!(
            drug.history,
            vec![Identity::from("0xa"), Identity::from("0xb"), Identity::from("0xc")]
        );
    }

    #[test]
    fn test_transfer_unknown_drug() {
        let db = setup_db();
        assert!(!db.record_drug_transfer(9, &"0xb".into()).unwrap());
        assert!(db.get_drug_history(9).unwrap().is_empty());
    }

    #[test]
    fn test_set_status() {
        let db = setup_db();
        let id = db.insert_drug(&sample(), &"0xa".into()).unwrap();

        assert!(db.set_drug_status(id, "In Transit").unwrap());
        assert_eq!(db.get_drug(id).unwrap().unwrap().status, "In Transit");
        assert!(!db.set_drug_status(42, "Lost").unwrap());
    }

    #[test]
    fn test_list_by_owner() {
        let db = setup_db();
        let first = db.insert_drug(&sample(), &"0xa".into()).unwrap();
        let second = db.insert_drug(&sample(), &"0xa".into()).unwrap();
        db.insert_drug(&sample(), &"0xb".into()).unwrap();
        db.record_drug_transfer(first, &"0xb".into()).unwrap();

        let held: Vec<u64> = db
            .list_drugs_by_owner(&"0xa".into())
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(held, vec![second]);

        assert_eq!(db.count_drugs().unwrap(), 3);
        assert_eq!(db.list_drugs().unwrap().len(), 3);
    }
}
