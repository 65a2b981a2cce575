//! Drug ledger integration tests.

use medtrace_core::audit::EventLog;
use medtrace_core::db::Database;
use medtrace_core::error::LedgerError;
use medtrace_core::ledger::DrugLedger;
use medtrace_core::models::{Identity, LedgerEvent, NewDrug};

const OWNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const ADDR1: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const ADDR2: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";

fn make_drug(batch: &str) -> NewDrug {
    let mfg = 1_700_000_000;
    NewDrug::new(
        "Test Drug",
        "Test Manufacturer",
        batch,
        mfg,
        mfg + 365 * 24 * 60 * 60,
        "Test Location",
    )
}

#[test]
fn test_create_and_read_back() {
    let db = Database::open_in_memory().unwrap();
    let ledger = DrugLedger::new(&db);
    let owner = Identity::from(OWNER);

    ledger.create_drug(&make_drug("BATCH001"), &owner).unwrap();

    let drug = ledger.get_drug_details(1).unwrap();
    assert_eq!(drug.name, "Test Drug");
    assert_eq!(drug.manufacturer, "Test Manufacturer");
    assert_eq!(drug.batch_number, "BATCH001");
    assert_eq!(drug.location, "Test Location");
    assert_eq!(drug.owner, owner);
    assert_eq!(drug.status, "Manufactured");
    assert_eq!(drug.history, vec![owner]);
}

#[test]
fn test_transfer_chain_and_events() {
    let db = Database::open_in_memory().unwrap();
    let ledger = DrugLedger::new(&db);
    let (owner, addr1, addr2) = (Identity::from(OWNER), Identity::from(ADDR1), Identity::from(ADDR2));

    ledger.create_drug(&make_drug("BATCH001"), &owner).unwrap();
    ledger.transfer_drug(1, &addr1, &owner).unwrap();
    ledger.update_drug_status(1, "In Transit", &addr1).unwrap();
    ledger.transfer_drug(1, &addr2, &addr1).unwrap();

    let drug = ledger.get_drug_details(1).unwrap();
    assert_eq!(drug.owner, addr2);
    assert_eq!(drug.status, "In Transit");
    assert_eq!(ledger.get_drug_history(1).unwrap(), vec![owner.clone(), addr1.clone(), addr2.clone()]);

    let events: Vec<LedgerEvent> = EventLog::new(&db)
        .events_for_drug(1)
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(
        events,
        vec![
            LedgerEvent::DrugCreated {
                id: 1,
                name: "Test Drug".into(),
                owner: owner.clone(),
            },
            LedgerEvent::DrugTransferred {
                id: 1,
                from: owner,
                to: addr1.clone(),
            },
            LedgerEvent::DrugStatusUpdated {
                id: 1,
                new_status: "In Transit".into(),
            },
            LedgerEvent::DrugTransferred {
                id: 1,
                from: addr1,
                to: addr2,
            },
        ]
    );
}

#[test]
fn test_rejected_mutations_leave_no_trace() {
    let db = Database::open_in_memory().unwrap();
    let ledger = DrugLedger::new(&db);
    let owner = Identity::from(OWNER);
    let intruder = Identity::from(ADDR1);
    ledger.create_drug(&make_drug("BATCH001"), &owner).unwrap();

    let err = ledger.transfer_drug(1, &intruder, &intruder).unwrap_err();
    assert_eq!(err.reason(), Some("Not the owner"));
    let err = ledger.update_drug_status(1, "Stolen", &intruder).unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));

    let drug = ledger.get_drug_details(1).unwrap();
    assert_eq!(drug.owner, owner);
    assert_eq!(drug.status, "Manufactured");
    assert_eq!(drug.history.len(), 1);
    assert_eq!(EventLog::new(&db).events_for_drug(1).unwrap().len(), 1);
}

#[test]
fn test_transfer_to_self_extends_history() {
    let db = Database::open_in_memory().unwrap();
    let ledger = DrugLedger::new(&db);
    let owner = Identity::from(OWNER);
    ledger.create_drug(&make_drug("BATCH001"), &owner).unwrap();

    ledger.transfer_drug(1, &owner, &owner).unwrap();
    assert_eq!(ledger.get_drug_history(1).unwrap(), vec![owner.clone(), owner]);
}

#[test]
fn test_empty_status_is_accepted() {
    let db = Database::open_in_memory().unwrap();
    let ledger = DrugLedger::new(&db);
    let owner = Identity::from(OWNER);
    ledger.create_drug(&make_drug("BATCH001"), &owner).unwrap();

    ledger.update_drug_status(1, "", &owner).unwrap();
    assert_eq!(ledger.get_drug_details(1).unwrap().status, "");
}

#[test]
fn test_ids_are_sequential_across_owners() {
    let db = Database::open_in_memory().unwrap();
    let ledger = DrugLedger::new(&db);

    let first = ledger.create_drug(&make_drug("A"), &OWNER.into()).unwrap();
    let second = ledger.create_drug(&make_drug("B"), &ADDR1.into()).unwrap();
    let third = ledger.create_drug(&make_drug("A"), &ADDR2.into()).unwrap();

    assert_eq!((first.id, second.id, third.id), (1, 2, 3));
    assert!(matches!(ledger.get_drug_details(4), Err(LedgerError::NotFound(_))));
    assert_eq!(ledger.drugs_owned_by(&ADDR1.into()).unwrap()[0].batch_number, "B");
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let owner = Identity::from(OWNER);

    {
        let db = Database::open(&path).unwrap();
        let ledger = DrugLedger::new(&db);
        ledger.create_drug(&make_drug("BATCH001"), &owner).unwrap();
        ledger.transfer_drug(1, &ADDR1.into(), &owner).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let ledger = DrugLedger::new(&db);
    assert_eq!(ledger.get_drug_details(1).unwrap().owner, Identity::from(ADDR1));

    // Ids continue after reopen
    let next = ledger.create_drug(&make_drug("BATCH002"), &owner).unwrap();
    assert_eq!(next.id, 2);
    assert!(EventLog::new(&db).verify_chain().unwrap().is_valid());
}
