use super::ActionLogRepository;
use crate::domain::action_log::{entity, ActionLog, ActionType};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_test_log(entity_id: &str, action_type: ActionType, actor: &str) -> ActionLog {
    ActionLog::new(entity::COMMITMENT, entity_id, action_type, actor)
}

#[test]
fn test_insert_and_find_by_id() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    let log = make_test_log("R1", ActionType::SubmitCommitment, "user1")
        .with_payload(serde_json::json!({ "total_amount": "950000" }));
    let id = repo.insert(&log).unwrap();

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.entity_id, "R1");
    assert_eq!(found.action_type, "SubmitCommitment");
    assert_eq!(found.actor, "user1");
    assert_eq!(found.action_ts, log.action_ts);
    assert_eq!(
        found.payload_json.unwrap()["total_amount"],
        serde_json::json!("950000")
    );

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_entity_returns_trail_in_order() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    repo.insert(&make_test_log("R1", ActionType::CreateDraft, "user1")).unwrap();
    repo.insert(&make_test_log("R1", ActionType::SubmitCommitment, "user1")).unwrap();
    repo.insert(&make_test_log("R2", ActionType::CreateDraft, "user2")).unwrap();

    let trail = repo.find_by_entity(entity::COMMITMENT, "R1").unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].action_type, "CreateDraft");
    assert_eq!(trail[1].action_type, "SubmitCommitment");
}

#[test]
fn test_insert_tx_rolls_back_with_transaction() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn.clone());

    {
        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().unwrap();
        ActionLogRepository::insert_tx(&tx, &make_test_log("R1", ActionType::ForcedOverride, "u1"))
            .unwrap();
        // 未提交即析构
    }

    assert!(repo.find_recent(10).unwrap().is_empty());
}

#[test]
fn test_find_by_action_type() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    repo.insert(&make_test_log("R1", ActionType::ForcedOverride, "user1")).unwrap();
    repo.insert(&make_test_log("R2", ActionType::SubmitCommitment, "user1")).unwrap();
    repo.insert(&make_test_log("R3", ActionType::ForcedOverride, "user2")).unwrap();

    let overrides = repo
        .find_by_action_type(ActionType::ForcedOverride.as_str(), 10)
        .unwrap();
    assert_eq!(overrides.len(), 2);
    assert_eq!(overrides[0].entity_id, "R3");
    assert_eq!(repo.find_by_action_type("ForcedOverride", 1).unwrap().len(), 1);
}

#[test]
fn test_find_recent() {
    let conn = setup_test_db();
    let repo = ActionLogRepository::new(conn);

    for i in 1..=5 {
        repo.insert(&make_test_log(&format!("R{}", i), ActionType::CreateDraft, "user1"))
            .unwrap();
    }

    let logs = repo.find_recent(3).unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].entity_id, "R5");
}
