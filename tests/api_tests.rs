//! End-to-end scenarios against the coordinator with the in-process store:
//! the linear happy path, skips, ignored dependencies, concurrent updates,
//! plan-deletion cascades, and graph validation failures.

use std::sync::Arc;

use houston::api::Api;
use houston::config::HoustonConfig;
use houston::error::HoustonError;
use houston::mission::{Mission, StageState};
use houston::model::Plan;
use houston::store::LocalStore;

async fn test_api() -> Arc<Api> {
    let store = Arc::new(LocalStore::new());
    Arc::new(
        Api::with_store(store, HoustonConfig::default())
            .await
            .unwrap(),
    )
}

async fn api_with_key() -> (Arc<Api>, String) {
    let api = test_api().await;
    let key = api.create_key("", "integration tests").await.unwrap();
    (api, key)
}

const LINEAR_PLAN: &str =
    r#"{"name":"p","stages":[{"name":"a"},{"name":"b","upstream":["a"]}]}"#;

fn linear_plan() -> Plan {
    serde_json::from_str(LINEAR_PLAN).unwrap()
}

#[tokio::test]
async fn test_linear_happy_path() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    let id = api.create_mission(&key, "p", "m0").await.unwrap();
    assert_eq!(id, "m0");

    let res = api
        .update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap();
    assert!(res.success);
    assert!(res.next.is_empty());
    assert!(!res.is_complete);

    let res = api
        .update_stage_state(&key, "m0", "a", "finished", false)
        .await
        .unwrap();
    assert_eq!(res.next, vec!["b"]);
    assert!(!res.is_complete);

    let res = api
        .update_stage_state(&key, "m0", "b", "started", false)
        .await
        .unwrap();
    assert!(res.next.is_empty());

    let res = api
        .update_stage_state(&key, "m0", "b", "finished", false)
        .await
        .unwrap();
    assert!(res.next.is_empty());
    assert!(res.is_complete);

    // the completed index records it and the stored mission agrees
    assert_eq!(api.completed_missions(&key).await, vec!["m0"]);
    let mission = Mission::from_json(&api.get_mission_json(&key, "m0").await.unwrap()).unwrap();
    assert!(mission.is_complete());
    assert!(mission.end.is_some());
}

#[tokio::test]
async fn test_skip_completes_mission() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();

    api.update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "a", "finished", false)
        .await
        .unwrap();
    let res = api
        .update_stage_state(&key, "m0", "b", "skipped", false)
        .await
        .unwrap();
    assert!(res.is_complete);
}

#[tokio::test]
async fn test_start_with_ignored_dependencies() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();

    let res = api
        .update_stage_state(&key, "m0", "b", "started", true)
        .await
        .unwrap();
    assert!(res.success);

    // the ancestor is excluded now, so starting it fails
    let mission = Mission::from_json(&api.get_mission_json(&key, "m0").await.unwrap()).unwrap();
    assert_eq!(mission.get_stage("a").unwrap().state, StageState::Excluded);
    let err = api
        .update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap_err();
    assert!(matches!(err, HoustonError::StageChange(_)));

    let res = api
        .update_stage_state(&key, "m0", "b", "finished", false)
        .await
        .unwrap();
    assert!(res.is_complete);
}

/// Ten concurrent callers each drive an independent two-stage branch;
/// transaction conflicts surface as 572 and are retried client-side. Every
/// operation must eventually land, and the final stage completes the mission.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_stage_updates_serialize() {
    let (api, key) = api_with_key().await;

    // s3 depends on ten independent branches a..j, each s1x -> s2x
    let mut stages = Vec::new();
    let mut s3_upstream = Vec::new();
    for x in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
        stages.push(serde_json::json!({"name": format!("s1{x}")}));
        stages.push(serde_json::json!({"name": format!("s2{x}"), "upstream": [format!("s1{x}")]}));
        s3_upstream.push(format!("s2{x}"));
    }
    stages.push(serde_json::json!({"name": "s3", "upstream": s3_upstream}));
    let plan: Plan =
        serde_json::from_value(serde_json::json!({"name": "wide", "stages": stages})).unwrap();

    api.save_plan(&key, plan).await.unwrap();
    api.create_mission(&key, "wide", "m0").await.unwrap();

    async fn update_with_retry(api: &Api, key: &str, stage: &str, state: &str) {
        for _ in 0..100 {
            match api.update_stage_state(key, "m0", stage, state, false).await {
                Ok(_) => return,
                Err(HoustonError::TransactionFailed) => {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
                Err(e) => panic!("unexpected error for {stage} -> {state}: {e}"),
            }
        }
        panic!("update never succeeded for {stage} -> {state}");
    }

    let mut handles = Vec::new();
    for x in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
        let api = Arc::clone(&api);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            update_with_retry(&api, &key, &format!("s1{x}"), "started").await;
            update_with_retry(&api, &key, &format!("s1{x}"), "finished").await;
            update_with_retry(&api, &key, &format!("s2{x}"), "started").await;
            update_with_retry(&api, &key, &format!("s2{x}"), "finished").await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    api.update_stage_state(&key, "m0", "s3", "started", false)
        .await
        .unwrap();
    let res = api
        .update_stage_state(&key, "m0", "s3", "finished", false)
        .await
        .unwrap();
    assert!(res.is_complete);

    // every observed state arose from a valid serialization
    let mission = Mission::from_json(&api.get_mission_json(&key, "m0").await.unwrap()).unwrap();
    assert!(mission
        .stages
        .iter()
        .all(|s| s.state == StageState::Finished));
}

#[tokio::test]
async fn test_plan_deletion_cascades() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();
    api.create_mission(&key, "p", "m1").await.unwrap();

    // complete m0 so it lands on the completed list too
    api.update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "a", "finished", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "b", "skipped", false)
        .await
        .unwrap();
    assert_eq!(api.completed_missions(&key).await, vec!["m0"]);

    api.delete_plan(&key, "p").await.unwrap();

    assert!(matches!(
        api.get_plan_json(&key, "p").await,
        Err(HoustonError::PlanNotFound(_))
    ));
    assert!(matches!(
        api.get_mission_json(&key, "m0").await,
        Err(HoustonError::MissionNotFound(_))
    ));
    assert!(matches!(
        api.get_mission_json(&key, "m1").await,
        Err(HoustonError::MissionNotFound(_))
    ));
    assert!(api.active_missions(&key, "p").await.is_empty());
    assert!(api.completed_missions(&key).await.is_empty());
}

#[tokio::test]
async fn test_cycle_rejected_on_save() {
    let (api, key) = api_with_key().await;
    let plan: Plan = serde_json::from_str(
        r#"{"name":"bad","stages":[{"name":"a","upstream":["b"]},{"name":"b","upstream":["a"]}]}"#,
    )
    .unwrap();

    let err = api.save_plan(&key, plan).await.unwrap_err();
    match err {
        HoustonError::PlanValidation(detail) => {
            assert!(detail.contains("dependent on itself"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(api.get_plan_json(&key, "bad").await.is_err());
}

#[tokio::test]
async fn test_mission_from_inline_plan() {
    let (api, key) = api_with_key().await;

    // inline JSON plan: saved nowhere, but the active list exists for it
    let id = api.create_mission(&key, LINEAR_PLAN, "").await.unwrap();
    assert_eq!(id, "m0");
    assert_eq!(api.active_missions(&key, "p").await, vec!["m0"]);
    assert!(api.get_plan_json(&key, "p").await.is_err());
    // the unsaved plan is still listed through its active missions
    assert_eq!(api.list_plans(&key).await.unwrap(), vec!["p"]);
}

#[tokio::test]
async fn test_missing_plan_is_not_found() {
    let (api, key) = api_with_key().await;
    let err = api.create_mission(&key, "nope", "").await.unwrap_err();
    assert_eq!(err, HoustonError::PlanNotFound("nope".to_string()));
}

#[tokio::test]
async fn test_mission_listing_and_deletion() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();
    api.create_mission(&key, "p", "m1").await.unwrap();

    let mut all = api.all_active_missions(&key).await.unwrap();
    all.sort();
    assert_eq!(all, vec!["m0", "m1"]);
    assert_eq!(api.active_missions(&key, "p").await, vec!["m0", "m1"]);

    api.delete_mission(&key, "m0").await.unwrap();
    assert_eq!(api.active_missions(&key, "p").await, vec!["m1"]);
    assert!(api.get_mission_json(&key, "m0").await.is_err());

    // deleting again is a no-op
    api.delete_mission(&key, "m0").await.unwrap();
}

#[tokio::test]
async fn test_mission_ids_mint_sequentially_without_counter_movement() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();

    // usage stays at 0, so minting walks forward from m0 on collision
    assert_eq!(api.create_mission(&key, "p", "").await.unwrap(), "m0");
    assert_eq!(api.create_mission(&key, "p", "").await.unwrap(), "m1");
    assert_eq!(api.create_mission(&key, "p", "").await.unwrap(), "m2");
    assert_eq!(api.get_key(&key).await.usage, "0");
}

#[tokio::test]
async fn test_caller_supplied_ids_validated() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();

    assert!(api.create_mission(&key, "p", "bad|id").await.is_err());
    assert!(api.create_mission(&key, "p", "u").await.is_err());

    api.create_mission(&key, "p", "mine").await.unwrap();
    let err = api.create_mission(&key, "p", "mine").await.unwrap_err();
    assert!(matches!(err, HoustonError::BadRequest(_)));
}

#[tokio::test]
async fn test_operations_on_completed_mission_rejected() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();

    api.update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "a", "finished", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "b", "skipped", false)
        .await
        .unwrap();

    let err = api
        .update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap_err();
    assert_eq!(err, HoustonError::Completed);
}

#[tokio::test]
async fn test_mission_report() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();
    api.update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap();

    let report = api.mission_report(&key, "m0").await.unwrap();
    assert!(report.starts_with("p/m0"));
    assert!(report.contains("◎ a"));
    assert!(report.contains("○ b"));
}

#[tokio::test]
async fn test_events_published_for_mission_lifecycle() {
    let (api, key) = api_with_key().await;
    let mut sub = api.events().subscribe(key.clone());

    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();
    api.update_stage_state(&key, "m0", "a", "started", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "a", "finished", false)
        .await
        .unwrap();
    api.update_stage_state(&key, "m0", "b", "skipped", false)
        .await
        .unwrap();
    api.delete_mission(&key, "m0").await.unwrap();

    let mut events = Vec::new();
    for _ in 0..7 {
        let frame = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            sub.receiver.recv(),
        )
        .await
        .expect("timed out waiting for event")
        .expect("hub closed");
        let value: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        events.push(value["event"].as_str().unwrap().to_string());
    }

    assert_eq!(
        events,
        vec![
            "planCreation",
            "missionCreation",
            "missionUpdate",
            "missionUpdate",
            "missionUpdate",
            "missionCompleted",
            "missionDeleted",
        ]
    );
}

#[tokio::test]
async fn test_deleted_key_loses_everything() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();

    api.delete_key(&key).await.unwrap();
    assert_eq!(api.check_key(&key).await, Err(HoustonError::KeyNotFound));
}

#[tokio::test]
async fn test_store_listing_matches_schema() {
    let (api, key) = api_with_key().await;
    api.save_plan(&key, linear_plan()).await.unwrap();
    api.create_mission(&key, "p", "m0").await.unwrap();

    let plans = api.list_plans(&key).await.unwrap();
    assert_eq!(plans, vec!["p"]);
    let missions = api.all_active_missions(&key).await.unwrap();
    assert_eq!(missions, vec!["m0"]);
}
