//! The orchestration coordinator. Owns the key/plan/mission lifecycle and is
//! the only place that mutates the store: every mission mutation runs inside
//! a single-field transaction, with bounded retry on conflict, and successful
//! mutations publish events and maintain the derived indices (per-plan active
//! lists and the completed list).

pub mod janitor;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::auth::{
    has_disallowed_characters, hash_password, is_reserved, random_string, validate_password,
    RESERVED_KEYS,
};
use crate::config::{HoustonConfig, DEFAULT_REDIS_ADDR};
use crate::error::{HoustonError, Result};
use crate::events::{Event, EventHub};
use crate::mission::{Mission, Response};
use crate::model::{Key, Plan};
use crate::store::{KvStore, LocalStore, RedisStore};

/// Attempts made against a conflicting transaction before surfacing the
/// error to the caller (who retries at the transport layer on 572/429).
const TRANSACTION_ATTEMPTS: u32 = 3;

/// Upper bound for minting `m<usage>` mission IDs before giving up.
const MISSION_ID_CAP: u64 = 500;

#[derive(Debug, Clone, Default)]
struct Credentials {
    hash: String,
    salt: String,
}

/// One Houston instance: a store, an event hub, and the admin credentials.
pub struct Api {
    store: Arc<dyn KvStore>,
    events: EventHub,
    config: HoustonConfig,
    credentials: RwLock<Credentials>,
}

impl Api {
    /// Connect to the configured store and build the coordinator. Falls back
    /// to the in-process store only when the configured redis address is the
    /// documented default; any other unreachable or malformed address fails
    /// fast.
    pub async fn new(config: HoustonConfig) -> Result<Self> {
        let redis = RedisStore::connect(
            &config.redis_addr,
            &config.redis_password,
            config.redis_db,
            config.memory_limit_mib,
        )?;

        let store: Arc<dyn KvStore> = match redis.ping().await {
            Ok(()) => {
                info!(addr = %config.redis_addr, "connected to redis database");
                Arc::new(redis)
            }
            Err(e) if config.redis_addr == DEFAULT_REDIS_ADDR => {
                warn!(addr = %config.redis_addr, error = %e, "couldn't connect to redis; using in-memory database");
                Arc::new(LocalStore::new())
            }
            Err(e) => {
                error!(addr = %config.redis_addr, error = %e, "couldn't connect to redis");
                return Err(e);
            }
        };

        Self::with_store(store, config).await
    }

    /// Build the coordinator on an existing store. Used directly by tests.
    pub async fn with_store(store: Arc<dyn KvStore>, config: HoustonConfig) -> Result<Self> {
        // the system key holds the hashed admin password and salt
        store.create_key("m").await?;

        let api = Self {
            store,
            events: EventHub::new(),
            config,
            credentials: RwLock::new(Credentials::default()),
        };
        api.init_credentials().await?;
        Ok(api)
    }

    pub fn config(&self) -> &HoustonConfig {
        &self.config
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Adopt stored credentials when the store already holds them (disaster
    /// recovery), otherwise hash and persist the configured password.
    async fn init_credentials(&self) -> Result<()> {
        let configured = self.config.password.trim().to_string();

        let stored_hash = self.store.get("m", "p").await;
        let stored_salt = self.store.get("m", "s").await;
        if let (Some(hash), Some(salt)) = (stored_hash, stored_salt) {
            let keys = self.store.list_keys().await.unwrap_or_default();
            info!(
                keys = keys.len(),
                "recovering using existing settings, keys, and plans"
            );
            if !configured.is_empty() && hash_password(&configured, &salt) != hash {
                warn!(
                    "the configured password does not match the stored credentials; \
                     the password has been changed since the config was set and the stored one wins"
                );
            }
            *self.credentials.write() = Credentials { hash, salt };
        } else if !configured.is_empty() {
            self.set_password(&configured).await?;
        } else {
            warn!("API has no admin password");
        }
        Ok(())
    }

    /// Validate, salt, hash, and persist a new admin password. The stored
    /// copy exists for disaster recovery: a restarted server adopts it.
    pub async fn set_password(&self, password: &str) -> Result<()> {
        info!("attempt made to set new password");
        validate_password(password)?;

        // every instance gets a fresh random salt; it changes with the password
        let salt = random_string(10);
        let hash = hash_password(password, &salt);

        self.store.set("m", "p", &hash).await?;
        self.store.set("m", "s", &salt).await?;
        *self.credentials.write() = Credentials { hash, salt };
        info!("new password has been set");
        Ok(())
    }

    /// True when admin routes require credentials.
    pub fn admin_protected(&self) -> bool {
        !self.credentials.read().hash.is_empty()
    }

    pub fn verify_admin(&self, username: &str, password: &str) -> Result<()> {
        let creds = self.credentials.read().clone();
        if creds.hash.is_empty() {
            return Ok(());
        }
        if username != "admin" || hash_password(password, &creds.salt) != creds.hash {
            return Err(HoustonError::BadCredentials);
        }
        Ok(())
    }

    /// Check that a client-supplied key exists. Reserved names are rejected
    /// before the store is consulted.
    pub async fn check_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(HoustonError::KeyNotProvided);
        }
        if is_reserved(key) {
            return Err(HoustonError::BadRequest(format!(
                "key with id '{key}' is not allowed because this value is reserved"
            )));
        }
        match self.store.get(key, "u").await {
            Some(_) => Ok(()),
            None => Err(HoustonError::KeyNotFound),
        }
    }

    /// Create a key, or update its display name if it already exists. A
    /// random 40-character ID is generated when none is supplied.
    pub async fn create_key(&self, id: &str, name: &str) -> Result<String> {
        debug!(key = id, name, "creating key");

        let key = if id.is_empty() {
            random_string(40)
        } else {
            if has_disallowed_characters(id) {
                return Err(HoustonError::BadRequest(format!(
                    "key with ID '{id}' is not allowed because it contains invalid characters. \
                     Keys may not contain any newlines, parentheses, backslashes, etc"
                )));
            }
            if is_reserved(id) {
                return Err(HoustonError::BadRequest(format!(
                    "key with id '{id}' is not allowed because this value is reserved"
                )));
            }
            id.to_string()
        };

        let exists = self.store.get(&key, "u").await.is_some();
        if !exists {
            self.store.create_key(&key).await?;
            self.store.set(&key, "u", "0").await?;
            self.store.set(&key, "c", "").await?;
        }
        // set the display name; this is the only change for an existing key
        self.store.set(&key, "n", name).await?;

        if exists {
            info!(key = %key, name, "updated key");
        } else {
            info!(key = %key, name, "created key");
        }
        Ok(key)
    }

    pub async fn delete_key(&self, key: &str) -> Result<()> {
        self.store.delete_key(key).await?;
        info!(key, "deleted key");
        Ok(())
    }

    pub async fn list_keys(&self) -> Result<Vec<String>> {
        self.store.list_keys().await
    }

    pub async fn get_key(&self, key: &str) -> Key {
        Key {
            id: key.to_string(),
            name: self.store.get(key, "n").await.unwrap_or_default(),
            usage: self.store.get(key, "u").await.unwrap_or_default(),
        }
    }

    /// Store a plan if it is valid. Overwriting an existing plan is allowed;
    /// the per-plan active list is only initialised the first time.
    pub async fn save_plan(&self, key: &str, plan: Plan) -> Result<()> {
        if plan.name.is_empty() || has_disallowed_characters(&plan.name) {
            return Err(HoustonError::BadRequest(format!(
                "plan with name '{}' is not allowed because it contains invalid characters",
                plan.name
            )));
        }

        // lift to a mission to validate the graph
        let mission = Mission::from_plan(&plan);
        mission.validate()?;

        let plan_json = serde_json::to_string(&plan)?;
        let existing = self.store.get(key, &format!("p|{}", plan.name)).await;
        self.store
            .set(key, &format!("p|{}", plan.name), &plan_json)
            .await?;
        if existing.unwrap_or_default().is_empty() {
            self.store.set(key, &format!("a|{}", plan.name), "").await?;
        }

        info!(key, plan = %plan.name, "plan saved");
        self.events
            .publish(Event::new(key, "planCreation", plan_json.into_bytes()))
            .await;
        Ok(())
    }

    pub async fn get_plan_json(&self, key: &str, name: &str) -> Result<String> {
        self.store
            .get(key, &format!("p|{name}"))
            .await
            .ok_or_else(|| HoustonError::PlanNotFound(name.to_string()))
    }

    /// The lifted-mission view of a saved plan: all stages ready, zero
    /// timestamps.
    pub async fn plan_as_mission(&self, key: &str, name: &str) -> Result<Mission> {
        let plan_json = self.get_plan_json(key, name).await?;
        let plan: Plan = serde_json::from_str(&plan_json)?;
        Ok(Mission::from_plan(&plan))
    }

    /// All plan names: the union of saved plans and plans that only exist
    /// through their active missions, first-seen order preserved.
    pub async fn list_plans(&self, key: &str) -> Result<Vec<String>> {
        let mut plans: Vec<String> = self
            .store
            .list(key, "p|")
            .await?
            .into_iter()
            .map(|f| f.trim_start_matches("p|").to_string())
            .collect();

        let active = self.store.list(key, "a|").await?;
        for field in active {
            let name = field.trim_start_matches("a|").to_string();
            if !plans.contains(&name) {
                plans.push(name);
            }
        }
        Ok(plans)
    }

    /// Delete a plan and cascade to all of its missions.
    pub async fn delete_plan(&self, key: &str, name: &str) -> Result<()> {
        let mut was_deleted = self.store.delete(key, &format!("p|{name}")).await;

        if let Some(active) = self.store.get(key, &format!("a|{name}")).await {
            let ids: Vec<&str> = active.split(',').filter(|s| !s.is_empty()).collect();
            for id in &ids {
                self.store.delete(key, id).await;
            }
            // drop the cascaded missions from the completed list
            let completed = self.completed_missions(key).await;
            let remaining: Vec<String> = completed
                .into_iter()
                .filter(|c| !ids.contains(&c.as_str()))
                .collect();
            self.store.set(key, "c", &remaining.join(",")).await?;
        }

        was_deleted = self.store.delete(key, &format!("a|{name}")).await && was_deleted;
        if !was_deleted {
            return Err(HoustonError::BadRequest(format!(
                "could not delete plan '{name}'"
            )));
        }

        info!(key, plan = name, "plan deleted");
        self.events
            .publish(Event::new(key, "planDeleted", name.as_bytes().to_vec()))
            .await;
        Ok(())
    }

    /// Create a mission from a saved plan (by name) or an inline plan (as
    /// JSON). Returns the new mission ID.
    pub async fn create_mission(
        &self,
        key: &str,
        plan_name_or_json: &str,
        mission_id: &str,
    ) -> Result<String> {
        // anything containing '{' is treated as an inline plan; an unsaved
        // plan still gets an active list so its missions remain listable
        let plan_json = if plan_name_or_json.contains('{') {
            plan_name_or_json.to_string()
        } else {
            match self.store.get(key, &format!("p|{plan_name_or_json}")).await {
                Some(p) => p,
                None => {
                    return Err(HoustonError::PlanNotFound(plan_name_or_json.to_string()));
                }
            }
        };

        let plan: Plan = serde_json::from_str(&plan_json)?;
        if plan.name.is_empty() || has_disallowed_characters(&plan.name) {
            return Err(HoustonError::BadRequest(format!(
                "plan with name '{}' is not allowed because it contains invalid characters",
                plan.name
            )));
        }

        let mut mission = Mission::from_plan(&plan);
        mission.validate()?;

        let id = if mission_id.is_empty() {
            self.mint_mission_id(key).await?
        } else {
            if has_disallowed_characters(mission_id) {
                return Err(HoustonError::BadRequest(format!(
                    "mission with id '{mission_id}' is not allowed because it contains invalid characters"
                )));
            }
            if is_reserved(mission_id) {
                return Err(HoustonError::BadRequest(format!(
                    "mission with id '{mission_id}' is not allowed. Ensure that mission ID is not one of the following reserved keys: {}",
                    RESERVED_KEYS.join(",")
                )));
            }
            if self.store.get(key, mission_id).await.is_some() {
                return Err(HoustonError::BadRequest(format!(
                    "mission with id '{mission_id}' already exists"
                )));
            }
            mission_id.to_string()
        };

        mission.id = id.clone();
        mission.start = Some(chrono::Utc::now());
        let mission_json = mission.to_json();

        self.store.set(key, &id, &mission_json).await?;

        // append to the plan's active list, creating it on first use
        let mut active = self
            .store
            .get(key, &format!("a|{}", mission.name))
            .await
            .unwrap_or_default();
        if !active.is_empty() {
            active.push(',');
        }
        active.push_str(&id);
        self.store
            .set(key, &format!("a|{}", mission.name), &active)
            .await?;

        info!(key, mission_id = %id, plan = %mission.name, "mission created");
        self.events
            .publish(Event::new(key, "missionCreation", mission_json.into_bytes()))
            .await;
        Ok(id)
    }

    /// Mint `m<usage>`, walking forward from the usage counter on collision.
    /// Bounded so a corrupt counter cannot loop forever.
    async fn mint_mission_id(&self, key: &str) -> Result<String> {
        let usage = self.store.get(key, "u").await.unwrap_or_default();
        let candidate = format!("m{usage}");
        if self.store.get(key, &candidate).await.is_none() {
            return Ok(candidate);
        }

        let mut n: u64 = usage.parse().unwrap_or(0);
        loop {
            n += 1;
            if n > MISSION_ID_CAP {
                warn!(key, "mission ID generation exhausted");
                return Err(HoustonError::BadRequest(
                    "couldn't create a mission because a new mission ID could not be generated"
                        .to_string(),
                ));
            }
            let candidate = format!("m{n}");
            if self.store.get(key, &candidate).await.is_none() {
                return Ok(candidate);
            }
        }
    }

    pub async fn get_mission_json(&self, key: &str, mission_id: &str) -> Result<String> {
        self.store
            .get(key, mission_id)
            .await
            .ok_or_else(|| HoustonError::MissionNotFound(mission_id.to_string()))
    }

    pub async fn mission_report(&self, key: &str, mission_id: &str) -> Result<String> {
        let mission = Mission::from_json(&self.get_mission_json(key, mission_id).await?)?;
        Ok(mission.report())
    }

    /// Apply one stage state change inside a store transaction. Conflicts are
    /// retried with exponential backoff; after the final attempt the
    /// `TransactionFailed` error surfaces so the client can retry.
    pub async fn update_stage_state(
        &self,
        key: &str,
        mission_id: &str,
        stage: &str,
        state: &str,
        ignore_dependencies: bool,
    ) -> Result<Response> {
        debug!(key, mission_id, stage, state, "updating stage state");

        let mut outcome: Option<Response> = None;
        let mut mission_json = String::new();

        let result = {
            let mut txn = |current: &str| -> Result<String> {
                // parse failure would mean a mission that bypassed validation
                let mut mission = Mission::from_json(current)?;

                let response = match state {
                    "started" => mission.start_stage(stage, ignore_dependencies),
                    "finished" => mission.finish_stage(stage, ignore_dependencies),
                    "skipped" => mission.skip_stage(stage),
                    "failed" => mission.fail_stage(stage),
                    "excluded" | "ignored" => mission.exclude_stage(stage),
                    other => Err(HoustonError::BadRequest(format!(
                        "invalid stage state '{other}'; choose one of started, finished, failed, skipped, or excluded"
                    ))),
                }?;

                mission_json = mission.to_json();
                outcome = Some(response);
                Ok(mission_json.clone())
            };

            let mut result = Ok(());
            for attempt in 0..TRANSACTION_ATTEMPTS {
                result = self.store.do_transaction(key, mission_id, &mut txn).await;
                match &result {
                    Err(HoustonError::TransactionFailed) if attempt + 1 < TRANSACTION_ATTEMPTS => {
                        debug!(key, mission_id, attempt = attempt + 1, "transaction conflict; retrying");
                        let backoff = 10 * u64::from((attempt + 1) * (attempt + 1));
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    _ => break,
                }
            }
            result
        };

        match result {
            Ok(()) => {}
            Err(e) => {
                warn!(key, mission_id, stage, state, error = %e, "stage update failed");
                return Err(e);
            }
        }

        let response = outcome.unwrap_or(Response {
            success: false,
            next: Vec::new(),
            is_complete: false,
        });

        info!(key, mission_id, stage, state, "stage state updated");
        self.events
            .publish(Event::new(
                key,
                "missionUpdate",
                mission_json.clone().into_bytes(),
            ))
            .await;

        // a completing update also lands the mission on the cleanup list
        if response.is_complete {
            self.events
                .publish(Event::new(
                    key,
                    "missionCompleted",
                    mission_json.into_bytes(),
                ))
                .await;
            let mut completed = self.completed_missions(key).await;
            completed.push(mission_id.to_string());
            if let Err(e) = self.store.set(key, "c", &completed.join(",")).await {
                error!(key, mission_id, error = %e, "failed to record completed mission");
            }
            info!(key, mission_id, "mission is complete");
        }

        Ok(response)
    }

    /// Active mission IDs for one plan, creation order preserved.
    pub async fn active_missions(&self, key: &str, plan: &str) -> Vec<String> {
        split_list(
            &self
                .store
                .get(key, &format!("a|{plan}"))
                .await
                .unwrap_or_default(),
        )
    }

    /// Every mission ID under the key, regardless of plan. Less efficient
    /// than [`Api::active_missions`]; fields with schema meaning are skipped.
    pub async fn all_active_missions(&self, key: &str) -> Result<Vec<String>> {
        let fields = self.store.list(key, "").await?;
        Ok(fields
            .into_iter()
            .filter(|f| !f.contains('|') && f != "n" && f != "u" && f != "c")
            .collect())
    }

    /// Completed-but-not-deleted mission IDs in completion order.
    pub async fn completed_missions(&self, key: &str) -> Vec<String> {
        match self.store.get(key, "c").await {
            Some(list) if !list.is_empty() => split_list(&list),
            _ => {
                warn!(key, "completed mission list is empty");
                Vec::new()
            }
        }
    }

    /// Delete a mission and scrub it from the derived indices. Deleting a
    /// mission that does not exist is a no-op.
    pub async fn delete_mission(&self, key: &str, mission_id: &str) -> Result<()> {
        let Some(mission_json) = self.store.get(key, mission_id).await else {
            return Ok(());
        };

        // an unparseable mission just skips the active-list edit
        if let Ok(mission) = Mission::from_json(&mission_json) {
            let active = self
                .store
                .get(key, &format!("a|{}", mission.name))
                .await
                .unwrap_or_default();
            let active = remove_from_list(&active, mission_id);
            self.store
                .set(key, &format!("a|{}", mission.name), &active)
                .await?;
        }

        let completed = self.store.get(key, "c").await.unwrap_or_default();
        self.store
            .set(key, "c", &remove_from_list(&completed, mission_id))
            .await?;

        self.store.delete(key, mission_id).await;

        info!(key, mission_id, "mission deleted");
        self.events
            .publish(Event::new(
                key,
                "missionDeleted",
                mission_id.as_bytes().to_vec(),
            ))
            .await;
        Ok(())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn remove_from_list(list: &str, id: &str) -> String {
    list.split(',')
        .filter(|s| !s.is_empty() && *s != id)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_api() -> Api {
        let store = Arc::new(LocalStore::new());
        Api::with_store(store, HoustonConfig::default())
            .await
            .unwrap()
    }

    fn linear_plan() -> Plan {
        serde_json::from_str(
            r#"{"name":"p","stages":[{"name":"a"},{"name":"b","upstream":["a"]}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_list_editing() {
        assert_eq!(remove_from_list("m0,m1,m2", "m1"), "m0,m2");
        assert_eq!(remove_from_list("m0", "m0"), "");
        assert_eq!(remove_from_list("m0,m10", "m0"), "m10");
        assert_eq!(remove_from_list("", "m0"), "");
        assert_eq!(split_list(""), Vec::<String>::new());
        assert_eq!(split_list("m0,m1"), vec!["m0", "m1"]);
    }

    #[tokio::test]
    async fn test_create_key_initialises_fields() {
        let api = test_api().await;
        let key = api.create_key("", "test project").await.unwrap();
        assert_eq!(key.len(), 40);

        let info = api.get_key(&key).await;
        assert_eq!(info.name, "test project");
        assert_eq!(info.usage, "0");
        assert!(api.check_key(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_key_rejects_reserved_and_invalid() {
        let api = test_api().await;
        for reserved in RESERVED_KEYS {
            assert!(api.create_key(reserved, "x").await.is_err());
        }
        assert!(api.create_key("bad|key", "x").await.is_err());
        assert!(api.create_key("bad key", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_existing_key_only_updates_name() {
        let api = test_api().await;
        api.create_key("key1", "first").await.unwrap();
        api.create_key("key1", "second").await.unwrap();
        let info = api.get_key("key1").await;
        assert_eq!(info.name, "second");
        assert_eq!(info.usage, "0");
    }

    #[tokio::test]
    async fn test_check_key() {
        let api = test_api().await;
        assert_eq!(api.check_key("").await, Err(HoustonError::KeyNotProvided));
        assert_eq!(api.check_key("nope").await, Err(HoustonError::KeyNotFound));
        assert!(matches!(
            api.check_key("m").await,
            Err(HoustonError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_mission_id_minting_cap() {
        let api = test_api().await;
        api.create_key("key1", "").await.unwrap();
        api.save_plan("key1", linear_plan()).await.unwrap();

        // fill every candidate the generator could produce
        for n in 0..=MISSION_ID_CAP {
            api.store
                .set("key1", &format!("m{n}"), "{}")
                .await
                .unwrap();
        }
        let err = api.create_mission("key1", "p", "").await.unwrap_err();
        assert!(matches!(err, HoustonError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_save_plan_initialises_active_list_once() {
        let api = test_api().await;
        api.create_key("key1", "").await.unwrap();
        api.save_plan("key1", linear_plan()).await.unwrap();
        assert_eq!(api.store.get("key1", "a|p").await, Some(String::new()));

        let id = api.create_mission("key1", "p", "").await.unwrap();
        // overwriting the plan must not reset the active list
        api.save_plan("key1", linear_plan()).await.unwrap();
        assert_eq!(api.active_missions("key1", "p").await, vec![id]);
    }

    #[tokio::test]
    async fn test_password_lifecycle() {
        let api = test_api().await;
        assert!(!api.admin_protected());
        assert!(api.verify_admin("anyone", "anything").is_ok());

        api.set_password("super-secret-pw").await.unwrap();
        assert!(api.admin_protected());
        assert!(api.verify_admin("admin", "super-secret-pw").is_ok());
        assert_eq!(
            api.verify_admin("admin", "wrong-password"),
            Err(HoustonError::BadCredentials)
        );
        assert_eq!(
            api.verify_admin("root", "super-secret-pw"),
            Err(HoustonError::BadCredentials)
        );

        // hash and salt are persisted under the system key
        assert!(api.store.get("m", "p").await.is_some());
        assert!(api.store.get("m", "s").await.is_some());
    }

    #[tokio::test]
    async fn test_recovery_adopts_stored_credentials() {
        let store = Arc::new(LocalStore::new());
        let first = Api::with_store(
            Arc::clone(&store) as Arc<dyn KvStore>,
            HoustonConfig {
                password: "super-secret-pw".to_string(),
                ..HoustonConfig::default()
            },
        )
        .await
        .unwrap();
        drop(first);

        // second startup with a different configured password: stored wins
        let second = Api::with_store(
            store as Arc<dyn KvStore>,
            HoustonConfig {
                password: "different-password".to_string(),
                ..HoustonConfig::default()
            },
        )
        .await
        .unwrap();
        assert!(second.verify_admin("admin", "super-secret-pw").is_ok());
        assert!(second.verify_admin("admin", "different-password").is_err());
    }

    #[tokio::test]
    async fn test_unknown_stage_verb_rejected() {
        let api = test_api().await;
        api.create_key("key1", "").await.unwrap();
        api.save_plan("key1", linear_plan()).await.unwrap();
        let id = api.create_mission("key1", "p", "").await.unwrap();

        let err = api
            .update_stage_state("key1", &id, "a", "exploded", false)
            .await
            .unwrap_err();
        assert!(matches!(err, HoustonError::BadRequest(_)));
    }
}
