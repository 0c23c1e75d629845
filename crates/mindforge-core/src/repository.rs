//! Agent repository — two backends with an explicit precedence rule.
//!
//! The in-memory cache is authoritative for the lifetime of a transaction:
//! commits land there first and reads prefer it. The persistent store is a
//! mirror, written best-effort after every commit and refreshed on demand
//! between transactions. A store failure is a warning, never a rollback.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::gateway::{AgentStore, GatewayError};
use crate::llm;
use crate::types::Agent;

/// Whether the persistent mirror kept up with the last commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    Mirrored,
    Failed(String),
}

pub struct AgentRepository {
    cache: RwLock<HashMap<String, Agent>>,
    store: Arc<dyn AgentStore>,
}

impl AgentRepository {
    pub fn new(store: Arc<dyn AgentStore>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Cache-first read. On a miss the record is fetched from the store,
    /// migrated to the current configuration layout, and cached.
    pub async fn load(&self, agent_id: &str) -> Result<Option<Agent>, GatewayError> {
        if let Some(agent) = self.cache.read().await.get(agent_id) {
            return Ok(Some(agent.clone()));
        }

        let Some(mut agent) = self.store.get(agent_id).await? else {
            return Ok(None);
        };
        llm::migrate_agent_config(&mut agent);

        let mut cache = self.cache.write().await;
        // A concurrent load may have beaten us; the cached copy wins.
        Ok(Some(
            cache
                .entry(agent_id.to_string())
                .or_insert(agent)
                .clone(),
        ))
    }

    /// Read the cached copy only, without touching the store.
    pub async fn get_cached(&self, agent_id: &str) -> Option<Agent> {
        self.cache.read().await.get(agent_id).cloned()
    }

    /// Seed the cache directly (minting, tests).
    pub async fn insert(&self, agent: Agent) {
        self.cache.write().await.insert(agent.id.clone(), agent);
    }

    /// Commit a new agent state: the cache write is the commit, the store
    /// write is a best-effort mirror.
    pub async fn commit(&self, agent: Agent) -> MirrorStatus {
        let agent_id = agent.id.clone();
        self.cache
            .write()
            .await
            .insert(agent_id.clone(), agent.clone());

        match self.store.put(&agent).await {
            Ok(()) => {
                info!(agent_id = %agent_id, "agent state mirrored to store");
                MirrorStatus::Mirrored
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "store mirror failed; cache remains authoritative");
                MirrorStatus::Failed(e.message)
            }
        }
    }

    /// Re-read the store copy into the cache. Only safe between
    /// transactions — the pipeline's per-agent lock must not be held by
    /// anyone else.
    pub async fn refresh(&self, agent_id: &str) -> Result<Option<Agent>, GatewayError> {
        let Some(mut agent) = self.store.get(agent_id).await? else {
            return Ok(None);
        };
        llm::migrate_agent_config(&mut agent);
        self.cache
            .write()
            .await
            .insert(agent_id.to_string(), agent.clone());
        Ok(Some(agent))
    }

    pub fn store(&self) -> &Arc<dyn AgentStore> {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory store double shared by repository and pipeline tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryStore {
        pub records: Mutex<HashMap<String, Agent>>,
        pub audit: Mutex<Vec<(String, serde_json::Value)>>,
        pub fail_puts: AtomicBool,
        pub put_calls: AtomicUsize,
    }

    #[async_trait]
    impl AgentStore for MemoryStore {
        async fn get(&self, agent_id: &str) -> Result<Option<Agent>, GatewayError> {
            Ok(self.records.lock().await.get(agent_id).cloned())
        }

        async fn put(&self, agent: &Agent) -> Result<(), GatewayError> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(GatewayError::unknown("store unavailable"));
            }
            self.records
                .lock()
                .await
                .insert(agent.id.clone(), agent.clone());
            Ok(())
        }

        async fn delete(&self, agent_id: &str) -> Result<(), GatewayError> {
            self.records.lock().await.remove(agent_id);
            Ok(())
        }

        async fn append_audit(
            &self,
            collection: &str,
            record: serde_json::Value,
        ) -> Result<(), GatewayError> {
            self.audit
                .lock()
                .await
                .push((collection.to_string(), record));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use crate::types::{
        AgentStats, AgentStatus, Archetype, ModelConfig, Performance, RetrievalConfig,
    };
    use std::sync::atomic::Ordering;

    fn agent(id: &str, level: u32) -> Agent {
        Agent {
            id: id.into(),
            name: "Scout".into(),
            description: String::new(),
            persona: String::new(),
            owner: "owner".into(),
            archetype: Archetype::Specialist,
            domain: "Technical".into(),
            level,
            experience: 0,
            experience_to_next: 1200,
            capabilities: vec![],
            minted_at: "2025-01-01T00:00:00Z".into(),
            status: AgentStatus::Active,
            performance: Performance::default(),
            model_config: ModelConfig {
                model: "GPT-3.5".into(),
                version: "3.5-turbo-0613".into(),
                temperature: 0.7,
                max_tokens: 4096,
                context_window: 4096,
            },
            retrieval_config: RetrievalConfig {
                data_source: String::new(),
                vector_index: String::new(),
                content_hash: String::new(),
                knowledge_base: vec![],
                updated_at: String::new(),
            },
            history: vec![],
            stats: AgentStats::default(),
            avatar: None,
            config_version: crate::types::CONFIG_VERSION,
        }
    }

    #[tokio::test]
    async fn load_fetches_from_store_then_caches() {
        let store = Arc::new(MemoryStore::default());
        store
            .records
            .lock()
            .await
            .insert("a-1".into(), agent("a-1", 3));
        let repo = AgentRepository::new(store.clone());

        let loaded = repo.load("a-1").await.unwrap().unwrap();
        assert_eq!(loaded.level, 3);

        // Mutate the store behind the cache; cached copy must win.
        store
            .records
            .lock()
            .await
            .insert("a-1".into(), agent("a-1", 9));
        let cached = repo.load("a-1").await.unwrap().unwrap();
        assert_eq!(cached.level, 3);
    }

    #[tokio::test]
    async fn load_migrates_old_config_versions() {
        let store = Arc::new(MemoryStore::default());
        let mut old = agent("a-2", 4);
        old.config_version = 1;
        store.records.lock().await.insert("a-2".into(), old);
        let repo = AgentRepository::new(store);

        let loaded = repo.load("a-2").await.unwrap().unwrap();
        assert_eq!(loaded.config_version, crate::types::CONFIG_VERSION);
        // Level-4 specialist tier targets GPT-4 Turbo
        assert_eq!(loaded.model_config.model, "GPT-4 Turbo");
    }

    #[tokio::test]
    async fn commit_survives_store_failure() {
        let store = Arc::new(MemoryStore::default());
        store.fail_puts.store(true, Ordering::SeqCst);
        let repo = AgentRepository::new(store.clone());

        let status = repo.commit(agent("a-3", 5)).await;
        assert!(matches!(status, MirrorStatus::Failed(_)));
        // Cache still has the committed state.
        assert_eq!(repo.get_cached("a-3").await.unwrap().level, 5);
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_overwrites_the_cache() {
        let store = Arc::new(MemoryStore::default());
        let repo = AgentRepository::new(store.clone());
        repo.insert(agent("a-4", 2)).await;

        store
            .records
            .lock()
            .await
            .insert("a-4".into(), agent("a-4", 6));
        let refreshed = repo.refresh("a-4").await.unwrap().unwrap();
        assert_eq!(refreshed.level, 6);
        assert_eq!(repo.get_cached("a-4").await.unwrap().level, 6);
    }

    #[tokio::test]
    async fn missing_agent_is_none() {
        let repo = AgentRepository::new(Arc::new(MemoryStore::default()));
        assert!(repo.load("ghost").await.unwrap().is_none());
    }
}
