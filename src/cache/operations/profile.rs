use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::cache::keys::profile_key;
use crate::cache::memory::ProfileCache;
use crate::error::RefreshError;
use crate::models::{self, Identity, Placeholder, Profile};
use crate::remote::DocumentSource;
use crate::store::KeyValueStore;

/// 立即加载的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// 来自内存层或持久层
    Cached(Profile),
    /// 由认证信息合成，未写入任何缓存层
    Placeholder(Placeholder),
}

/// 用户资料三级读取：内存 -> 本地持久层 -> 远程文档源
pub struct ProfileLoader {
    auth: Arc<dyn AuthProvider>,
    remote: Arc<dyn DocumentSource>,
    store: Arc<dyn KeyValueStore>,
    memory: ProfileCache,
    collection: String,
}

impl ProfileLoader {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        remote: Arc<dyn DocumentSource>,
        store: Arc<dyn KeyValueStore>,
        memory: ProfileCache,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            remote,
            store,
            memory,
            collection: collection.into(),
        }
    }

    pub fn memory(&self) -> &ProfileCache {
        &self.memory
    }

    /// 同步探测内存层
    pub fn from_memory(&self, identity_id: &str) -> Option<Profile> {
        self.memory.get(identity_id)
    }

    /// 尽快给界面一个可显示的值
    ///
    /// 内存命中时不会挂起；否则读取持久层，命中则提升到内存层，
    /// 未命中则返回占位资料。没有已认证身份时返回 `None` 且不做 I/O。
    pub async fn load_immediate(&self, identity_id: &str) -> Option<Loaded> {
        self.current(identity_id)?;

        if let Some(profile) = self.memory.get(identity_id) {
            return Some(Loaded::Cached(profile));
        }

        let generation = self.memory.generation();
        let persisted = self.read_persisted(identity_id).await;

        // 读取期间会话可能已结束或缓存已被清除
        let identity = self.current(identity_id)?;
        if self.memory.generation() != generation {
            tracing::debug!("Cache for {} invalidated during load", identity_id);
            return Some(Loaded::Placeholder(Placeholder::from_identity(&identity)));
        }

        match persisted {
            Some(profile) => Some(Loaded::Cached(self.memory.promote(profile))),
            None => Some(Loaded::Placeholder(Placeholder::from_identity(&identity))),
        }
    }

    /// 从远程获取权威记录并写穿两级缓存
    ///
    /// 失败时缓存保持不变。若获取期间发生过缓存清除，
    /// 仍返回记录但不回写。
    pub async fn refresh(&self, identity_id: &str) -> Result<Profile, RefreshError> {
        let generation = self.memory.generation();

        let document = self
            .remote
            .fetch_document(&self.collection, identity_id)
            .await?
            .ok_or_else(|| RefreshError::NotFound(identity_id.to_string()))?;
        let profile = Profile::from_document(identity_id, document)?;

        if self.memory.generation() != generation {
            tracing::debug!(
                "Cache for {} invalidated during refresh, skipping write-through",
                identity_id
            );
            return Ok(profile);
        }

        self.memory.insert(profile.clone());
        self.write_persisted(&profile, generation).await;

        Ok(profile)
    }

    /// 登出前清除两级缓存，持久层删除完成后才返回
    pub async fn invalidate(&self, identity_id: &str) {
        self.memory.remove(identity_id);

        let key = profile_key(identity_id);
        if let Err(e) = self.store.remove(&key).await {
            tracing::warn!("Failed to remove cached profile {}: {}", key, e);
        }

        tracing::info!("Invalidated cached profile for {}", identity_id);
    }

    fn current(&self, identity_id: &str) -> Option<Identity> {
        let identity = self.auth.current_identity()?;
        if identity.uid != identity_id {
            tracing::warn!(
                "Requested profile {} but signed in as {}",
                identity_id,
                identity.uid
            );
            return None;
        }
        Some(identity)
    }

    async fn read_persisted(&self, identity_id: &str) -> Option<Profile> {
        let key = profile_key(identity_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read cached profile {}: {}", key, e);
                return None;
            }
        };

        match models::decode(&raw) {
            Ok(profile) if profile.identity_id == identity_id => Some(profile),
            Ok(profile) => {
                tracing::warn!(
                    "Cached profile {} belongs to {}, ignoring",
                    key,
                    profile.identity_id
                );
                None
            }
            Err(e) => {
                tracing::warn!("Failed to decode cached profile {}: {}", key, e);
                None
            }
        }
    }

    async fn write_persisted(&self, profile: &Profile, generation: u64) {
        let key = profile_key(&profile.identity_id);
        let raw = match models::encode(profile) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to encode profile {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(&key, &raw).await {
            tracing::warn!("Failed to persist profile {}: {}", key, e);
            return;
        }

        // 写入期间发生了失效，撤销这次写入
        if self.memory.generation() != generation {
            if let Err(e) = self.store.remove(&key).await {
                tracing::warn!("Failed to remove cached profile {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use futures_util::FutureExt;
    use serde_json::json;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::MemoryAuth;
    use crate::error::RemoteError;
    use crate::remote::{FirestoreSource, MemoryDocuments};
    use crate::store::MemoryStore;

    struct Fixture {
        auth: Arc<MemoryAuth>,
        remote: Arc<MemoryDocuments>,
        store: Arc<MemoryStore>,
        loader: ProfileLoader,
    }

    fn fixture_with(remote: MemoryDocuments, store: MemoryStore) -> Fixture {
        let identity = Identity::new("U", "ana@x.edu").with_display_name("Ana");
        let auth = Arc::new(MemoryAuth::signed_in(identity));
        let remote = Arc::new(remote);
        let store = Arc::new(store);
        let loader = ProfileLoader::new(
            auth.clone(),
            remote.clone(),
            store.clone(),
            ProfileCache::new(),
            "users",
        );
        Fixture {
            auth,
            remote,
            store,
            loader,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryDocuments::new(), MemoryStore::new())
    }

    fn cached_ana() -> Profile {
        Profile {
            identity_id: "U".into(),
            name: "Ana".into(),
            email: "ana@x.edu".into(),
            course: "BSIT".into(),
            year: "3rd Year".into(),
            created_at: None,
        }
    }

    fn remote_ana() -> Profile {
        Profile {
            created_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()),
            ..cached_ana()
        }
    }

    fn seed_remote(f: &Fixture, profile: &Profile) {
        f.remote.insert("users", "U", profile.to_document());
    }

    #[tokio::test]
    async fn memory_hit_completes_without_io() {
        let f = fixture();
        f.loader.memory().insert(cached_ana());

        let loaded = f.loader.load_immediate("U").now_or_never();
        assert_eq!(loaded, Some(Some(Loaded::Cached(cached_ana()))));
        assert_eq!(f.store.operations(), 0);
        assert_eq!(f.remote.fetches(), 0);
    }

    #[tokio::test]
    async fn persistent_hit_is_promoted() {
        let f = fixture();
        f.store
            .seed("user_U", &models::encode(&cached_ana()).unwrap());

        let loaded = f.loader.load_immediate("U").await;
        assert_eq!(loaded, Some(Loaded::Cached(cached_ana())));
        assert_eq!(f.loader.from_memory("U"), Some(cached_ana()));
        assert_eq!(f.store.reads(), 1);
    }

    #[tokio::test]
    async fn miss_synthesizes_placeholder_without_caching() {
        let f = fixture();

        let loaded = f.loader.load_immediate("U").await;
        let Some(Loaded::Placeholder(placeholder)) = loaded else {
            panic!("expected placeholder, got {:?}", loaded);
        };
        assert_eq!(placeholder.name, "Ana");
        assert_eq!(placeholder.course, "—");
        assert_eq!(placeholder.year, "—");

        assert!(f.loader.memory().is_empty());
        assert_eq!(f.store.peek("user_U"), None);
        assert_eq!(f.store.writes(), 0);
    }

    #[tokio::test]
    async fn no_identity_means_no_io() {
        let f = fixture();
        f.auth.expire_session();
        f.loader.memory().insert(cached_ana());

        assert_eq!(f.loader.load_immediate("U").await, None);
        assert_eq!(f.store.operations(), 0);
    }

    #[tokio::test]
    async fn other_identity_gets_nothing() {
        let f = fixture();
        let other = Profile {
            identity_id: "V".into(),
            ..cached_ana()
        };
        f.store.seed("user_V", &models::encode(&other).unwrap());

        assert_eq!(f.loader.load_immediate("V").await, None);
        assert_eq!(f.store.operations(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_a_miss() {
        let f = fixture();
        f.store
            .seed("user_U", &models::encode(&cached_ana()).unwrap());
        f.store.set_failing(true);

        let loaded = f.loader.load_immediate("U").await;
        assert!(matches!(loaded, Some(Loaded::Placeholder(_))));
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let f = fixture();
        f.store.seed("user_U", "{not json");

        let loaded = f.loader.load_immediate("U").await;
        assert!(matches!(loaded, Some(Loaded::Placeholder(_))));
        assert!(f.loader.memory().is_empty());
    }

    #[tokio::test]
    async fn refresh_writes_through_both_tiers() {
        let f = fixture();
        f.loader.memory().insert(cached_ana());
        seed_remote(&f, &remote_ana());

        let profile = f.loader.refresh("U").await.unwrap();
        assert_eq!(profile, remote_ana());
        assert_eq!(f.loader.from_memory("U"), Some(remote_ana()));
        let persisted = models::decode(&f.store.peek("user_U").unwrap()).unwrap();
        assert_eq!(persisted, remote_ana());
    }

    #[tokio::test]
    async fn refresh_failures_leave_cache_untouched() {
        let f = fixture();
        f.loader.memory().insert(cached_ana());
        f.store
            .seed("user_U", &models::encode(&cached_ana()).unwrap());

        let err = f.loader.refresh("U").await.unwrap_err();
        assert!(matches!(err, RefreshError::NotFound(ref id) if id == "U"));

        seed_remote(&f, &remote_ana());
        f.remote.set_unreachable(true);
        let err = f.loader.refresh("U").await.unwrap_err();
        assert!(matches!(err, RefreshError::Unreachable(_)));

        assert_eq!(f.loader.from_memory("U"), Some(cached_ana()));
        assert_eq!(
            models::decode(&f.store.peek("user_U").unwrap()).unwrap(),
            cached_ana()
        );
    }

    #[tokio::test]
    async fn malformed_document_is_reported() {
        let f = fixture();
        let serde_json::Value::Object(document) = json!({ "name": 42 }) else {
            unreachable!()
        };
        f.remote.insert("users", "U", document);

        let err = f.loader.refresh("U").await.unwrap_err();
        assert!(matches!(err, RefreshError::Malformed(_)));
        assert!(f.loader.memory().is_empty());
    }

    #[tokio::test]
    async fn undecodable_firestore_document_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/documents/users/U$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": { "name": "Ana" }
            })))
            .mount(&server)
            .await;

        let identity = Identity::new("U", "ana@x.edu").with_display_name("Ana");
        let auth = Arc::new(MemoryAuth::signed_in(identity));
        let remote = Arc::new(FirestoreSource::new(
            reqwest::Client::new(),
            &server.uri(),
            "demo",
            auth.clone(),
        ));
        let store = Arc::new(MemoryStore::new());
        store.seed("user_U", &models::encode(&cached_ana()).unwrap());
        let loader = ProfileLoader::new(auth, remote, store.clone(), ProfileCache::new(), "users");
        loader.memory().insert(cached_ana());

        let err = loader.refresh("U").await.unwrap_err();
        assert!(matches!(err, RefreshError::Malformed(ref m) if m.contains("typed value")));

        assert_eq!(loader.from_memory("U"), Some(cached_ana()));
        assert_eq!(
            models::decode(&store.peek("user_U").unwrap()).unwrap(),
            cached_ana()
        );
    }

    #[tokio::test]
    async fn firestore_server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let auth = Arc::new(MemoryAuth::signed_in(Identity::new("U", "ana@x.edu")));
        let remote = Arc::new(FirestoreSource::new(
            reqwest::Client::new(),
            &server.uri(),
            "demo",
            auth.clone(),
        ));
        let loader = ProfileLoader::new(
            auth,
            remote,
            Arc::new(MemoryStore::new()),
            ProfileCache::new(),
            "users",
        );

        let err = loader.refresh("U").await.unwrap_err();
        assert!(matches!(
            err,
            RefreshError::Unreachable(RemoteError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn earlier_invalidation_does_not_block_refresh() {
        let f = fixture();
        seed_remote(&f, &remote_ana());
        f.loader.invalidate("V").await;
        f.loader.invalidate("U").await;

        assert_eq!(f.loader.refresh("U").await.unwrap(), remote_ana());
        assert_eq!(f.loader.from_memory("U"), Some(remote_ana()));
        assert!(f.store.peek("user_U").is_some());
    }

    #[tokio::test]
    async fn refresh_store_failure_still_updates_memory() {
        let f = fixture();
        seed_remote(&f, &remote_ana());
        f.store.set_failing(true);

        assert_eq!(f.loader.refresh("U").await.unwrap(), remote_ana());
        assert_eq!(f.loader.from_memory("U"), Some(remote_ana()));
    }

    #[tokio::test]
    async fn invalidate_clears_both_tiers() {
        let f = fixture();
        f.loader.memory().insert(cached_ana());
        f.store
            .seed("user_U", &models::encode(&cached_ana()).unwrap());

        f.loader.invalidate("U").await;
        assert!(f.loader.memory().is_empty());
        assert_eq!(f.store.peek("user_U"), None);

        // 登出前立刻再次加载，只能得到占位资料
        let loaded = f.loader.load_immediate("U").await;
        assert!(matches!(loaded, Some(Loaded::Placeholder(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_during_refresh_skips_write_through() {
        let f = fixture_with(
            MemoryDocuments::new().with_latency(Duration::from_millis(50)),
            MemoryStore::new(),
        );
        seed_remote(&f, &remote_ana());

        let (refreshed, ()) = tokio::join!(f.loader.refresh("U"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.loader.invalidate("U").await;
        });

        assert_eq!(refreshed.unwrap(), remote_ana());
        assert!(f.loader.memory().is_empty());
        assert_eq!(f.store.peek("user_U"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_during_persist_is_undone() {
        let f = fixture_with(
            MemoryDocuments::new(),
            MemoryStore::new().with_latency(Duration::from_millis(50)),
        );
        seed_remote(&f, &remote_ana());

        let (refreshed, ()) = tokio::join!(f.loader.refresh("U"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.loader.invalidate("U").await;
        });

        assert!(refreshed.is_ok());
        assert!(f.loader.memory().is_empty());
        assert_eq!(f.store.peek("user_U"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn late_persistent_read_does_not_clobber_refresh() {
        let f = fixture_with(
            MemoryDocuments::new(),
            MemoryStore::new().with_latency(Duration::from_millis(50)),
        );
        f.store
            .seed("user_U", &models::encode(&cached_ana()).unwrap());
        seed_remote(&f, &remote_ana());

        let (loaded, refreshed) =
            tokio::join!(f.loader.load_immediate("U"), f.loader.refresh("U"));

        assert_eq!(refreshed.unwrap(), remote_ana());
        assert_eq!(loaded, Some(Loaded::Cached(remote_ana())));
        assert_eq!(f.loader.from_memory("U"), Some(remote_ana()));
        assert_eq!(
            models::decode(&f.store.peek("user_U").unwrap()).unwrap(),
            remote_ana()
        );
    }
}
