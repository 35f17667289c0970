use std::sync::Arc;

use account::AccountService;
use auth::{AuthProvider, IdentityToolkitAuth};
use cache::{ProfileCache, ProfileLoader};
use config::{Config, StoreBackend};
use error::StoreError;
use remote::{DocumentSource, FirestoreSource};
use screen::ProfileScreen;
use store::{FileStore, KeyValueStore, MemoryStore, RedisStore};

pub mod account;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod screen;
pub mod store;

/// 应用级会话上下文，持有内存缓存并注入各组件
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub remote: Arc<dyn DocumentSource>,
    pub store: Arc<dyn KeyValueStore>,
    pub profiles: ProfileCache,
    pub collection: String,
    loader: Arc<ProfileLoader>,
}

impl AppState {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        remote: Arc<dyn DocumentSource>,
        store: Arc<dyn KeyValueStore>,
        collection: &str,
    ) -> Self {
        let profiles = ProfileCache::new();
        let loader = Arc::new(ProfileLoader::new(
            auth.clone(),
            remote.clone(),
            store.clone(),
            profiles.clone(),
            collection,
        ));
        Self {
            auth,
            remote,
            store,
            profiles,
            collection: collection.to_string(),
            loader,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let http = reqwest::Client::new();

        let auth: Arc<dyn AuthProvider> = Arc::new(IdentityToolkitAuth::new(
            http.clone(),
            &config.identity_toolkit_url,
            &config.firebase_api_key,
        ));
        let remote: Arc<dyn DocumentSource> = Arc::new(FirestoreSource::new(
            http,
            &config.firestore_url,
            &config.firebase_project_id,
            auth.clone(),
        ));
        let store: Arc<dyn KeyValueStore> = match &config.store {
            StoreBackend::Redis(url) => Arc::new(RedisStore::open(url)?),
            StoreBackend::File(dir) => Arc::new(FileStore::new(dir.clone())),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };

        tracing::info!("Using {:?} for the persistent profile cache", config.store);
        Ok(Self::new(auth, remote, store, &config.profile_collection))
    }

    pub fn loader(&self) -> Arc<ProfileLoader> {
        self.loader.clone()
    }

    pub fn profile_screen(&self) -> ProfileScreen {
        ProfileScreen::new(self.loader(), self.auth.clone())
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(
            self.auth.clone(),
            self.remote.clone(),
            self.loader(),
            self.collection.clone(),
        )
    }
}
