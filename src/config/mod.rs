use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// 本地持久层后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Redis(String),
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub firebase_api_key: String,
    pub firebase_project_id: String,
    pub profile_collection: String,
    pub store: StoreBackend,
    pub identity_toolkit_url: String,
    pub firestore_url: String,
}

/// `PORTAL_STORE` 的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKind {
    Redis,
    File,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreKind::Redis),
            "file" => Ok(StoreKind::File),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置，缺省值与 `from_env` 一致
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, env::VarError> {
        let required = |key: &str| lookup(key).ok_or(env::VarError::NotPresent);

        let kind = lookup("PORTAL_STORE")
            .map(|raw| {
                raw.parse::<StoreKind>().unwrap_or_else(|e| {
                    tracing::warn!("{}, falling back to file store", e);
                    StoreKind::File
                })
            })
            .unwrap_or(StoreKind::File);

        let store = match kind {
            StoreKind::Redis => StoreBackend::Redis(required("REDIS_URL")?),
            StoreKind::File => StoreBackend::File(
                lookup("CACHE_DIR")
                    .unwrap_or_else(|| ".portal-cache".into())
                    .into(),
            ),
            StoreKind::Memory => StoreBackend::Memory,
        };

        Ok(Config {
            firebase_api_key: required("FIREBASE_API_KEY")?,
            firebase_project_id: required("FIREBASE_PROJECT_ID")?,
            profile_collection: lookup("PROFILE_COLLECTION").unwrap_or_else(|| "users".into()),
            store,
            identity_toolkit_url: lookup("IDENTITY_TOOLKIT_URL")
                .unwrap_or_else(|| "https://identitytoolkit.googleapis.com".into()),
            firestore_url: lookup("FIRESTORE_URL")
                .unwrap_or_else(|| "https://firestore.googleapis.com".into()),
        })
    }
}
