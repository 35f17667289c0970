use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use super::AuthProvider;
use crate::error::AuthError;
use crate::models::Identity;

struct Account {
    password: String,
    identity: Identity,
}

/// 进程内认证服务
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    identity: watch::Sender<Option<Identity>>,
    reject_sign_out: AtomicBool,
    next_uid: AtomicUsize,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            identity: watch::Sender::new(None),
            reject_sign_out: AtomicBool::new(false),
            next_uid: AtomicUsize::new(1),
        }
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定身份直接建立会话
    pub fn signed_in(identity: Identity) -> Self {
        let auth = Self::default();
        auth.identity.send_replace(Some(identity));
        auth
    }

    pub fn with_account(self, password: &str, identity: Identity) -> Self {
        self.accounts().insert(
            identity.email.clone(),
            Account {
                password: password.to_string(),
                identity,
            },
        );
        self
    }

    pub fn set_reject_sign_out(&self, reject: bool) {
        self.reject_sign_out.store(reject, Ordering::SeqCst);
    }

    /// 模拟会话在外部失效（例如令牌被吊销）
    pub fn expire_session(&self) {
        self.identity.send_replace(None);
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let accounts = self.accounts();
            let account = accounts
                .get(email)
                .ok_or_else(|| AuthError::Rejected("EMAIL_NOT_FOUND".into()))?;
            if account.password != password {
                return Err(AuthError::Rejected("INVALID_PASSWORD".into()));
            }
            account.identity.clone()
        };
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let mut accounts = self.accounts();
            if accounts.contains_key(email) {
                return Err(AuthError::Rejected("EMAIL_EXISTS".into()));
            }
            let uid = format!("uid-{}", self.next_uid.fetch_add(1, Ordering::SeqCst));
            let identity = Identity::new(uid, email);
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError> {
        let mut identity = self.current_identity().ok_or(AuthError::NotSignedIn)?;
        identity.display_name = Some(display_name.to_string());
        if let Some(account) = self.accounts().get_mut(&identity.email) {
            account.identity = identity.clone();
        }
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.reject_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected("sign-out rejected".into()));
        }
        self.identity.send_replace(None);
        Ok(())
    }
}
