// 注册与登录
// 单次远程调用，无缓存、无重试

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthProvider;
use crate::cache::ProfileLoader;
use crate::error::AccountError;
use crate::models::{Identity, Profile};
use crate::remote::DocumentSource;

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub full_name: String,
    pub email: String,
    pub course: String,
    pub year: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        let fields = [
            &self.full_name,
            &self.email,
            &self.course,
            &self.year,
            &self.password,
            &self.confirm_password,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AccountError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AccountError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AccountError::MissingFields);
        }
        Ok(())
    }
}

/// 登录结果，资料获取失败不影响登录
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub profile: Option<Profile>,
}

pub struct AccountService {
    auth: Arc<dyn AuthProvider>,
    remote: Arc<dyn DocumentSource>,
    loader: Arc<ProfileLoader>,
    collection: String,
}

impl AccountService {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        remote: Arc<dyn DocumentSource>,
        loader: Arc<ProfileLoader>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            remote,
            loader,
            collection: collection.into(),
        }
    }

    /// 创建账号、设置显示名并写入资料文档，不触碰缓存
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<Profile, AccountError> {
        req.validate()?;

        let identity = self.auth.sign_up(req.email.trim(), &req.password).await?;
        self.auth.update_display_name(&req.full_name).await?;

        let profile = Profile {
            identity_id: identity.uid.clone(),
            name: req.full_name,
            email: identity.email,
            course: req.course,
            year: req.year,
            created_at: Some(Utc::now()),
        };
        self.remote
            .put_document(&self.collection, &profile.identity_id, profile.to_document())
            .await?;

        tracing::info!("Registered {}", profile.identity_id);
        Ok(profile)
    }

    /// 登录后立即刷新资料，填充两级缓存
    pub async fn log_in(&self, req: LoginRequest) -> Result<Session, AccountError> {
        req.validate()?;

        let identity = self.auth.sign_in(req.email.trim(), &req.password).await?;
        let profile = match self.loader.refresh(&identity.uid).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Signed in but could not fetch profile {}: {}", identity.uid, e);
                None
            }
        };

        Ok(Session { identity, profile })
    }
}
