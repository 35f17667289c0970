use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::watch;

use super::AuthProvider;
use crate::error::AuthError;
use crate::models::Identity;

/// Firebase Identity Toolkit REST 客户端
pub struct IdentityToolkitAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    identity: watch::Sender<Option<Identity>>,
    id_token: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityToolkitAuth {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            identity: watch::Sender::new(None),
            id_token: Mutex::new(None),
        }
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T, AuthError> {
        let url = format!("{}/v1/accounts:{}", self.base_url, endpoint);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message,
                Err(_) => status.to_string(),
            };
            tracing::warn!("Identity toolkit {} rejected: {}", endpoint, message);
            return Err(AuthError::Rejected(message));
        }

        Ok(response.json().await?)
    }

    /// 记录新会话并通知订阅者
    fn establish(&self, account: AccountResponse, fallback_email: &str) -> Identity {
        let identity = Identity {
            uid: account.local_id,
            email: account.email.unwrap_or_else(|| fallback_email.to_string()),
            display_name: account.display_name.filter(|name| !name.is_empty()),
        };
        if let Some(token) = account.id_token {
            *self.token_slot() = Some(token);
        }
        self.identity.send_replace(Some(identity.clone()));
        identity
    }

    fn token_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.id_token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitAuth {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let account: AccountResponse = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let identity = self.establish(account, email);
        tracing::info!("Signed in as {}", identity.uid);
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let account: AccountResponse = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let identity = self.establish(account, email);
        tracing::info!("Created account {}", identity.uid);
        Ok(identity)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError> {
        let token = self.access_token().ok_or(AuthError::NotSignedIn)?;
        let current = self.current_identity().ok_or(AuthError::NotSignedIn)?;

        let account: AccountResponse = self
            .call(
                "update",
                json!({ "idToken": token, "displayName": display_name, "returnSecureToken": false }),
            )
            .await?;

        let identity = Identity {
            uid: current.uid,
            email: account.email.unwrap_or(current.email),
            display_name: Some(display_name.to_string()),
        };
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.token_slot() = None;
        if let Some(previous) = self.identity.send_replace(None) {
            tracing::info!("Signed out {}", previous.uid);
        }
        Ok(())
    }

    fn access_token(&self) -> Option<String> {
        self.token_slot().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sign_in_establishes_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({ "email": "ana@x.edu" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "u1",
                "email": "ana@x.edu",
                "displayName": "Ana",
                "idToken": "token-1",
                "refreshToken": "refresh-1",
                "expiresIn": "3600"
            })))
            .mount(&server)
            .await;

        let auth = IdentityToolkitAuth::new(reqwest::Client::new(), &server.uri(), "test-key");
        let mut changes = auth.subscribe();

        let identity = auth.sign_in("ana@x.edu", "secret").await.unwrap();
        assert_eq!(identity, Identity::new("u1", "ana@x.edu").with_display_name("Ana"));
        assert_eq!(auth.current_identity(), Some(identity.clone()));
        assert_eq!(auth.access_token().as_deref(), Some("token-1"));
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), Some(identity));

        auth.sign_out().await.unwrap();
        assert_eq!(auth.current_identity(), None);
        assert_eq!(auth.access_token(), None);
        assert_eq!(*changes.borrow_and_update(), None);
    }

    #[tokio::test]
    async fn rejected_credentials_surface_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "INVALID_PASSWORD" }
            })))
            .mount(&server)
            .await;

        let auth = IdentityToolkitAuth::new(reqwest::Client::new(), &server.uri(), "test-key");
        let err = auth.sign_in("ana@x.edu", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref m) if m == "INVALID_PASSWORD"));
        assert_eq!(auth.current_identity(), None);
    }

    #[tokio::test]
    async fn update_display_name_requires_session() {
        let server = MockServer::start().await;
        let auth = IdentityToolkitAuth::new(reqwest::Client::new(), &server.uri(), "test-key");
        let err = auth.update_display_name("Ana").await.unwrap_err();
        assert!(matches!(err, AuthError::NotSignedIn));
    }

    #[tokio::test]
    async fn sign_up_then_set_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "u9",
                "email": "bo@x.edu",
                "idToken": "token-9"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:update"))
            .and(body_partial_json(json!({ "idToken": "token-9", "displayName": "Bo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "u9",
                "email": "bo@x.edu",
                "displayName": "Bo"
            })))
            .mount(&server)
            .await;

        let auth = IdentityToolkitAuth::new(reqwest::Client::new(), &server.uri(), "test-key");
        let created = auth.sign_up("bo@x.edu", "secret").await.unwrap();
        assert_eq!(created.display_name, None);

        let named = auth.update_display_name("Bo").await.unwrap();
        assert_eq!(named.display_name.as_deref(), Some("Bo"));
        assert_eq!(auth.current_identity(), Some(named));
    }
}
