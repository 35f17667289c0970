use std::sync::Arc;

use tokio::sync::watch;

use super::{ScreenEvent, ScreenState};
use crate::auth::AuthProvider;
use crate::cache::ProfileLoader;
use crate::error::{AuthError, RefreshError};
use crate::models::Profile;

/// 首页与资料页共用的控制器
///
/// 界面通过 `subscribe` 观察状态；所有更新都经过 `ScreenState::next`。
pub struct ProfileScreen {
    loader: Arc<ProfileLoader>,
    auth: Arc<dyn AuthProvider>,
    state: watch::Sender<ScreenState>,
}

impl ProfileScreen {
    pub fn new(loader: Arc<ProfileLoader>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            loader,
            auth,
            state: watch::Sender::new(ScreenState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ScreenState {
        self.state.borrow().clone()
    }

    fn apply(&self, event: ScreenEvent) {
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = current.next(event);
        });
    }

    /// 挂载：缓存读取与后台刷新在同一任务内并发执行
    ///
    /// 返回刷新结果供调用方决定是否提示，未登录时返回 `None`。
    pub async fn mount(&self) -> Option<Result<Profile, RefreshError>> {
        let Some(identity) = self.auth.current_identity() else {
            self.apply(ScreenEvent::Mounted {
                authenticated: false,
            });
            return None;
        };
        self.apply(ScreenEvent::Mounted {
            authenticated: true,
        });

        let identity_id = identity.uid.as_str();
        let cached = async {
            let loaded = self.loader.load_immediate(identity_id).await;
            self.apply(ScreenEvent::CacheResolved(loaded));
        };
        let refreshed = async {
            let result = self.loader.refresh(identity_id).await;
            match &result {
                Ok(profile) => self.apply(ScreenEvent::RefreshSucceeded(profile.clone())),
                Err(e) => {
                    tracing::warn!("Error fetching profile {}: {}", identity_id, e);
                    self.apply(ScreenEvent::RefreshFailed);
                }
            }
            result
        };

        let ((), result) = tokio::join!(cached, refreshed);
        Some(result)
    }

    /// 监听身份变化，身份消失后转入未认证状态并返回
    pub async fn watch_identity(&self) {
        let mut changes = self.auth.subscribe();
        loop {
            if changes.borrow_and_update().is_none() {
                tracing::info!("Identity lost, handing over to login");
                self.apply(ScreenEvent::IdentityLost);
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// 登出：先清除缓存，再结束会话
    ///
    /// 会话结束失败时返回错误供界面弹窗，已完成的缓存清除不回滚。
    pub async fn logout(&self) -> Result<(), AuthError> {
        let identity = self.auth.current_identity();
        self.apply(ScreenEvent::LogoutRequested);

        if let Some(identity) = &identity {
            self.loader.invalidate(&identity.uid).await;
        }

        match self.auth.sign_out().await {
            Ok(()) => {
                self.apply(ScreenEvent::LoggedOut);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Logout failed: {}", e);
                self.apply(ScreenEvent::LogoutFailed);
                Err(e)
            }
        }
    }
}
