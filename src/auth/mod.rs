// 认证服务
// 当前身份同步可读，身份变化通过 watch 通道广播

mod identity_toolkit;
mod memory;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AuthError;
use crate::models::Identity;

pub use identity_toolkit::IdentityToolkitAuth;
pub use memory::MemoryAuth;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 当前身份，驻留内存，不做 I/O
    fn current_identity(&self) -> Option<Identity>;

    /// 订阅登录/登出变化，丢弃接收端即取消订阅
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError>;

    /// 使会话令牌失效
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// 访问远程文档源时使用的 bearer 令牌
    fn access_token(&self) -> Option<String> {
        None
    }
}
