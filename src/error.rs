use thiserror::Error;

/// 持久层（本地键值存储）错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 远程文档源错误。文档不存在不算错误，由 `Ok(None)` 表示
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed document: {0}")]
    Decode(String),

    #[error("remote unreachable")]
    Unreachable,
}

/// 认证服务错误
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 认证服务拒绝了请求，例如 `EMAIL_NOT_FOUND`、`INVALID_PASSWORD`
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not signed in")]
    NotSignedIn,
}

/// 后台刷新资料的结果类型
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("profile {0} not found")]
    NotFound(String),

    #[error("remote unreachable: {0}")]
    Unreachable(RemoteError),

    #[error("profile document is malformed: {0}")]
    Malformed(String),
}

impl From<RemoteError> for RefreshError {
    fn from(err: RemoteError) -> Self {
        match err {
            // 文档取到了但无法解码，不是连通性问题
            RemoteError::Decode(message) => RefreshError::Malformed(message),
            other => RefreshError::Unreachable(other),
        }
    }
}

impl From<serde_json::Error> for RefreshError {
    fn from(err: serde_json::Error) -> Self {
        RefreshError::Malformed(err.to_string())
    }
}

/// 注册与登录流程错误
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Please fill in all fields.")]
    MissingFields,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
