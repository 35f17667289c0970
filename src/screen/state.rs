use crate::cache::Loaded;
use crate::models::{Placeholder, Profile};

/// 资料界面的显示状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScreenState {
    /// 没有已认证身份，界面应交给登录流程
    #[default]
    Unauthenticated,
    LoadingCache,
    CacheHit(Profile),
    Placeholder(Placeholder),
    Refreshed(Profile),
    /// 正在登出，保留登出前的状态以便失败时恢复
    LoggingOut { previous: Box<ScreenState> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    Mounted { authenticated: bool },
    CacheResolved(Option<Loaded>),
    RefreshSucceeded(Profile),
    RefreshFailed,
    IdentityLost,
    LogoutRequested,
    LogoutFailed,
    LoggedOut,
}

impl ScreenState {
    pub fn next(self, event: ScreenEvent) -> ScreenState {
        use ScreenEvent as E;
        use ScreenState as S;

        match (self, event) {
            (_, E::IdentityLost | E::LoggedOut) => S::Unauthenticated,

            (S::LoggingOut { previous }, E::LogoutFailed) => *previous,
            // 登出期间到达的刷新结果留作登出失败时的恢复值
            (S::LoggingOut { .. }, E::RefreshSucceeded(profile)) => S::LoggingOut {
                previous: Box::new(S::Refreshed(profile)),
            },
            (state @ S::LoggingOut { .. }, _) => state,

            (_, E::Mounted { authenticated: false }) => S::Unauthenticated,
            (_, E::Mounted { authenticated: true }) => S::LoadingCache,

            // 缓存结果只在等待缓存时生效，迟到的结果不会覆盖刷新值
            (S::LoadingCache, E::CacheResolved(Some(Loaded::Cached(profile)))) => {
                S::CacheHit(profile)
            }
            (S::LoadingCache, E::CacheResolved(Some(Loaded::Placeholder(placeholder)))) => {
                S::Placeholder(placeholder)
            }
            (S::LoadingCache, E::CacheResolved(None)) => S::Unauthenticated,
            (state, E::CacheResolved(_)) => state,

            (S::Unauthenticated, E::RefreshSucceeded(_)) => S::Unauthenticated,
            (_, E::RefreshSucceeded(profile)) => S::Refreshed(profile),
            (state, E::RefreshFailed) => state,

            (S::Unauthenticated, E::LogoutRequested) => S::Unauthenticated,
            (state, E::LogoutRequested) => S::LoggingOut {
                previous: Box::new(state),
            },
            (state, E::LogoutFailed) => state,
        }
    }

    /// 当前显示的姓名
    pub fn display_name(&self) -> Option<&str> {
        match self {
            ScreenState::CacheHit(profile) | ScreenState::Refreshed(profile) => {
                Some(profile.name.as_str())
            }
            ScreenState::Placeholder(placeholder) => Some(placeholder.name.as_str()),
            ScreenState::LoggingOut { previous } => previous.display_name(),
            ScreenState::Unauthenticated | ScreenState::LoadingCache => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, ScreenState::Unauthenticated)
    }
}
