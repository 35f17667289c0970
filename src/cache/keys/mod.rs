/// 缓存键模块

// 用户缓存键模块
pub mod user_keys;

pub use user_keys::profile_key;
