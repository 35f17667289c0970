/// 缓存操作

// 用户资料的分层读取、刷新与失效
pub mod profile;

pub use profile::{Loaded, ProfileLoader};
