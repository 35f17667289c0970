// 缓存模块
// 内存层 + 本地持久层，远程文档源为权威来源

pub mod keys;
pub mod memory;
pub mod operations;

// 重新导出常用类型
pub use memory::ProfileCache;
pub use operations::profile::{Loaded, ProfileLoader};
