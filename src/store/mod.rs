// 本地持久键值存储
// 值是不透明字符串，资料的序列化由调用方负责

mod file;
mod memory;
mod redis_store;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// 删除不存在的键不算错误
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
