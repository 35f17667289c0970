// 远程文档源
// 文档以普通 JSON 对象表示，不存在时返回 Ok(None)

mod firestore;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RemoteError;

pub use firestore::FirestoreSource;
pub use memory::MemoryDocuments;

pub type Document = Map<String, Value>;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError>;

    /// 创建或整体覆盖文档
    async fn put_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<(), RemoteError>;
}
