use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Document, DocumentSource};
use crate::error::RemoteError;

/// 进程内文档源，支持模拟延迟和网络不可达
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    documents: Mutex<HashMap<(String, String), Document>>,
    latency: Duration,
    unreachable: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn insert(&self, collection: &str, id: &str, document: Document) {
        self.lock()
            .insert((collection.to_string(), id.to_string()), document);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.lock()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Document>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn io(&self) -> Result<(), RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentSource for MemoryDocuments {
    async fn fetch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.io().await?;
        Ok(self.get(collection, id))
    }

    async fn put_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<(), RemoteError> {
        self.io().await?;
        self.insert(collection, id, document);
        Ok(())
    }
}
