use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::Profile;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Profile>,
    /// 每次删除都推进，只增不减
    generation: u64,
}

/// 内存层：identity_id -> Profile
///
/// 由会话上下文持有并注入到加载器，克隆得到的是同一份缓存。
/// 锁只在同步代码中短暂持有，不会跨越 await。
#[derive(Debug, Clone, Default)]
pub struct ProfileCache {
    inner: Arc<Mutex<Inner>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity_id: &str) -> Option<Profile> {
        self.lock().entries.get(identity_id).cloned()
    }

    pub fn insert(&self, profile: Profile) {
        self.lock()
            .entries
            .insert(profile.identity_id.clone(), profile);
    }

    /// 仅在没有条目时写入，返回最终留在缓存中的记录
    pub fn promote(&self, profile: Profile) -> Profile {
        self.lock()
            .entries
            .entry(profile.identity_id.clone())
            .or_insert(profile)
            .clone()
    }

    /// 删除条目并推进缓存代数，进行中的刷新据此放弃回写
    ///
    /// 代数是全局的，删除任何身份都会让所有进行中的回写放弃。
    pub fn remove(&self, identity_id: &str) -> Option<Profile> {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.entries.remove(identity_id)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
