use anyhow::Result;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::hash::Hash;

use super::Repository;

/// In-memory repository backed by a [`DashMap`].
#[derive(Debug)]
pub struct MemoryRepository<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> MemoryRepository<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for MemoryRepository<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Repository<K, V> for MemoryRepository<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn find<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>>> {
        async move { Ok(self.entries.get(key).map(|entry| entry.value().clone())) }.boxed()
    }

    fn save<'a>(&'a self, key: K, value: V) -> BoxFuture<'a, Result<()>> {
        async move {
            self.entries.insert(key, value);
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let repo: MemoryRepository<String, u32> = MemoryRepository::new();
        assert_eq!(repo.find(&"a".to_string()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let repo = MemoryRepository::new();
        repo.save("a".to_string(), 1).await.unwrap();
        repo.save("a".to_string(), 2).await.unwrap();

        assert_eq!(repo.find(&"a".to_string()).await.unwrap(), Some(2));
        assert_eq!(repo.len(), 1);
    }
}
