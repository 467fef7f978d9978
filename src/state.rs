use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A converted TCX document waiting to be downloaded.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct AppState {
    documents: Arc<DashMap<String, CachedDocument>>,
}

struct CachedDocument {
    document: StoredDocument,
    inserted_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: String, document: StoredDocument) {
        self.documents.insert(
            id,
            CachedDocument {
                document,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<StoredDocument> {
        self.documents.get(id).map(|entry| entry.document.clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn evict_expired(&self, ttl: Duration) {
        let now = Instant::now();
        self.documents
            .retain(|_, cached| now.duration_since(cached.inserted_at) < ttl);
        tracing::info!(documents = self.documents.len(), "download store eviction complete");
    }
}
