//! C12 HistoricalRetriever (§4.12): thin wrapper selecting the `k` most
//! similar active stories to a candidate embedding, within an optional
//! recency window. The actual ANN query lives in `PersistenceStore` since it
//! is answered by Postgres/pgvector rather than an in-memory index.

use storyline_domains::{PersistenceStore, SimilarStory};

pub struct HistoricalRetriever<'a> {
    store: &'a PersistenceStore,
}

impl<'a> HistoricalRetriever<'a> {
    pub fn new(store: &'a PersistenceStore) -> Self {
        Self { store }
    }

    pub async fn retrieve(
        &self,
        vector: &[f32],
        k: i64,
        window_days: Option<i64>,
    ) -> anyhow::Result<Vec<SimilarStory>> {
        self.store.fetch_similar_stories(vector, k, window_days).await
    }
}
