use anyhow::Result;
use async_trait::async_trait;
use canho_core::{ListingFilter, ListingHit};

/// Vector-search collaborator over the listing corpus.
///
/// `search` combines the structured slot filter with a free-text query used
/// for semantic ranking and returns hits ordered by relevance.
/// `find_by_unit_code` is the exact-match lookup mode used for detail views.
#[async_trait]
pub trait ListingSearch: Send + Sync {
    async fn search(
        &self,
        filter: &ListingFilter,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ListingHit>>;

    async fn find_by_unit_code(&self, unit_code: &str) -> Result<Option<ListingHit>>;
}
