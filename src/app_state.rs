//! Shared application state for the CLI shell
//!
//! Owns the API client and the cached category tree. The tree is fetched
//! lazily on first use and reused until a category mutation invalidates it.
//! A refresh builds a complete new index and swaps it in under the write
//! lock, so readers holding the old `Arc` never see a half-built tree.

use std::sync::{Arc, RwLock};

use crate::api::{ApiClient, ApiError, CategoryUpdate};
use crate::category_tree::CategoryTree;

pub struct AppState {
    client: ApiClient,
    categories: RwLock<Option<Arc<CategoryTree>>>,
}

impl AppState {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            categories: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Cached tree, fetching it on first use
    pub async fn categories(&self) -> Result<Arc<CategoryTree>, ApiError> {
        if let Some(tree) = self.cached() {
            return Ok(tree);
        }
        self.refresh_categories().await
    }

    /// Always re-fetch, replacing whatever is cached
    pub async fn refresh_categories(&self) -> Result<Arc<CategoryTree>, ApiError> {
        let roots = self.client.categories_tree().await?;
        let tree = Arc::new(CategoryTree::build(roots));
        if let Ok(mut guard) = self.categories.write() {
            *guard = Some(tree.clone());
        }
        Ok(tree)
    }

    /// Drop the cache; the next read re-fetches
    pub fn invalidate_categories(&self) {
        if let Ok(mut guard) = self.categories.write() {
            *guard = None;
        }
    }

    fn cached(&self) -> Option<Arc<CategoryTree>> {
        self.categories.read().ok().and_then(|guard| guard.clone())
    }

    // Category mutations go through here so a successful call always
    // invalidates the cached tree. A failed call leaves it untouched.

    pub async fn add_category(
        &self,
        name: &str,
        parent_id: Option<i64>,
        description: Option<&str>,
    ) -> Result<i64, ApiError> {
        let id = self.client.create_category(name, parent_id, description).await?;
        self.invalidate_categories();
        Ok(id)
    }

    pub async fn update_category(&self, id: i64, update: &CategoryUpdate) -> Result<(), ApiError> {
        self.client.update_category(id, update).await?;
        self.invalidate_categories();
        Ok(())
    }

    pub async fn delete_category(&self, id: i64) -> Result<String, ApiError> {
        let message = self.client.delete_category(id).await?;
        self.invalidate_categories();
        Ok(message)
    }
}
