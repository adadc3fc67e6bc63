use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};

use crate::models::{Category, Product};

#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn product(&self, id: u64) -> Option<Product>;
}

#[async_trait]
pub trait CategoryLookup: Send + Sync {
    /// Names for the given ids, in the given order. Unknown ids are skipped.
    async fn category_names(&self, ids: &[u64]) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<u64, Product>>,
    categories: RwLock<HashMap<u64, Category>>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSeed {
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    categories: Vec<Category>,
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    /// Loads a `{"products": [...], "categories": [...]}` document.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let seed: CatalogSeed = serde_json::from_str(raw).context("invalid catalog seed")?;
        let catalog = Self::new();
        for p in seed.products { catalog.upsert_product(p); }
        for c in seed.categories { catalog.upsert_category(c); }
        Ok(catalog)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading catalog seed {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn upsert_product(&self, product: Product) {
        self.products.write().insert(product.id, product);
    }

    pub fn upsert_category(&self, category: Category) {
        self.categories.write().insert(category.id, category);
    }

    pub fn get_product(&self, id: u64) -> Option<Product> {
        self.products.read().get(&id).cloned()
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.products.read().len(), self.categories.read().len())
    }
}

#[async_trait]
impl ProductLookup for InMemoryCatalog {
    async fn product(&self, id: u64) -> Option<Product> { self.get_product(id) }
}

#[async_trait]
impl CategoryLookup for InMemoryCatalog {
    async fn category_names(&self, ids: &[u64]) -> Vec<String> {
        let guard = self.categories.read();
        ids.iter().filter_map(|id| guard.get(id).map(|c| c.name.clone())).collect()
    }
}
