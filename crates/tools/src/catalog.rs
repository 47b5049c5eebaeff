//! Product catalog: the documents the search tool ranks.
//!
//! Loaded from a JSON array of products. Each product's searchable text is
//! embedded once, on the first search, with the injected `Embedder`.

use cartwise_core::error::MemoryError;
use cartwise_core::memory::Embedder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub brand: String,

    /// e.g. "Casual Shoes", "Tshirts"
    #[serde(default)]
    pub article_type: String,

    #[serde(default)]
    pub base_colour: String,

    #[serde(default)]
    pub gender: String,

    #[serde(default)]
    pub usage: String,

    #[serde(default)]
    pub price: f64,

    #[serde(default)]
    pub description: String,
}

impl Product {
    /// The text embedded for similarity search.
    pub fn search_text(&self) -> String {
        [
            self.name.as_str(),
            self.brand.as_str(),
            self.article_type.as_str(),
            self.base_colour.as_str(),
            self.gender.as_str(),
            self.usage.as_str(),
            self.description.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Catalog errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse catalog at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

pub struct ProductCatalog {
    products: Vec<Product>,
    vectors: OnceCell<Vec<Vec<f32>>>,
}

impl ProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            vectors: OnceCell::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load a catalog from a JSON array file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let products: Vec<Product> =
            serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), count = products.len(), "Product catalog loaded");
        Ok(Self::new(products))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Product vectors, embedding the catalog on first use.
    pub async fn vectors(&self, embedder: &dyn Embedder) -> Result<&[Vec<f32>], MemoryError> {
        let vectors = self
            .vectors
            .get_or_try_init(|| async {
                let mut out = Vec::with_capacity(self.products.len());
                for product in &self.products {
                    out.push(embedder.embed(&product.search_text()).await?);
                }
                debug!(count = out.len(), "Catalog embedded");
                Ok::<_, MemoryError>(out)
            })
            .await?;
        Ok(vectors.as_slice())
    }
}

#[cfg(test)]
pub(crate) fn sample_products() -> Vec<Product> {
    let product = |id: &str, name: &str, article: &str, colour: &str, price: f64| Product {
        id: id.into(),
        name: name.into(),
        brand: "Acme".into(),
        article_type: article.into(),
        base_colour: colour.into(),
        gender: "Men".into(),
        usage: "Casual".into(),
        price,
        description: format!("{colour} {article}"),
    };
    vec![
        product("1", "Green Shoe A", "Casual Shoes", "Green", 59.0),
        product("2", "Black Leather Wallet", "Wallets", "Black", 25.0),
        product("3", "Green Shoe B", "Casual Shoes", "Green", 79.0),
        product("4", "Blue Denim Jacket", "Jackets", "Blue", 120.0),
    ]
}
