//! Product catalog search backing the `find_product` capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A product summary as exposed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: u64,
}

/// Search seam over the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Case-insensitive substring match against name OR description.
    /// Possibly-empty result, never an error.
    async fn find_products(&self, query: &str) -> Vec<ProductSummary>;
}

/// Catalog backed by an in-memory list.
pub struct InMemoryCatalog {
    products: Vec<ProductSummary>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<ProductSummary>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn find_products(&self, query: &str) -> Vec<ProductSummary> {
        let needle = query.to_lowercase();
        self.products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            ProductSummary {
                id: "p1".into(),
                name: "Vintage Camera".into(),
                description: "A well-kept film camera from the 70s".into(),
                price_cents: 12_000,
            },
            ProductSummary {
                id: "p2".into(),
                name: "Desk Lamp".into(),
                description: "Adjustable LED lamp".into(),
                price_cents: 3_500,
            },
        ])
    }

    #[tokio::test]
    async fn matches_name_substring() {
        let hits = catalog().find_products("camera").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Vintage Camera");
    }

    #[tokio::test]
    async fn matches_description_substring() {
        let hits = catalog().find_products("LED").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p2");
    }

    #[tokio::test]
    async fn no_match_is_empty_vec() {
        assert!(catalog().find_products("bicycle").await.is_empty());
    }

    #[tokio::test]
    async fn query_case_is_ignored() {
        assert_eq!(catalog().find_products("VINTAGE").await.len(), 1);
    }
}
