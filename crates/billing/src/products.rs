//! Product catalog
//!
//! Maps purchasable SKUs to what they grant. Prices and credit counts are
//! fixed in code; the provider-side product ids they map to come from the
//! `PAYMENT_PRODUCT_IDS` env var as a JSON object of sku -> provider id.

use std::collections::HashMap;

use serde::Serialize;

/// What a product grants when purchased
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProductGrant {
    /// Fixed number of processing credits
    Credits { amount: i64 },
    /// Unlimited processing for a fixed window
    Unlimited { days: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub grant: ProductGrant,
    pub price_cents: i64,
    /// Provider-side product id; a SKU without one cannot be checked out
    #[serde(skip)]
    pub provider_product_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProductCatalog {
    products: HashMap<String, Product>,
}

impl ProductCatalog {
    /// The built-in catalog with no provider product ids attached
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.insert(Product {
            sku: "starter_50".to_string(),
            name: "Starter Pack (50 Credits)".to_string(),
            grant: ProductGrant::Credits { amount: 50 },
            price_cents: 299,
            provider_product_id: None,
        });
        catalog.insert(Product {
            sku: "pro_200".to_string(),
            name: "Pro Pack (200 Credits)".to_string(),
            grant: ProductGrant::Credits { amount: 200 },
            price_cents: 699,
            provider_product_id: None,
        });
        catalog.insert(Product {
            sku: "unlimited_monthly".to_string(),
            name: "Unlimited Monthly".to_string(),
            grant: ProductGrant::Unlimited { days: 30 },
            price_cents: 499,
            provider_product_id: None,
        });
        catalog
    }

    /// Built-in catalog plus provider product ids from `PAYMENT_PRODUCT_IDS`
    pub fn from_env() -> Self {
        let raw = std::env::var("PAYMENT_PRODUCT_IDS").unwrap_or_default();
        let mut catalog = Self::builtin();

        if raw.is_empty() {
            return catalog;
        }

        match serde_json::from_str::<HashMap<String, String>>(&raw) {
            Ok(ids) => {
                for (sku, provider_id) in ids {
                    match catalog.products.get_mut(&sku) {
                        Some(product) if !provider_id.is_empty() => {
                            product.provider_product_id = Some(provider_id);
                        }
                        Some(_) => {}
                        None => {
                            tracing::warn!(
                                sku = %sku,
                                "PAYMENT_PRODUCT_IDS references a sku not in the catalog"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to parse PAYMENT_PRODUCT_IDS - checkout will be unavailable"
                );
            }
        }

        catalog
    }

    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.sku.clone(), product);
    }

    pub fn get(&self, sku: &str) -> Option<&Product> {
        self.products.get(sku)
    }

    pub fn skus(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }
}
