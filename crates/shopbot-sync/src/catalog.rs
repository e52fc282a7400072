//! Product catalog sources
//!
//! The catalog service owns product data; these sources only read it.

use async_trait::async_trait;
use reqwest::Client;
use shopbot_core::{CatalogConfig, ProductRecord, Result, ShopbotError};
use std::time::Duration;

/// Somewhere product records can be listed from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every product in the catalog
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Catalog service reachable over HTTP (`GET url` returning a JSON array)
pub struct HttpCatalog {
    client: Client,
    url: String,
}

impl HttpCatalog {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShopbotError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ShopbotError::CatalogError(format!("Catalog request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ShopbotError::CatalogError(format!(
                "Catalog service returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<ProductRecord>>()
            .await
            .map_err(|e| ShopbotError::CatalogError(format!("Invalid catalog response: {e}")))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Fixed in-memory product list
pub struct StaticCatalog {
    products: Vec<ProductRecord>,
}

impl StaticCatalog {
    pub fn new(products: Vec<ProductRecord>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>> {
        Ok(self.products.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} products)", self.products.len())
    }
}

/// Built-in demo catalog used when the catalog service is unavailable
pub fn sample_catalog() -> Vec<ProductRecord> {
    vec![
        ProductRecord::new(1u64, "iPhone 15 Pro")
            .with_description(
                "Smartphone Apple avec puce A17 Pro, appareil photo 48MP, écran Super Retina XDR",
            )
            .with_category("Smartphones")
            .with_price(1229.0)
            .with_stock(15)
            .with_image("/images/iphone15pro.jpg"),
        ProductRecord::new(2u64, "Samsung Galaxy S24 Ultra")
            .with_description(
                "Smartphone premium Samsung avec S Pen, écran AMOLED 6.8\", appareil photo 200MP",
            )
            .with_category("Smartphones")
            .with_price(1399.0)
            .with_stock(8)
            .with_image("/images/galaxys24.jpg"),
        ProductRecord::new(3u64, "MacBook Pro M3")
            .with_description(
                "Ordinateur portable Apple avec puce M3, 16GB RAM, écran Liquid Retina XDR 14\"",
            )
            .with_category("Ordinateurs")
            .with_price(2299.0)
            .with_stock(5)
            .with_image("/images/macbookpro.jpg"),
        ProductRecord::new(4u64, "Dell XPS 15")
            .with_description(
                "PC portable Dell avec Intel i9, 32GB RAM, NVIDIA RTX 4060, écran 4K OLED",
            )
            .with_category("Ordinateurs")
            .with_price(2499.0)
            .with_stock(3)
            .with_image("/images/dellxps15.jpg"),
        ProductRecord::new(5u64, "AirPods Pro 2")
            .with_description(
                "Écouteurs sans fil Apple avec réduction de bruit active, audio spatial",
            )
            .with_category("Audio")
            .with_price(279.0)
            .with_stock(25)
            .with_image("/images/airpodspro.jpg"),
        ProductRecord::new(6u64, "Sony WH-1000XM5")
            .with_description("Casque audio sans fil premium avec réduction de bruit exceptionnelle")
            .with_category("Audio")
            .with_price(399.0)
            .with_stock(12)
            .with_image("/images/sonywh1000xm5.jpg"),
        ProductRecord::new(7u64, "iPad Air M2")
            .with_description(
                "Tablette Apple avec puce M2, écran Liquid Retina 11\", compatible Apple Pencil",
            )
            .with_category("Tablettes")
            .with_price(699.0)
            .with_stock(10)
            .with_image("/images/ipadair.jpg"),
        ProductRecord::new(8u64, "Samsung Tab S9")
            .with_description("Tablette Android premium avec S Pen inclus, écran AMOLED 11\"")
            .with_category("Tablettes")
            .with_price(649.0)
            .with_stock(7)
            .with_image("/images/tabs9.jpg"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sample_catalog_is_valid() {
        let products = sample_catalog();
        assert_eq!(products.len(), 8);
        assert!(products.iter().all(|p| p.validate().is_ok()));

        let ids: HashSet<_> = products.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_catalog_json_shape() {
        let products: Vec<ProductRecord> = serde_json::from_str(
            r#"[{"id": 10, "name": "Red Shoe", "price": 50, "imageUrl": "/img/shoe.png"}]"#,
        )
        .unwrap();

        assert_eq!(products[0].price, Some(50.0));
        assert_eq!(products[0].image.as_deref(), Some("/img/shoe.png"));
    }

    #[tokio::test]
    async fn test_unreachable_catalog_is_catalog_error() {
        let catalog =
            HttpCatalog::new("http://127.0.0.1:9/api/products", Duration::from_secs(2)).unwrap();
        let err = catalog.fetch_all().await.unwrap_err();
        assert!(matches!(err, ShopbotError::CatalogError(_)));
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let catalog = StaticCatalog::new(sample_catalog());
        assert_eq!(catalog.fetch_all().await.unwrap().len(), 8);
    }
}
