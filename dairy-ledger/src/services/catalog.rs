//! Read-only product catalog.

use crate::models::Product;
use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    ProductNotFound(u64),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::NotFound(anyhow::Error::new(err))
    }
}

pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(mut products: Vec<Product>) -> Self {
        products.sort_by_key(|p| p.id);
        products.dedup_by_key(|p| p.id);
        Self { products }
    }

    /// Every product, by id.
    pub fn list(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: u64) -> Result<&Product, CatalogError> {
        self.products
            .binary_search_by_key(&id, |p| p.id)
            .map(|index| &self.products[index])
            .map_err(|_| CatalogError::ProductNotFound(id))
    }
}

impl Default for ProductCatalog {
    /// The farm's standard range.
    fn default() -> Self {
        let product = |id: u64, name: &str, cents: i64, description: &str| Product {
            id,
            name: name.to_string(),
            price: Decimal::new(cents, 2),
            description: description.to_string(),
        };

        Self::new(vec![
            product(1, "Fresh Milk", 250, "Pure, pasteurized cow's milk."),
            product(2, "Curd", 699, "Thick and creamy traditional curd."),
            product(3, "Buffalo Milk", 325, "Rich and creamy buffalo milk."),
            product(4, "Desi Cow Milk", 400, "Pure A2 milk from indigenous cow breeds."),
            product(5, "Eggs", 550, "Fresh farm eggs, perfect for cooking."),
            product(6, "Desi Eggs", 700, "Organic eggs from free-range desi chickens."),
            product(7, "Greek Yogurt", 425, "Thick and creamy Greek yogurt, high in protein."),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_lookup() {
        let catalog = ProductCatalog::default();
        assert_eq!(catalog.list().len(), 7);
        assert_eq!(catalog.get(2).unwrap().name, "Curd");
        assert_eq!(catalog.get(2).unwrap().price, Decimal::new(699, 2));
        assert!(matches!(
            catalog.get(42),
            Err(CatalogError::ProductNotFound(42))
        ));
    }

    #[test]
    fn products_are_ordered_and_unique_by_id() {
        let product = |id: u64| Product {
            id,
            name: format!("p{id}"),
            price: Decimal::ONE,
            description: String::new(),
        };
        let catalog = ProductCatalog::new(vec![product(3), product(1), product(3)]);
        let ids: Vec<u64> = catalog.list().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
