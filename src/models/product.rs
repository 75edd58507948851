//! Product domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::account::{trimmed, Account};

/// Product record; `owner_id` references exactly one account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
}

impl ProductChanges {
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = Some(image_url.clone());
        }
    }
}

/// Paging and search window for product listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub limit: i64,
    pub offset: i64,
    pub search: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            search: None,
        }
    }
}

/// Owner summary embedded in product responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductOwner {
    pub id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&Account> for ProductOwner {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            user_name: account.user_name.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
    pub user: Option<ProductOwner>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn new(product: Product, owner: Option<ProductOwner>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image_url: product.image_url,
            owner_id: product.owner_id,
            user: owner,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ==================== Requests ====================

/// Create product request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Price must be a non-negative number"))]
    pub price: f64,
    #[validate(range(min = 0, message = "Stock must be a non-negative integer"))]
    pub stock: Option<i32>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

impl CreateProductRequest {
    pub fn into_new_product(self, owner_id: Uuid) -> NewProduct {
        NewProduct {
            name: self.name.trim().to_string(),
            description: trimmed(self.description.as_deref()),
            price: self.price,
            stock: self.stock.unwrap_or(0),
            image_url: trimmed(self.image_url.as_deref()),
            owner_id,
        }
    }
}

/// Update product request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be between 1 and 200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Price must be a non-negative number"))]
    pub price: Option<f64>,
    #[validate(range(min = 0, message = "Stock must be a non-negative integer"))]
    pub stock: Option<i32>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

impl From<UpdateProductRequest> for ProductChanges {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name.map(|s| s.trim().to_string()),
            description: req.description.map(|s| s.trim().to_string()),
            price: req.price,
            stock: req.stock,
            image_url: req.image_url.map(|s| s.trim().to_string()),
        }
    }
}

/// Raw listing query string. Values that fail to parse fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub q: Option<String>,
}

fn parse_non_negative(value: Option<&str>, default: i64) -> i64 {
    match value.map(str::trim).map(str::parse::<f64>) {
        Some(Ok(parsed)) if parsed.is_finite() && parsed >= 0.0 => parsed.floor() as i64,
        _ => default,
    }
}

impl From<ListProductsParams> for ProductQuery {
    fn from(params: ListProductsParams) -> Self {
        let defaults = ProductQuery::default();
        Self {
            limit: parse_non_negative(params.limit.as_deref(), defaults.limit).clamp(1, 100),
            offset: parse_non_negative(params.offset.as_deref(), defaults.offset),
            search: trimmed(params.q.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_fall_back_to_defaults() {
        let query: ProductQuery = ListProductsParams {
            limit: Some("abc".to_string()),
            offset: Some("-3".to_string()),
            q: Some("   ".to_string()),
        }
        .into();
        assert_eq!(query, ProductQuery::default());
    }

    #[test]
    fn test_list_params_floor_and_clamp() {
        let query: ProductQuery = ListProductsParams {
            limit: Some("0".to_string()),
            offset: Some("7.9".to_string()),
            q: Some(" lamp ".to_string()),
        }
        .into();
        assert_eq!(query.limit, 1);
        assert_eq!(query.offset, 7);
        assert_eq!(query.search.as_deref(), Some("lamp"));
    }

    #[test]
    fn test_create_request_validation() {
        let req = CreateProductRequest {
            name: "Desk".to_string(),
            description: None,
            price: -1.0,
            stock: None,
            image_url: None,
        };
        assert!(req.validate().is_err());

        let req = CreateProductRequest {
            name: "Desk".to_string(),
            description: Some("  oak  ".to_string()),
            price: 10.0,
            stock: None,
            image_url: None,
        };
        assert!(req.validate().is_ok());

        let owner = Uuid::new_v4();
        let new_product = req.into_new_product(owner);
        assert_eq!(new_product.stock, 0);
        assert_eq!(new_product.description.as_deref(), Some("oak"));
        assert_eq!(new_product.owner_id, owner);
    }
}
