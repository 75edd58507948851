//! Product repository (PostgreSQL 数据访问层)

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::ProductRepository;
use crate::{
    error::AppError,
    models::{NewProduct, Product, ProductChanges, ProductQuery},
};

/// Text search predicate; mirrors the GIN index expression.
const SEARCH_PREDICATE: &str = "to_tsvector('simple', name || ' ' || COALESCE(description, '')) \
     @@ plainto_tsquery('simple', $1)";

pub struct PgProductRepository {
    db: PgPool,
}

impl PgProductRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn insert(&self, product: NewProduct) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, price, stock, image_url, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.image_url)
        .bind(product.owner_id)
        .fetch_one(&self.db)
        .await?;

        Ok(product)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(product)
    }

    async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, AppError> {
        let products = match &query.search {
            Some(term) => {
                let sql = format!(
                    "SELECT * FROM products WHERE {} \
                     ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
                    SEARCH_PREDICATE
                );
                sqlx::query_as::<_, Product>(&sql)
                    .bind(term)
                    .bind(query.limit)
                    .bind(query.offset)
                    .fetch_all(&self.db)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Product>(
                    r#"
                    SELECT * FROM products
                    ORDER BY created_at DESC, id DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(query.limit)
                .bind(query.offset)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(products)
    }

    async fn count(&self, search: Option<&str>) -> Result<i64, AppError> {
        let total: i64 = match search {
            Some(term) => {
                let sql = format!("SELECT COUNT(*) FROM products WHERE {}", SEARCH_PREDICATE);
                sqlx::query_scalar(&sql).bind(term).fetch_one(&self.db).await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM products")
                    .fetch_one(&self.db)
                    .await?
            }
        };

        Ok(total)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &ProductChanges,
    ) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock),
                image_url = COALESCE($6, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(&changes.image_url)
        .fetch_optional(&self.db)
        .await?;

        Ok(product)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
