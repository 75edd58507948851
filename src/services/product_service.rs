//! 商品服务：增删改查与所有权校验

use crate::{
    auth::middleware::{ensure_owner, AuthContext},
    error::AppError,
    models::{
        NewProduct, Product, ProductChanges, ProductOwner, ProductPage, ProductQuery,
        ProductResponse,
    },
    repository::{AccountRepository, ProductRepository},
};
use std::{collections::HashMap, sync::Arc};
use tracing::instrument;
use uuid::Uuid;

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { products, accounts }
    }

    /// 为商品附加所有者公开信息
    async fn with_owners(&self, products: Vec<Product>) -> Result<Vec<ProductResponse>, AppError> {
        let mut owner_ids: Vec<Uuid> = products.iter().map(|p| p.owner_id).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();

        let owners: HashMap<Uuid, ProductOwner> = self
            .accounts
            .find_by_ids(&owner_ids)
            .await?
            .iter()
            .map(|a| (a.id, ProductOwner::from(a)))
            .collect();

        Ok(products
            .into_iter()
            .map(|p| {
                let owner = owners.get(&p.owner_id).cloned();
                ProductResponse::new(p, owner)
            })
            .collect())
    }

    async fn with_owner(&self, product: Product) -> Result<ProductResponse, AppError> {
        let owner = self
            .accounts
            .find_by_id(product.owner_id)
            .await?
            .as_ref()
            .map(ProductOwner::from);
        Ok(ProductResponse::new(product, owner))
    }

    async fn find(&self, id: Uuid) -> Result<Product, AppError> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))
    }

    /// 创建商品
    #[instrument(skip(self, product), fields(owner_id = %product.owner_id))]
    pub async fn create(&self, product: NewProduct) -> Result<ProductResponse, AppError> {
        let product = self.products.insert(product).await?;
        tracing::info!(product_id = %product.id, owner_id = %product.owner_id, "Product created");
        self.with_owner(product).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ProductResponse, AppError> {
        let product = self.find(id).await?;
        self.with_owner(product).await
    }

    /// 分页列表（最新优先）
    pub async fn list(&self, query: ProductQuery) -> Result<ProductPage, AppError> {
        let (products, total) = futures::try_join!(
            self.products.list(&query),
            self.products.count(query.search.as_deref())
        )?;

        Ok(ProductPage {
            products: self.with_owners(products).await?,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    /// 当前用户的商品
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<ProductResponse>, AppError> {
        let products = self.products.list_by_owner(owner_id).await?;
        self.with_owners(products).await
    }

    /// 更新商品：先检查存在，再检查所有权
    #[instrument(skip(self, changes, requester), fields(account_id = %requester.account_id))]
    pub async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
        requester: &AuthContext,
    ) -> Result<ProductResponse, AppError> {
        let product = self.find(id).await?;
        ensure_owner(requester, product.owner_id)?;

        let product = self
            .products
            .update(id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))?;

        self.with_owner(product).await
    }

    /// 删除商品：先检查存在，再检查所有权
    #[instrument(skip(self, requester), fields(account_id = %requester.account_id))]
    pub async fn delete(&self, id: Uuid, requester: &AuthContext) -> Result<(), AppError> {
        let product = self.find(id).await?;
        ensure_owner(requester, product.owner_id)?;

        if !self.products.delete(id).await? {
            return Err(AppError::not_found("Product not found"));
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}
