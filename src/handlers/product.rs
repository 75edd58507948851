//! 商品的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::{
        extract::{AppJson, AppPath},
        ApiResponse,
    },
    middleware::AppState,
    models::{
        CreateProductRequest, ListProductsParams, ProductPage, ProductResponse,
        UpdateProductRequest,
    },
};
use axum::extract::{Query, State};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 创建商品
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    AppJson(req): AppJson<CreateProductRequest>,
) -> Result<ApiResponse<ProductResponse>, AppError> {
    req.validate()?;

    let product = state
        .product_service
        .create(req.into_new_product(auth_context.account_id))
        .await?;
    Ok(ApiResponse::created("Product created successfully", product))
}

/// 商品列表（公开）
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListProductsParams>,
) -> Result<ApiResponse<ProductPage>, AppError> {
    let page = state.product_service.list(params.into()).await?;
    Ok(ApiResponse::ok("Products retrieved successfully", page))
}

/// 当前用户的商品
pub async fn my_products(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<ApiResponse<Vec<ProductResponse>>, AppError> {
    let products = state
        .product_service
        .list_by_owner(auth_context.account_id)
        .await?;
    Ok(ApiResponse::ok("Products retrieved successfully", products))
}

/// 商品详情（公开）
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<ProductResponse>, AppError> {
    let product = state.product_service.get(id).await?;
    Ok(ApiResponse::ok("Product retrieved successfully", product))
}

/// 更新商品（仅所有者）
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateProductRequest>,
) -> Result<ApiResponse<ProductResponse>, AppError> {
    req.validate()?;

    let product = state
        .product_service
        .update(id, req.into(), &auth_context)
        .await?;
    Ok(ApiResponse::ok("Product updated successfully", product))
}

/// 删除商品（仅所有者）
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    state.product_service.delete(id, &auth_context).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}
