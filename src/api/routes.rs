//! API Routes
//!
//! HTTP endpoint definitions for the register surface (sessions, sales)
//! and the catalog.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::{CatalogService, CreateProductInput, ProductQuery, UpdateProductInput};
use crate::domain::types::{CashMovement, CashSession, Category, Page, Product, Sale};
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::report::{ClosingPreview, LiveIndicators, ReportService};
use crate::sale::{SaleService, SettleSaleCommand, SettledSale};
use crate::session::{
    ActiveSession, ClosingSummary, HistoryQuery, PurgeSummary, SessionService,
};

// =========================================================================
// Request types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub opening_balance: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    pub counted_cash: Decimal,
    #[serde(default)]
    pub justification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ClosingPreviewRequest {
    pub counted_cash: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SaleListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        // Cash sessions
        .route("/sessions/open", post(open_session))
        .route("/sessions/close", post(close_session))
        .route("/sessions/current", get(current_session))
        .route("/sessions/indicators", get(live_indicators))
        .route("/sessions/closing-preview", post(closing_preview))
        .route("/sessions/supply", post(record_supply))
        .route("/sessions/withdrawal", post(record_withdrawal))
        .route("/sessions/history", get(session_history))
        // Sales
        .route("/sales", post(settle_sale).get(list_sales))
        .route("/sales/:sale_id", get(get_sale))
        // Admin
        .route("/admin/history", delete(purge_history))
        // Catalog
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:product_id",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:category_id", delete(delete_category))
}

// =========================================================================
// Cash sessions
// =========================================================================

/// Open a cash session for the acting operator
async fn open_session(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<CashSession>), AppError> {
    let service = SessionService::new(pool);
    let session = service
        .open(request.opening_balance, request.description, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Close the acting operator's session, reconciling counted vs expected
async fn close_session(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CloseSessionRequest>,
) -> Result<Json<ClosingSummary>, AppError> {
    let service = SessionService::new(pool);
    let summary = service
        .close(request.counted_cash, request.justification, &context)
        .await?;
    Ok(Json(summary))
}

/// The operator's open session plus live indicators, or null
async fn current_session(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Option<ActiveSession>>, AppError> {
    let service = SessionService::new(pool);
    Ok(Json(service.current(&context).await?))
}

/// Live indicators for the operator's session (zeros when closed)
async fn live_indicators(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<LiveIndicators>, AppError> {
    let service = ReportService::new(pool);
    Ok(Json(service.live_indicators(context.operator_id).await?))
}

/// Expected-vs-counted preview without mutating the session
async fn closing_preview(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<ClosingPreviewRequest>,
) -> Result<Json<ClosingPreview>, AppError> {
    let service = ReportService::new(pool);
    Ok(Json(
        service
            .closing_reconciliation(context.operator_id, request.counted_cash)
            .await?,
    ))
}

/// Record a cash supply into the drawer
async fn record_supply(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<CashMovement>), AppError> {
    let service = SessionService::new(pool);
    let movement = service
        .record_supply(request.amount, &request.reason, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Record a cash withdrawal from the drawer
async fn record_withdrawal(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<MovementRequest>,
) -> Result<(StatusCode, Json<CashMovement>), AppError> {
    let service = SessionService::new(pool);
    let movement = service
        .record_withdrawal(request.amount, &request.reason, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Paginated movement history (admins may filter by operator/date range)
async fn session_history(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<CashMovement>>, AppError> {
    let service = SessionService::new(pool);
    Ok(Json(service.history(query, &context).await?))
}

// =========================================================================
// Sales
// =========================================================================

/// Settle a sale against the operator's open session
async fn settle_sale(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<SettleSaleCommand>,
) -> Result<(StatusCode, Json<SettledSale>), AppError> {
    let service = SaleService::new(pool);
    let settled = service.settle(command, &context).await?;
    Ok((StatusCode::CREATED, Json(settled)))
}

/// Paginated sale listing, newest first
async fn list_sales(
    State(pool): State<PgPool>,
    Query(query): Query<SaleListQuery>,
) -> Result<Json<Page<Sale>>, AppError> {
    let service = SaleService::new(pool);
    Ok(Json(service.list(query.page, query.limit).await?))
}

/// A sale with its items and payment lines
async fn get_sale(
    State(pool): State<PgPool>,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<SettledSale>, AppError> {
    let service = SaleService::new(pool);
    Ok(Json(service.get(sale_id).await?))
}

// =========================================================================
// Admin
// =========================================================================

/// Purge all settlement history. ADMIN only; destructive and irreversible.
async fn purge_history(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<PurgeSummary>, AppError> {
    if !context.role.is_admin() {
        return Err(AppError::PermissionDenied);
    }
    let service = SessionService::new(pool);
    Ok(Json(service.purge_history(&context).await?))
}

// =========================================================================
// Catalog
// =========================================================================

async fn list_products(
    State(pool): State<PgPool>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<Product>>, AppError> {
    let service = CatalogService::new(pool);
    Ok(Json(service.list_products(query).await?))
}

async fn get_product(
    State(pool): State<PgPool>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let service = CatalogService::new(pool);
    Ok(Json(service.get_product(product_id).await?))
}

async fn create_product(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let service = CatalogService::new(pool);
    let product = service.create_product(input, &context).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<Product>, AppError> {
    let service = CatalogService::new(pool);
    Ok(Json(service.update_product(product_id, input, &context).await?))
}

async fn delete_product(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = CatalogService::new(pool);
    service.delete_product(product_id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(State(pool): State<PgPool>) -> Result<Json<Vec<Category>>, AppError> {
    let service = CatalogService::new(pool);
    Ok(Json(service.list_categories().await?))
}

async fn create_category(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let service = CatalogService::new(pool);
    let category = service.create_category(&request.name, &context).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn delete_category(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = CatalogService::new(pool);
    service.delete_category(category_id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}
