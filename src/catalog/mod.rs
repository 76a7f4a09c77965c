//! Product catalog
//!
//! CRUD over products and categories. Stock is only ever written here at
//! creation time; afterwards sale settlement owns the counter. Deletes are
//! rejected with a referential conflict while historical rows reference
//! the entity.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogService};
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::domain::money::round2;
use crate::domain::types::{Category, Page, Product};
use crate::domain::{DomainError, OperationContext};
use crate::error::{AppError, AppResult};

/// Listing filters for products.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub code: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CatalogService {
    pool: PgPool,
    audit: AuditLogService,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        let audit = AuditLogService::new(pool.clone());
        Self { pool, audit }
    }

    // =====================================================================
    // Products
    // =====================================================================

    pub async fn list_products(&self, query: ProductQuery) -> AppResult<Page<Product>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;
        let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

        let products: Vec<Product> = sqlx::query_as(
            r#"
            SELECT id, name, code, price, stock, category_id, created_at, updated_at
            FROM products
            WHERE ($1::text IS NULL OR name ILIKE $1 OR code ILIKE $1)
              AND ($2::uuid IS NULL OR category_id = $2)
            ORDER BY name ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&search)
        .bind(query.category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products
            WHERE ($1::text IS NULL OR name ILIKE $1 OR code ILIKE $1)
              AND ($2::uuid IS NULL OR category_id = $2)
            "#,
        )
        .bind(&search)
        .bind(query.category_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(products, total, page, limit))
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Product> {
        let product: Option<Product> = sqlx::query_as(
            r#"
            SELECT id, name, code, price, stock, category_id, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| DomainError::ProductNotFound(id.to_string()).into())
    }

    pub async fn create_product(
        &self,
        input: CreateProductInput,
        ctx: &OperationContext,
    ) -> AppResult<Product> {
        validate_product_fields(&input.name, input.price, input.stock)?;

        let product: Product = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, code, price, stock, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, code, price, stock, category_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.code.as_deref().map(str::trim))
        .bind(round2(input.price))
        .bind(input.stock)
        .bind(input.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_product_write_error)?;

        self.audit
            .log_best_effort(AuditAction::ProductCreated, ctx)
            .await;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
        ctx: &OperationContext,
    ) -> AppResult<Product> {
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(AppError::InvalidRequest(
                    "price must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(AppError::InvalidRequest(
                    "stock must not be negative".to_string(),
                ));
            }
        }

        let product: Option<Product> = sqlx::query_as(
            r#"
            UPDATE products
            SET name        = COALESCE($2, name),
                code        = COALESCE($3, code),
                price       = COALESCE($4, price),
                stock       = COALESCE($5, stock),
                category_id = COALESCE($6, category_id),
                updated_at  = NOW()
            WHERE id = $1
            RETURNING id, name, code, price, stock, category_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.code.as_deref().map(str::trim))
        .bind(input.price.map(round2))
        .bind(input.stock)
        .bind(input.category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_product_write_error)?;

        let product = product.ok_or(DomainError::ProductNotFound(id.to_string()))?;
        self.audit
            .log_best_effort(AuditAction::ProductUpdated, ctx)
            .await;
        Ok(product)
    }

    /// Deleting a product referenced by historical sale items is rejected,
    /// never silently cascaded.
    pub async fn delete_product(&self, id: Uuid, ctx: &OperationContext) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Domain(DomainError::ReferentialConflict(
                        "Product is referenced by historical sales and cannot be deleted"
                            .to_string(),
                    ))
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProductNotFound(id.to_string()).into());
        }

        self.audit
            .log_best_effort(AuditAction::ProductDeleted, ctx)
            .await;
        Ok(())
    }

    // =====================================================================
    // Categories
    // =====================================================================

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories: Vec<Category> = sqlx::query_as(
            "SELECT id, name, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    pub async fn create_category(
        &self,
        name: &str,
        ctx: &OperationContext,
    ) -> AppResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest(
                "category name must not be empty".to_string(),
            ));
        }

        let category: Category = sqlx::query_as(
            r#"
            INSERT INTO categories (id, name)
            VALUES ($1, $2)
            RETURNING id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "categories_name_key") {
                AppError::DuplicateCategoryName
            } else {
                AppError::Database(e)
            }
        })?;

        self.audit
            .log_best_effort(AuditAction::CategoryCreated, ctx)
            .await;
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid, ctx: &OperationContext) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Domain(DomainError::ReferentialConflict(
                        "Category is still assigned to products and cannot be deleted"
                            .to_string(),
                    ))
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("category"));
        }

        self.audit
            .log_best_effort(AuditAction::CategoryDeleted, ctx)
            .await;
        Ok(())
    }
}

fn validate_product_fields(name: &str, price: Decimal, stock: i32) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "product name must not be empty".to_string(),
        ));
    }
    if price <= Decimal::ZERO {
        return Err(AppError::InvalidRequest(
            "price must be greater than zero".to_string(),
        ));
    }
    if stock < 0 {
        return Err(AppError::InvalidRequest(
            "stock must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn map_product_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e, "uq_products_code") {
        AppError::DuplicateProductCode
    } else if is_foreign_key_violation(&e) {
        AppError::NotFound("category")
    } else {
        AppError::Database(e)
    }
}
