//! Inventory guard
//!
//! Two checks against the same invariant, on purpose. `check_availability`
//! is a pre-flight read that produces the user-facing message before any
//! write happens. `reserve` is the authoritative check: a conditional
//! decrement evaluated by the store inside the settlement transaction, so
//! two concurrent sales of the same product cannot jointly oversell.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::types::Product;
use crate::domain::DomainError;

/// Fast pre-flight stock check. Not sufficient on its own: stock can be
/// consumed between this read and the transaction commit.
pub fn check_availability(product: &Product, requested: i32) -> Result<(), DomainError> {
    if product.stock < requested {
        return Err(DomainError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
        });
    }
    Ok(())
}

/// Decrement stock by `quantity` only if enough remains, as one conditional
/// write inside the caller's transaction. Returns false when the row did
/// not match — the caller must abort the whole transaction.
pub async fn reserve(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    quantity: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}
