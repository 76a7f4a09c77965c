//! Domain types
//!
//! Entities and enums shared across the catalog, session and settlement
//! modules. Enums are stored as TEXT in Postgres via `sqlx::Type`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =========================================================================
// Enums
// =========================================================================

/// Lifecycle of a cash session. Closing is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// Kind of a cash-drawer ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Opening,
    Sale,
    Supply,
    Withdrawal,
    Closing,
}

/// Payment method of a single tender line within a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderType {
    Cash,
    Pix,
    CreditCard,
    DebitCard,
}

impl TenderType {
    /// Collapse the tender into the coarse category used on cash movements
    /// and on the sale's aggregate label (both card variants become CARD).
    pub fn group(&self) -> TenderGroup {
        match self {
            TenderType::Cash => TenderGroup::Cash,
            TenderType::Pix => TenderGroup::Pix,
            TenderType::CreditCard | TenderType::DebitCard => TenderGroup::Card,
        }
    }
}

/// Coarse tender category: tags cash movements and labels a whole sale.
/// `Mixed` only ever appears on sales paid with more than one tender line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderGroup {
    Cash,
    Pix,
    Card,
    Mixed,
}

/// Operator role, as asserted by the upstream authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "OPERATOR" => Ok(Role::Operator),
            _ => Err(()),
        }
    }
}

// =========================================================================
// Entities
// =========================================================================

/// A catalog product. Stock is decremented only by sale settlement.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A cash-drawer session bounded by open/close events. The running balance
/// is derived from movements, never stored on this row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CashSession {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub status: SessionStatus,
    pub opening_balance: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub expected_cash: Option<Decimal>,
    pub counted_cash: Option<Decimal>,
    pub cash_difference: Option<Decimal>,
    pub justification: Option<String>,
}

/// An append-only ledger entry against a session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CashMovement {
    pub id: Uuid,
    pub session_id: Uuid,
    pub operator_id: Uuid,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub tender: TenderGroup,
    pub description: String,
    pub sale_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A committed sale. Immutable once created except via full-history purge.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub session_id: Uuid,
    pub operator_id: Uuid,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub tender_group: TenderGroup,
    pub customer_name: Option<String>,
    pub customer_tax_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A sale line item, freezing the unit price at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One tender line of a sale's payment split.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub tender: TenderType,
    pub amount: Decimal,
    pub installments: Option<i32>,
    pub change: Decimal,
    pub created_at: DateTime<Utc>,
}

// =========================================================================
// Pagination
// =========================================================================

/// A page of results plus totals, as returned by every listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            data,
            total,
            page,
            total_pages,
        }
    }
}
