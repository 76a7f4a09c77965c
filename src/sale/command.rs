//! Settlement command and result types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::types::{Payment, Sale, SaleItem, TenderType};

/// One cart line: the unit price is the price being charged now and is
/// frozen onto the sale item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// One tender line of the payment split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLine {
    pub tender: TenderType,
    pub amount: Decimal,
    /// Cash handed over by the customer; change is computed from it.
    #[serde(default)]
    pub received_amount: Option<Decimal>,
    /// Credit card only, 1 to 12.
    #[serde(default)]
    pub installments: Option<i32>,
    /// PIX only; must be true at settlement time.
    #[serde(default)]
    pub confirmed: Option<bool>,
}

/// Command to settle a sale for the acting operator's open session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleSaleCommand {
    pub items: Vec<SaleItemLine>,
    #[serde(default)]
    pub discount: Decimal,
    pub payments: Vec<PaymentLine>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_tax_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// The persisted sale with its items and payment lines.
#[derive(Debug, Clone, Serialize)]
pub struct SettledSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
}
