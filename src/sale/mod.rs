//! Sale settlement
//!
//! Turns a cart plus a payment split into a committed, consistent sale:
//! validation first (nothing partially applied), then one atomic
//! transaction covering the sale, its items, the guarded stock
//! decrements, the payment records and one cash movement per tender line.

mod command;
mod service;

pub use command::{PaymentLine, SaleItemLine, SettleSaleCommand, SettledSale};
pub use service::SaleService;
