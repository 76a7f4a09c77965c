//! Domain Error Types
//!
//! Business rule violations for the caixa/venda core. These are independent
//! of the web/infrastructure layer; `crate::error::AppError` maps each one
//! to an HTTP status and a stable error code.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// An OPEN session already exists for this operator
    #[error("An open cash session already exists for this operator")]
    SessionAlreadyOpen,

    /// No OPEN session where one is required
    #[error("No open cash session for this operator")]
    SessionClosed,

    /// Closing with a cash discrepancy requires a justification
    #[error("A justification of at least 5 characters is required for a closing discrepancy")]
    JustificationRequired,

    /// Withdrawal exceeds the cash currently in the drawer
    #[error("Withdrawal of {requested} exceeds available cash on hand ({available})")]
    InsufficientCashOnHand {
        requested: Decimal,
        available: Decimal,
    },

    /// Referenced product does not exist
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough stock for the requested quantity
    #[error("Insufficient stock for \"{product}\": {available} available")]
    InsufficientStock { product: String, available: i32 },

    /// Discount outside 0..=subtotal
    #[error("Discount {discount} is invalid for subtotal {subtotal}")]
    InvalidDiscount { discount: Decimal, subtotal: Decimal },

    /// Payment lines do not sum to the sale total
    #[error("Payment lines sum to {paid}, sale total is {total}")]
    PaymentMismatch { total: Decimal, paid: Decimal },

    /// Cash received is less than the cash tender amount
    #[error("Cash received must be greater than or equal to the cash amount")]
    InvalidCashAmount,

    /// PIX tender lines must be confirmed before settlement
    #[error("PIX payment must be confirmed before completing the sale")]
    PixNotConfirmed,

    /// Credit-card installments outside 1..=12
    #[error("Credit card payments require between 1 and 12 installments")]
    InvalidInstallments,

    /// Delete blocked by dependent rows
    #[error("{0}")]
    ReferentialConflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_stock_names_product_and_quantity() {
        let err = DomainError::InsufficientStock {
            product: "Coca-Cola 350ml".to_string(),
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Coca-Cola 350ml"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_payment_mismatch_reports_both_sides() {
        let err = DomainError::PaymentMismatch {
            total: dec!(100.00),
            paid: dec!(99.00),
        };
        let msg = err.to_string();
        assert!(msg.contains("100.00"));
        assert!(msg.contains("99.00"));
    }

    #[test]
    fn test_insufficient_cash_on_hand_reports_available() {
        let err = DomainError::InsufficientCashOnHand {
            requested: dec!(70.00),
            available: dec!(60.00),
        };
        assert!(err.to_string().contains("60.00"));
    }
}
