//! Ledger arithmetic
//!
//! Pure aggregation over a session's sales and movements. No IO: callers
//! load the rows and this module folds them. The drawer balance is always
//! derived from the ledger here, never read from a stored counter.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::money::round2;
use crate::domain::types::{MovementKind, TenderGroup, TenderType};

/// Totals of one committed sale plus its payment split, as loaded for
/// indicator aggregation.
#[derive(Debug, Clone)]
pub struct SaleBreakdown {
    pub total: Decimal,
    pub payments: Vec<PaymentSplit>,
}

#[derive(Debug, Clone)]
pub struct PaymentSplit {
    pub tender: TenderType,
    pub amount: Decimal,
}

/// Kind and amount of one movement, as loaded for aggregation.
#[derive(Debug, Clone)]
pub struct MovementEntry {
    pub kind: MovementKind,
    pub amount: Decimal,
}

/// Per-tender and per-kind totals of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionIndicators {
    pub cash_total: Decimal,
    pub card_total: Decimal,
    pub pix_total: Decimal,
    pub supply_total: Decimal,
    pub withdrawal_total: Decimal,
    pub sale_count: i64,
    pub average_ticket: Decimal,
}

impl SessionIndicators {
    pub fn zero() -> Self {
        Self {
            cash_total: Decimal::ZERO,
            card_total: Decimal::ZERO,
            pix_total: Decimal::ZERO,
            supply_total: Decimal::ZERO,
            withdrawal_total: Decimal::ZERO,
            sale_count: 0,
            average_ticket: Decimal::ZERO,
        }
    }
}

/// Sum of movement amounts of one kind.
pub fn sum_by_kind(movements: &[MovementEntry], kind: MovementKind) -> Decimal {
    movements
        .iter()
        .filter(|m| m.kind == kind)
        .map(|m| m.amount)
        .sum()
}

/// Fold a session's sales and movements into per-tender totals.
///
/// Sales recorded with zero payment lines are counted entirely as cash;
/// older data predates per-tender payment records. Newly settled sales
/// always carry at least one line, so only historical rows take that
/// branch.
pub fn compute_indicators(
    sales: &[SaleBreakdown],
    movements: &[MovementEntry],
) -> SessionIndicators {
    let mut cash_total = Decimal::ZERO;
    let mut card_total = Decimal::ZERO;
    let mut pix_total = Decimal::ZERO;
    let mut sales_total = Decimal::ZERO;

    for sale in sales {
        sales_total += sale.total;
        if sale.payments.is_empty() {
            cash_total += sale.total;
            continue;
        }
        for split in &sale.payments {
            match split.tender.group() {
                TenderGroup::Cash => cash_total += split.amount,
                TenderGroup::Pix => pix_total += split.amount,
                TenderGroup::Card => card_total += split.amount,
                TenderGroup::Mixed => {}
            }
        }
    }

    let sale_count = sales.len() as i64;
    let average_ticket = if sale_count > 0 {
        round2(sales_total / Decimal::from(sale_count))
    } else {
        Decimal::ZERO
    };

    SessionIndicators {
        cash_total: round2(cash_total),
        card_total: round2(card_total),
        pix_total: round2(pix_total),
        supply_total: round2(sum_by_kind(movements, MovementKind::Supply)),
        withdrawal_total: round2(sum_by_kind(movements, MovementKind::Withdrawal)),
        sale_count,
        average_ticket,
    }
}

/// Cash physically available in the drawer: opening balance plus cash
/// sales and supplies, minus withdrawals. Non-cash tenders never touch
/// the drawer.
pub fn available_cash(opening_balance: Decimal, indicators: &SessionIndicators) -> Decimal {
    round2(
        opening_balance + indicators.cash_total + indicators.supply_total
            - indicators.withdrawal_total,
    )
}
