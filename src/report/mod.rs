//! Indicator / reconciliation reporter
//!
//! Read-only views over a session's ledger: live indicators for the
//! register display, and the expected-vs-counted reconciliation preview
//! used before closing. The mutating close itself lives in `session`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::money::round2;
use crate::domain::types::{MovementKind, TenderType};
use crate::error::AppResult;
use crate::ledger::{self, MovementEntry, PaymentSplit, SaleBreakdown, SessionIndicators};
use crate::session::find_open_session;

/// Live indicators for the operator's current session. All-zero with
/// `session_open: false` when no session is open.
#[derive(Debug, Clone, Serialize)]
pub struct LiveIndicators {
    pub session_open: bool,
    #[serde(flatten)]
    pub indicators: SessionIndicators,
}

/// Non-mutating closing reconciliation: what `close` would persist for
/// the same counted amount.
#[derive(Debug, Clone, Serialize)]
pub struct ClosingPreview {
    pub expected: Decimal,
    pub counted: Decimal,
    pub difference: Decimal,
    pub indicators: SessionIndicators,
}

#[derive(Debug, Clone)]
pub struct ReportService {
    pool: PgPool,
}

impl ReportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load and fold the session's ledger. Always a fresh read: balances
    /// are derived, never cached.
    pub async fn indicators_for_session(&self, session_id: Uuid) -> AppResult<SessionIndicators> {
        let sale_rows: Vec<(Uuid, Decimal)> =
            sqlx::query_as("SELECT id, total FROM sales WHERE session_id = $1")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;

        let payment_rows: Vec<(Uuid, TenderType, Decimal)> = sqlx::query_as(
            r#"
            SELECT p.sale_id, p.tender, p.amount
            FROM payments p
            JOIN sales s ON s.id = p.sale_id
            WHERE s.session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let movement_rows: Vec<MovementEntry> = sqlx::query_as::<_, (MovementKind, Decimal)>(
            "SELECT kind, amount FROM cash_movements WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(kind, amount)| MovementEntry { kind, amount })
        .collect();

        let mut splits: HashMap<Uuid, Vec<PaymentSplit>> = HashMap::new();
        for (sale_id, tender, amount) in payment_rows {
            splits
                .entry(sale_id)
                .or_default()
                .push(PaymentSplit { tender, amount });
        }

        let sales: Vec<SaleBreakdown> = sale_rows
            .into_iter()
            .map(|(id, total)| SaleBreakdown {
                total,
                payments: splits.remove(&id).unwrap_or_default(),
            })
            .collect();

        Ok(ledger::compute_indicators(&sales, &movement_rows))
    }

    /// Indicators for the operator's OPEN session, or zeros when closed.
    pub async fn live_indicators(&self, operator_id: Uuid) -> AppResult<LiveIndicators> {
        match find_open_session(&self.pool, operator_id).await? {
            Some(session) => Ok(LiveIndicators {
                session_open: true,
                indicators: self.indicators_for_session(session.id).await?,
            }),
            None => Ok(LiveIndicators {
                session_open: false,
                indicators: SessionIndicators::zero(),
            }),
        }
    }

    /// Expected-vs-counted diff for the operator's OPEN session, without
    /// touching any state.
    pub async fn closing_reconciliation(
        &self,
        operator_id: Uuid,
        counted_cash: Decimal,
    ) -> AppResult<ClosingPreview> {
        let session = find_open_session(&self.pool, operator_id)
            .await?
            .ok_or(crate::domain::DomainError::SessionClosed)?;

        let indicators = self.indicators_for_session(session.id).await?;
        let expected = ledger::available_cash(session.opening_balance, &indicators);
        let counted = round2(counted_cash);

        Ok(ClosingPreview {
            expected,
            counted,
            difference: round2(counted - expected),
            indicators,
        })
    }
}
