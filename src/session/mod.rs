//! Cash session state machine
//!
//! Owns the OPEN -> CLOSED lifecycle of a per-operator cash drawer and the
//! movements recorded against it. At most one OPEN session exists per
//! operator; the partial unique index `uq_cash_sessions_open_operator`
//! enforces that at the storage layer, so two near-simultaneous opens
//! cannot both succeed. Closing is terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogService};
use crate::db::is_unique_violation;
use crate::domain::money::{round2, CENT};
use crate::domain::types::{
    CashMovement, CashSession, MovementKind, Page, SessionStatus, TenderGroup,
};
use crate::domain::{Clock, DomainError, OperationContext};
use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::report::ReportService;

const DEFAULT_OPENING_DESCRIPTION: &str = "Abertura de caixa";
const DEFAULT_CLOSING_DESCRIPTION: &str = "Fechamento de caixa";
const MIN_JUSTIFICATION_LEN: usize = 5;
const MIN_REASON_LEN: usize = 3;

/// The operator's OPEN session, or None.
pub async fn find_open_session(
    pool: &PgPool,
    operator_id: Uuid,
) -> Result<Option<CashSession>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, operator_id, status, opening_balance, opened_at, closed_at,
               expected_cash, counted_cash, cash_difference, justification
        FROM cash_sessions
        WHERE operator_id = $1 AND status = 'OPEN'
        ORDER BY opened_at DESC
        LIMIT 1
        "#,
    )
    .bind(operator_id)
    .fetch_optional(pool)
    .await
}

/// Result of a successful close.
#[derive(Debug, Clone, Serialize)]
pub struct ClosingSummary {
    pub session_id: Uuid,
    pub operator_id: Uuid,
    pub closed_at: DateTime<Utc>,
    pub expected: Decimal,
    pub counted: Decimal,
    pub difference: Decimal,
    pub justification: Option<String>,
    pub indicators: ledger::SessionIndicators,
}

/// The operator's open session plus its live indicators.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub session: CashSession,
    pub indicators: ledger::SessionIndicators,
}

/// History listing filters. Non-admins are always scoped to themselves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub operator_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Per-table deletion counts from a history purge.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeSummary {
    pub payments_removed: u64,
    pub sale_items_removed: u64,
    pub movements_removed: u64,
    pub sales_removed: u64,
    pub sessions_removed: u64,
}

#[derive(Debug, Clone)]
pub struct SessionService {
    pool: PgPool,
    clock: Clock,
    audit: AuditLogService,
    report: ReportService,
}

impl SessionService {
    pub fn new(pool: PgPool) -> Self {
        let audit = AuditLogService::new(pool.clone());
        let report = ReportService::new(pool.clone());
        Self {
            pool,
            clock: Clock::system(),
            audit,
            report,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Open a session for the acting operator, recording a synthetic
    /// OPENING movement equal to the opening balance.
    pub async fn open(
        &self,
        opening_balance: Decimal,
        description: Option<String>,
        ctx: &OperationContext,
    ) -> AppResult<CashSession> {
        if opening_balance < Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "opening balance must not be negative".to_string(),
            ));
        }

        if find_open_session(&self.pool, ctx.operator_id).await?.is_some() {
            return Err(DomainError::SessionAlreadyOpen.into());
        }

        let opening_balance = round2(opening_balance);
        let now = self.clock.now();
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_OPENING_DESCRIPTION.to_string());

        let mut tx = self.pool.begin().await?;

        // The read above is only for a clean error message; the partial
        // unique index is what actually closes the open/open race.
        let session: CashSession = sqlx::query_as(
            r#"
            INSERT INTO cash_sessions (id, operator_id, status, opening_balance, opened_at)
            VALUES ($1, $2, 'OPEN', $3, $4)
            RETURNING id, operator_id, status, opening_balance, opened_at, closed_at,
                      expected_cash, counted_cash, cash_difference, justification
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ctx.operator_id)
        .bind(opening_balance)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "uq_cash_sessions_open_operator") {
                AppError::Domain(DomainError::SessionAlreadyOpen)
            } else {
                AppError::Database(e)
            }
        })?;

        insert_movement(
            &mut tx,
            &session,
            ctx.operator_id,
            MovementKind::Opening,
            opening_balance,
            TenderGroup::Cash,
            &description,
            None,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(session_id = %session.id, operator_id = %ctx.operator_id, "Cash session opened");
        self.audit
            .log_best_effort(AuditAction::SessionOpened, ctx)
            .await;
        Ok(session)
    }

    /// The operator's OPEN session plus live indicators, or None.
    pub async fn current(&self, ctx: &OperationContext) -> AppResult<Option<ActiveSession>> {
        match find_open_session(&self.pool, ctx.operator_id).await? {
            Some(session) => {
                let indicators = self.report.indicators_for_session(session.id).await?;
                Ok(Some(ActiveSession {
                    session,
                    indicators,
                }))
            }
            None => Ok(None),
        }
    }

    /// Append a SUPPLY movement (cash added to the drawer mid-session).
    pub async fn record_supply(
        &self,
        amount: Decimal,
        reason: &str,
        ctx: &OperationContext,
    ) -> AppResult<CashMovement> {
        let (amount, reason) = validate_movement_input(amount, reason)?;
        let session = find_open_session(&self.pool, ctx.operator_id)
            .await?
            .ok_or(DomainError::SessionClosed)?;

        let mut tx = self.pool.begin().await?;
        let movement = insert_movement(
            &mut tx,
            &session,
            ctx.operator_id,
            MovementKind::Supply,
            amount,
            TenderGroup::Cash,
            &reason,
            None,
            self.clock.now(),
        )
        .await?;
        tx.commit().await?;

        self.audit
            .log_best_effort(AuditAction::SupplyRecorded, ctx)
            .await;
        Ok(movement)
    }

    /// Append a WITHDRAWAL movement. Fails when the amount exceeds the
    /// cash currently available in the drawer (opening balance + cash
    /// sales + supplies - withdrawals).
    pub async fn record_withdrawal(
        &self,
        amount: Decimal,
        reason: &str,
        ctx: &OperationContext,
    ) -> AppResult<CashMovement> {
        let (amount, reason) = validate_movement_input(amount, reason)?;
        let session = find_open_session(&self.pool, ctx.operator_id)
            .await?
            .ok_or(DomainError::SessionClosed)?;

        let indicators = self.report.indicators_for_session(session.id).await?;
        let available = ledger::available_cash(session.opening_balance, &indicators);
        if amount > available {
            return Err(DomainError::InsufficientCashOnHand {
                requested: amount,
                available,
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let movement = insert_movement(
            &mut tx,
            &session,
            ctx.operator_id,
            MovementKind::Withdrawal,
            amount,
            TenderGroup::Cash,
            &reason,
            None,
            self.clock.now(),
        )
        .await?;
        tx.commit().await?;

        self.audit
            .log_best_effort(AuditAction::WithdrawalRecorded, ctx)
            .await;
        Ok(movement)
    }

    /// Close the operator's OPEN session. One-way: the status flip is
    /// conditional on `status = 'OPEN'`, so a concurrent or repeated close
    /// cannot double-apply the CLOSING movement.
    pub async fn close(
        &self,
        counted_cash: Decimal,
        justification: Option<String>,
        ctx: &OperationContext,
    ) -> AppResult<ClosingSummary> {
        if counted_cash < Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "counted cash must not be negative".to_string(),
            ));
        }

        let session = find_open_session(&self.pool, ctx.operator_id)
            .await?
            .ok_or(DomainError::SessionClosed)?;

        let indicators = self.report.indicators_for_session(session.id).await?;
        let expected = ledger::available_cash(session.opening_balance, &indicators);
        let counted = round2(counted_cash);
        let (difference, justification) =
            validate_closing(expected, counted, justification.as_deref())?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'CLOSED', closed_at = $2, expected_cash = $3,
                counted_cash = $4, cash_difference = $5, justification = $6
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(session.id)
        .bind(now)
        .bind(expected)
        .bind(counted)
        .bind(difference)
        .bind(&justification)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::SessionClosed.into());
        }

        let closing_description = justification
            .clone()
            .unwrap_or_else(|| DEFAULT_CLOSING_DESCRIPTION.to_string());
        insert_movement(
            &mut tx,
            &session,
            ctx.operator_id,
            MovementKind::Closing,
            counted,
            TenderGroup::Cash,
            &closing_description,
            None,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            operator_id = %ctx.operator_id,
            %expected,
            %counted,
            %difference,
            "Cash session closed"
        );
        self.audit
            .log_best_effort(AuditAction::SessionClosed, ctx)
            .await;

        Ok(ClosingSummary {
            session_id: session.id,
            operator_id: ctx.operator_id,
            closed_at: now,
            expected,
            counted,
            difference,
            justification,
            indicators,
        })
    }

    /// Paginated reverse-chronological movements. Operators see their own
    /// history; admins may filter by operator and created-at range.
    pub async fn history(
        &self,
        query: HistoryQuery,
        ctx: &OperationContext,
    ) -> AppResult<Page<CashMovement>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let operator_filter = if ctx.role.is_admin() {
            query.operator_id
        } else {
            Some(ctx.operator_id)
        };

        let movements: Vec<CashMovement> = sqlx::query_as(
            r#"
            SELECT id, session_id, operator_id, kind, amount, tender, description,
                   sale_id, created_at
            FROM cash_movements
            WHERE ($1::uuid IS NULL OR operator_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(operator_filter)
        .bind(query.from)
        .bind(query.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM cash_movements
            WHERE ($1::uuid IS NULL OR operator_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(operator_filter)
        .bind(query.from)
        .bind(query.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(movements, total, page, limit))
    }

    /// Remove all settlement history. Destructive and irreversible; the
    /// caller gates this behind the ADMIN role. Deletion order follows the
    /// FK graph: payments -> sale items -> movements -> sales -> sessions.
    pub async fn purge_history(&self, ctx: &OperationContext) -> AppResult<PurgeSummary> {
        let mut tx = self.pool.begin().await?;

        let payments = sqlx::query("DELETE FROM payments")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let sale_items = sqlx::query("DELETE FROM sale_items")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let movements = sqlx::query("DELETE FROM cash_movements")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let sales = sqlx::query("DELETE FROM sales")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let sessions = sqlx::query("DELETE FROM cash_sessions")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::warn!(operator_id = %ctx.operator_id, "Settlement history purged");
        self.audit
            .log_best_effort(AuditAction::HistoryPurged, ctx)
            .await;

        Ok(PurgeSummary {
            payments_removed: payments,
            sale_items_removed: sale_items,
            movements_removed: movements,
            sales_removed: sales,
            sessions_removed: sessions,
        })
    }
}

/// Shared movement insert; all writers go through the same statement so
/// every ledger entry carries the same shape.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_movement(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session: &CashSession,
    operator_id: Uuid,
    kind: MovementKind,
    amount: Decimal,
    tender: TenderGroup,
    description: &str,
    sale_id: Option<Uuid>,
    created_at: DateTime<Utc>,
) -> Result<CashMovement, sqlx::Error> {
    debug_assert_eq!(session.status, SessionStatus::Open);

    sqlx::query_as(
        r#"
        INSERT INTO cash_movements
            (id, session_id, operator_id, kind, amount, tender, description, sale_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, session_id, operator_id, kind, amount, tender, description,
                  sale_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session.id)
    .bind(operator_id)
    .bind(kind)
    .bind(amount)
    .bind(tender)
    .bind(description)
    .bind(sale_id)
    .bind(created_at)
    .fetch_one(&mut **tx)
    .await
}

fn validate_movement_input(amount: Decimal, reason: &str) -> AppResult<(Decimal, String)> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidRequest(
            "amount must be greater than zero".to_string(),
        ));
    }
    let reason = reason.trim();
    if reason.chars().count() < MIN_REASON_LEN {
        return Err(AppError::InvalidRequest(format!(
            "reason must have at least {} characters",
            MIN_REASON_LEN
        )));
    }
    Ok((round2(amount), reason.to_string()))
}

/// A discrepancy of one cent or more requires a justification of at
/// least five characters. Returns the signed difference and the
/// normalized justification.
fn validate_closing(
    expected: Decimal,
    counted: Decimal,
    justification: Option<&str>,
) -> Result<(Decimal, Option<String>), DomainError> {
    let difference = round2(counted - expected);
    let justification = justification
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .map(str::to_string);

    if difference.abs() >= CENT {
        let long_enough = justification
            .as_deref()
            .map(|j| j.chars().count() >= MIN_JUSTIFICATION_LEN)
            .unwrap_or(false);
        if !long_enough {
            return Err(DomainError::JustificationRequired);
        }
    }

    Ok((difference, justification))
}
