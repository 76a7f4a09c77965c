//! Audit Log Service
//!
//! Records who did what, when, for every state-changing operation. Writes
//! are best-effort: a failed audit insert is logged and never fails the
//! primary operation.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;

/// Audit action tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    SessionOpened,
    SessionClosed,
    SupplyRecorded,
    WithdrawalRecorded,
    SaleSettled,
    HistoryPurged,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    CategoryCreated,
    CategoryDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SessionOpened => "session.opened",
            AuditAction::SessionClosed => "session.closed",
            AuditAction::SupplyRecorded => "session.supply_recorded",
            AuditAction::WithdrawalRecorded => "session.withdrawal_recorded",
            AuditAction::SaleSettled => "sale.settled",
            AuditAction::HistoryPurged => "history.purged",
            AuditAction::ProductCreated => "product.created",
            AuditAction::ProductUpdated => "product.updated",
            AuditAction::ProductDeleted => "product.deleted",
            AuditAction::CategoryCreated => "category.created",
            AuditAction::CategoryDeleted => "category.deleted",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit Log Service
#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an action. Failures are downgraded to a warning.
    pub async fn log_best_effort(&self, action: AuditAction, context: &OperationContext) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (id, operator_id, action, ip, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(context.operator_id)
        .bind(action.as_str())
        .bind(&context.client_ip)
        .bind(&context.user_agent)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(action = %action, operator_id = %context.operator_id, "Audit entry recorded");
            }
            Err(e) => {
                tracing::warn!(action = %action, error = %e, "Audit write failed; continuing");
            }
        }
    }
}
