//! Sale settlement engine

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogService};
use crate::domain::money::{round2, within_cent};
use crate::domain::types::{MovementKind, Page, Payment, Product, Sale, SaleItem, TenderGroup, TenderType};
use crate::domain::{Clock, DomainError, OperationContext};
use crate::error::{AppError, AppResult};
use crate::inventory;
use crate::session::{find_open_session, insert_movement};

use super::{PaymentLine, SaleItemLine, SettleSaleCommand, SettledSale};

#[derive(Debug, Clone)]
pub struct SaleService {
    pool: PgPool,
    clock: Clock,
    audit: AuditLogService,
}

impl SaleService {
    pub fn new(pool: PgPool) -> Self {
        let audit = AuditLogService::new(pool.clone());
        Self {
            pool,
            clock: Clock::system(),
            audit,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and commit a sale.
    ///
    /// Every validation failure is detected before any write. The commit
    /// itself is one transaction; the conditional stock decrement inside
    /// it is the authoritative oversell guard, and a miss there rolls the
    /// whole sale back.
    pub async fn settle(
        &self,
        command: SettleSaleCommand,
        ctx: &OperationContext,
    ) -> AppResult<SettledSale> {
        validate_shape(&command)?;

        // 1. An open session must exist for the acting operator.
        let session = find_open_session(&self.pool, ctx.operator_id)
            .await?
            .ok_or(DomainError::SessionClosed)?;

        // 2. Pre-flight: products exist and currently have enough stock.
        let mut products: Vec<Product> = Vec::with_capacity(command.items.len());
        for item in &command.items {
            let product: Option<Product> = sqlx::query_as(
                r#"
                SELECT id, name, code, price, stock, category_id, created_at, updated_at
                FROM products
                WHERE id = $1
                "#,
            )
            .bind(item.product_id)
            .fetch_optional(&self.pool)
            .await?;

            let product = product
                .ok_or_else(|| DomainError::ProductNotFound(item.product_id.to_string()))?;
            inventory::check_availability(&product, item.quantity)?;
            products.push(product);
        }

        // 3-5. Totals, payment split, per-tender rules.
        let (subtotal, discount, total) = compute_totals(&command.items, command.discount)?;
        validate_payments(&command.payments, total)?;

        // 6. Aggregate tender label.
        let tender_group = aggregate_tender(&command.payments);

        let now = self.clock.now();
        let sale_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let sale: Sale = sqlx::query_as(
            r#"
            INSERT INTO sales
                (id, session_id, operator_id, subtotal, discount, total, tender_group,
                 customer_name, customer_tax_id, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, session_id, operator_id, subtotal, discount, total, tender_group,
                      customer_name, customer_tax_id, note, created_at
            "#,
        )
        .bind(sale_id)
        .bind(session.id)
        .bind(ctx.operator_id)
        .bind(subtotal)
        .bind(discount)
        .bind(total)
        .bind(tender_group)
        .bind(normalize(&command.customer_name))
        .bind(normalize(&command.customer_tax_id))
        .bind(normalize(&command.note))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut items: Vec<SaleItem> = Vec::with_capacity(command.items.len());
        for item in &command.items {
            let line_subtotal = round2(Decimal::from(item.quantity) * item.unit_price);
            let persisted: SaleItem = sqlx::query_as(
                r#"
                INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price, subtotal, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, sale_id, product_id, quantity, unit_price, subtotal, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(sale_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(round2(item.unit_price))
            .bind(line_subtotal)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            items.push(persisted);
        }

        // Authoritative stock reservation. A concurrent sale may have
        // consumed the stock since the pre-flight read; the conditional
        // update decides, and a miss aborts everything.
        for (item, product) in command.items.iter().zip(&products) {
            if !inventory::reserve(&mut tx, item.product_id, item.quantity).await? {
                let available: i32 =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(item.product_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(DomainError::InsufficientStock {
                    product: product.name.clone(),
                    available,
                }
                .into());
            }
        }

        // One payment record and one SALE movement per tender line; a
        // mixed sale yields multiple movements summing to the total.
        let sale_ref = sale_id.to_string();
        let movement_description = format!("Venda {}", &sale_ref[..8]);
        let mut payments: Vec<Payment> = Vec::with_capacity(command.payments.len());
        for line in &command.payments {
            let change = cash_change(line);
            let persisted: Payment = sqlx::query_as(
                r#"
                INSERT INTO payments (id, sale_id, tender, amount, installments, change, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, sale_id, tender, amount, installments, change, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(sale_id)
            .bind(line.tender)
            .bind(round2(line.amount))
            .bind(installments_to_store(line))
            .bind(change)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            payments.push(persisted);

            insert_movement(
                &mut tx,
                &session,
                ctx.operator_id,
                MovementKind::Sale,
                round2(line.amount),
                line.tender.group(),
                &movement_description,
                Some(sale_id),
                now,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            sale_id = %sale_id,
            session_id = %session.id,
            operator_id = %ctx.operator_id,
            %total,
            "Sale settled"
        );
        self.audit.log_best_effort(AuditAction::SaleSettled, ctx).await;

        Ok(SettledSale {
            sale,
            items,
            payments,
        })
    }

    /// Paginated reverse-chronological sale listing.
    pub async fn list(&self, page: Option<i64>, limit: Option<i64>) -> AppResult<Page<Sale>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let sales: Vec<Sale> = sqlx::query_as(
            r#"
            SELECT id, session_id, operator_id, subtotal, discount, total, tender_group,
                   customer_name, customer_tax_id, note, created_at
            FROM sales
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(Page::new(sales, total, page, limit))
    }

    /// A sale with its items and payment lines.
    pub async fn get(&self, id: Uuid) -> AppResult<SettledSale> {
        let sale: Option<Sale> = sqlx::query_as(
            r#"
            SELECT id, session_id, operator_id, subtotal, discount, total, tender_group,
                   customer_name, customer_tax_id, note, created_at
            FROM sales
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let sale = sale.ok_or(AppError::NotFound("sale"))?;

        let items: Vec<SaleItem> = sqlx::query_as(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price, subtotal, created_at
            FROM sale_items
            WHERE sale_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payments: Vec<Payment> = sqlx::query_as(
            r#"
            SELECT id, sale_id, tender, amount, installments, change, created_at
            FROM payments
            WHERE sale_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SettledSale {
            sale,
            items,
            payments,
        })
    }
}

// =========================================================================
// Validation (pure)
// =========================================================================

fn validate_shape(command: &SettleSaleCommand) -> AppResult<()> {
    if command.items.is_empty() {
        return Err(AppError::InvalidRequest(
            "sale must have at least one item".to_string(),
        ));
    }
    if command.payments.is_empty() {
        return Err(AppError::InvalidRequest(
            "sale must have at least one payment line".to_string(),
        ));
    }
    for item in &command.items {
        if item.quantity <= 0 {
            return Err(AppError::InvalidRequest(
                "item quantity must be greater than zero".to_string(),
            ));
        }
        if item.unit_price <= Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "item unit price must be greater than zero".to_string(),
            ));
        }
    }
    for line in &command.payments {
        if line.amount <= Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "payment amount must be greater than zero".to_string(),
            ));
        }
    }
    Ok(())
}

/// Subtotal, normalized discount and total. Discount must stay within
/// 0..=subtotal.
fn compute_totals(
    items: &[SaleItemLine],
    discount: Decimal,
) -> Result<(Decimal, Decimal, Decimal), DomainError> {
    let subtotal = round2(
        items
            .iter()
            .map(|item| Decimal::from(item.quantity) * item.unit_price)
            .sum(),
    );
    let discount = round2(discount);
    if discount < Decimal::ZERO || discount > subtotal {
        return Err(DomainError::InvalidDiscount { discount, subtotal });
    }
    let total = round2(subtotal - discount);
    Ok((subtotal, discount, total))
}

/// Payment lines must sum to the total within one cent, and each tender
/// carries its own rules: cash received covers the amount, PIX is
/// confirmed, credit-card installments are 1..=12.
fn validate_payments(payments: &[PaymentLine], total: Decimal) -> Result<(), DomainError> {
    let paid = round2(payments.iter().map(|line| line.amount).sum());
    if !within_cent(paid, total) {
        return Err(DomainError::PaymentMismatch { total, paid });
    }

    for line in payments {
        match line.tender {
            TenderType::Cash => {
                if let Some(received) = line.received_amount {
                    if received < line.amount {
                        return Err(DomainError::InvalidCashAmount);
                    }
                }
            }
            TenderType::Pix => {
                if line.confirmed != Some(true) {
                    return Err(DomainError::PixNotConfirmed);
                }
            }
            TenderType::CreditCard => match line.installments {
                Some(n) if (1..=12).contains(&n) => {}
                _ => return Err(DomainError::InvalidInstallments),
            },
            TenderType::DebitCard => {}
        }
    }

    Ok(())
}

/// Single tender type, or MIXED for a split across more than one line.
fn aggregate_tender(payments: &[PaymentLine]) -> TenderGroup {
    match payments {
        [single] => single.tender.group(),
        _ => TenderGroup::Mixed,
    }
}

/// Change due on a cash line; zero for every other tender.
fn cash_change(line: &PaymentLine) -> Decimal {
    match line.tender {
        TenderType::Cash => {
            let received = line.received_amount.unwrap_or(line.amount);
            round2((received - line.amount).max(Decimal::ZERO))
        }
        _ => Decimal::ZERO,
    }
}

fn installments_to_store(line: &PaymentLine) -> Option<i32> {
    match line.tender {
        TenderType::CreditCard => line.installments.or(Some(1)),
        _ => None,
    }
}

fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: i32, unit_price: Decimal) -> SaleItemLine {
        SaleItemLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    fn cash(amount: Decimal, received: Option<Decimal>) -> PaymentLine {
        PaymentLine {
            tender: TenderType::Cash,
            amount,
            received_amount: received,
            installments: None,
            confirmed: None,
        }
    }

    fn pix(amount: Decimal, confirmed: Option<bool>) -> PaymentLine {
        PaymentLine {
            tender: TenderType::Pix,
            amount,
            received_amount: None,
            installments: None,
            confirmed,
        }
    }

    fn credit(amount: Decimal, installments: Option<i32>) -> PaymentLine {
        PaymentLine {
            tender: TenderType::CreditCard,
            amount,
            received_amount: None,
            installments,
            confirmed: None,
        }
    }

    #[test]
    fn test_compute_totals() {
        // 25.50 x 2 = 51.00
        let (subtotal, discount, total) =
            compute_totals(&[item(2, dec!(25.50))], dec!(0)).unwrap();
        assert_eq!(subtotal, dec!(51.00));
        assert_eq!(discount, dec!(0.00));
        assert_eq!(total, dec!(51.00));
    }

    #[test]
    fn test_compute_totals_with_discount() {
        let (subtotal, discount, total) =
            compute_totals(&[item(3, dec!(10.00)), item(1, dec!(5.25))], dec!(5.25)).unwrap();
        assert_eq!(subtotal, dec!(35.25));
        assert_eq!(discount, dec!(5.25));
        assert_eq!(total, dec!(30.00));
    }

    #[test]
    fn test_discount_above_subtotal_is_rejected() {
        let err = compute_totals(&[item(1, dec!(10.00))], dec!(10.01)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDiscount { .. }));

        let err = compute_totals(&[item(1, dec!(10.00))], dec!(-0.01)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDiscount { .. }));
    }

    #[test]
    fn test_payment_sum_must_match_total() {
        let err =
            validate_payments(&[cash(dec!(40.00), None)], dec!(51.00)).unwrap_err();
        assert!(matches!(err, DomainError::PaymentMismatch { .. }));

        // within one cent passes
        assert!(validate_payments(&[cash(dec!(50.995), None)], dec!(51.00)).is_ok());
    }

    #[test]
    fn test_unconfirmed_pix_is_rejected() {
        // total 100.00 split CASH 40.00 + unconfirmed PIX 60.00
        let payments = vec![cash(dec!(40.00), None), pix(dec!(60.00), None)];
        let err = validate_payments(&payments, dec!(100.00)).unwrap_err();
        assert_eq!(err, DomainError::PixNotConfirmed);

        let payments = vec![cash(dec!(40.00), None), pix(dec!(60.00), Some(false))];
        let err = validate_payments(&payments, dec!(100.00)).unwrap_err();
        assert_eq!(err, DomainError::PixNotConfirmed);

        let payments = vec![cash(dec!(40.00), None), pix(dec!(60.00), Some(true))];
        assert!(validate_payments(&payments, dec!(100.00)).is_ok());
    }

    #[test]
    fn test_cash_received_must_cover_amount() {
        let err = validate_payments(&[cash(dec!(51.00), Some(dec!(50.00)))], dec!(51.00))
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidCashAmount);

        // omitting received_amount means exact payment
        assert!(validate_payments(&[cash(dec!(51.00), None)], dec!(51.00)).is_ok());
    }

    #[test]
    fn test_credit_card_installments_bounds() {
        assert!(validate_payments(&[credit(dec!(30.00), Some(1))], dec!(30.00)).is_ok());
        assert!(validate_payments(&[credit(dec!(30.00), Some(12))], dec!(30.00)).is_ok());

        let err = validate_payments(&[credit(dec!(30.00), Some(0))], dec!(30.00)).unwrap_err();
        assert_eq!(err, DomainError::InvalidInstallments);
        let err = validate_payments(&[credit(dec!(30.00), Some(13))], dec!(30.00)).unwrap_err();
        assert_eq!(err, DomainError::InvalidInstallments);
        let err = validate_payments(&[credit(dec!(30.00), None)], dec!(30.00)).unwrap_err();
        assert_eq!(err, DomainError::InvalidInstallments);
    }

    #[test]
    fn test_aggregate_tender_label() {
        assert_eq!(aggregate_tender(&[cash(dec!(10.00), None)]), TenderGroup::Cash);
        assert_eq!(
            aggregate_tender(&[credit(dec!(10.00), Some(2))]),
            TenderGroup::Card
        );
        assert_eq!(
            aggregate_tender(&[cash(dec!(10.00), None), pix(dec!(5.00), Some(true))]),
            TenderGroup::Mixed
        );
    }

    #[test]
    fn test_cash_change() {
        // paid 51.00, handed 60.00 -> change 9.00
        assert_eq!(cash_change(&cash(dec!(51.00), Some(dec!(60.00)))), dec!(9.00));
        assert_eq!(cash_change(&cash(dec!(51.00), None)), dec!(0.00));
        assert_eq!(cash_change(&pix(dec!(51.00), Some(true))), dec!(0.00));
    }

    #[test]
    fn test_installments_stored_only_for_credit() {
        assert_eq!(installments_to_store(&credit(dec!(10.00), Some(3))), Some(3));
        assert_eq!(installments_to_store(&credit(dec!(10.00), None)), Some(1));
        assert_eq!(installments_to_store(&cash(dec!(10.00), None)), None);
    }
}
