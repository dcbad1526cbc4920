use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::warn;
use uuid::Uuid;

use super::{OrderFilter, OrderStore};
use crate::models::order::{
    AdminNote, Cancellation, Order, OrderPriority, PaymentBreakdown, RefundRequest, StatusChange,
    StatusTransition, VehicleSnapshot,
};
use crate::models::payment::Payment;
use crate::models::profile::ShippingAddress;
use crate::models::vehicle::Pagination;
use crate::utils::errors::{conflict_error, is_unique_violation, not_found_error, AppError, AppResult};

const ORDER_COLUMNS: &str = "id, request_number, user_id, vehicle_id, vehicle_snapshot, \
    payment_breakdown, shipping_method, shipping_address, customer_notes, status, previous_status, \
    status_changed_at, status_changed_by, priority, tags, amount_paid_usd, cancellation, \
    refund_request, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, payment_type, provider, reference, amount_usd, \
    currency, exchange_rate, amount_local, status, created_at, completed_at";

// El estado actual pasa al historial antes de sobrescribirse
const TRANSITION_SQL: &str = r#"
    UPDATE orders SET
        previous_status = previous_status || jsonb_build_array(jsonb_build_object(
            'status', status,
            'changed_at', status_changed_at,
            'changed_by', status_changed_by
        )),
        status = $3,
        status_changed_at = $4,
        status_changed_by = $5,
        cancellation = COALESCE($6, cancellation),
        updated_at = $4
    WHERE id = $1 AND status = $2
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    request_number: String,
    user_id: Uuid,
    vehicle_id: Option<Uuid>,
    vehicle_snapshot: Json<VehicleSnapshot>,
    payment_breakdown: Json<PaymentBreakdown>,
    shipping_method: Option<String>,
    shipping_address: Json<ShippingAddress>,
    customer_notes: Option<String>,
    status: String,
    previous_status: Json<Vec<StatusChange>>,
    status_changed_at: DateTime<Utc>,
    status_changed_by: Option<Uuid>,
    priority: String,
    tags: Vec<String>,
    amount_paid_usd: Decimal,
    cancellation: Option<Json<Cancellation>>,
    refund_request: Option<Json<RefundRequest>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            request_number: row.request_number,
            user_id: row.user_id,
            vehicle_id: row.vehicle_id,
            vehicle_snapshot: row.vehicle_snapshot.0,
            payment_breakdown: row.payment_breakdown.0,
            shipping_method: row
                .shipping_method
                .map(|m| m.parse())
                .transpose()
                .map_err(AppError::Internal)?,
            shipping_address: row.shipping_address.0,
            customer_notes: row.customer_notes,
            status: row.status.parse().map_err(AppError::Internal)?,
            previous_status: row.previous_status.0,
            status_changed_at: row.status_changed_at,
            status_changed_by: row.status_changed_by,
            priority: row.priority.parse().map_err(AppError::Internal)?,
            tags: row.tags,
            amount_paid_usd: row.amount_paid_usd,
            cancellation: row.cancellation.map(|c| c.0),
            refund_request: row.refund_request.map(|r| r.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    payment_type: String,
    provider: String,
    reference: String,
    amount_usd: Decimal,
    currency: String,
    exchange_rate: Decimal,
    amount_local: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            payment_type: row.payment_type.parse().map_err(AppError::Internal)?,
            provider: row.provider,
            reference: row.reference,
            amount_usd: row.amount_usd,
            currency: row.currency,
            exchange_rate: row.exchange_rate,
            amount_local: row.amount_local,
            status: row.status.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NoteRow {
    id: Uuid,
    order_id: Uuid,
    author_id: Uuid,
    body: String,
    is_internal: bool,
    created_at: DateTime<Utc>,
}

impl From<NoteRow> for AdminNote {
    fn from(row: NoteRow) -> Self {
        AdminNote {
            id: row.id,
            order_id: row.order_id,
            author_id: row.author_id,
            body: row.body,
            is_internal: row.is_internal,
            created_at: row.created_at,
        }
    }
}

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ejecutar una transición compare-and-set dentro de una transacción
    async fn transition_in(
        tx: &mut Transaction<'_, Postgres>,
        transition: &StatusTransition,
        cancellation: Option<&Cancellation>,
    ) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{} RETURNING {}", TRANSITION_SQL, ORDER_COLUMNS))
            .bind(transition.order_id)
            .bind(transition.expected.as_str())
            .bind(transition.next.as_str())
            .bind(transition.at)
            .bind(transition.actor)
            .bind(cancellation.map(Json))
            .fetch_optional(&mut **tx)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// Distinguir entre orden inexistente y estado cambiado concurrentemente
    async fn missing_or_stale(&self, order_id: Uuid) -> AppError {
        match self.find_by_id(order_id).await {
            Ok(Some(order)) => {
                warn!("⚠️ Estado de la orden {} cambió concurrentemente ({})", order_id, order.status);
                AppError::Conflict(format!(
                    "Order {} changed concurrently (now {})",
                    order_id, order.status
                ))
            }
            Ok(None) => not_found_error("Order", &order_id.to_string()),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, request_number, user_id, vehicle_id, vehicle_snapshot, payment_breakdown,
                shipping_method, shipping_address, customer_notes, status, previous_status,
                status_changed_at, status_changed_by, priority, tags, amount_paid_usd,
                cancellation, refund_request, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    NULL, NULL, $17, $18)
            "#,
        )
        .bind(order.id)
        .bind(&order.request_number)
        .bind(order.user_id)
        .bind(order.vehicle_id)
        .bind(Json(&order.vehicle_snapshot))
        .bind(Json(&order.payment_breakdown))
        .bind(order.shipping_method.map(|m| m.as_str()))
        .bind(Json(&order.shipping_address))
        .bind(&order.customer_notes)
        .bind(order.status.as_str())
        .bind(Json(&order.previous_status))
        .bind(order.status_changed_at)
        .bind(order.status_changed_by)
        .bind(order.priority.as_str())
        .bind(&order.tags)
        .bind(order.amount_paid_usd)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                conflict_error("Order", "request number", &order.request_number)
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = ANY($1)",
            ORDER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list(&self, filter: &OrderFilter, pagination: Pagination) -> AppResult<(Vec<Order>, i64)> {
        fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
            qb.push(" WHERE TRUE");
            if let Some(user_id) = filter.user_id {
                qb.push(" AND user_id = ").push_bind(user_id);
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
        }

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_where(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        push_where(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;
        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn transition(
        &self,
        transition: &StatusTransition,
        cancellation: Option<&Cancellation>,
    ) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let updated = Self::transition_in(&mut tx, transition, cancellation).await?;
        match updated {
            Some(order) => {
                tx.commit().await?;
                Ok(order)
            }
            None => {
                tx.rollback().await?;
                Err(self.missing_or_stale(transition.order_id).await)
            }
        }
    }

    async fn apply_batch(&self, transitions: &[StatusTransition]) -> AppResult<Vec<Order>> {
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(transitions.len());

        for transition in transitions {
            match Self::transition_in(&mut tx, transition, None).await? {
                Some(order) => updated.push(order),
                None => {
                    tx.rollback().await?;
                    warn!("⚠️ Lote revertido: la orden {} ya no está en {}", transition.order_id, transition.expected);
                    return Err(self.missing_or_stale(transition.order_id).await);
                }
            }
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn set_refund_request(&self, order_id: Uuid, request: &RefundRequest) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET refund_request = $2, updated_at = $3 \
             WHERE id = $1 AND refund_request IS NULL RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(Json(request))
        .bind(request.requested_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.find_by_id(order_id).await? {
                Some(_) => Err(AppError::Conflict(format!(
                    "A refund has already been requested for order {}",
                    order_id
                ))),
                None => Err(not_found_error("Order", &order_id.to_string())),
            },
        }
    }

    async fn set_priority(&self, order_id: Uuid, priority: OrderPriority) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET priority = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(priority.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found_error("Order", &order_id.to_string()))?;

        row.try_into()
    }

    async fn set_tags(&self, order_id: Uuid, tags: &[String]) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET tags = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(tags)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found_error("Order", &order_id.to_string()))?;

        row.try_into()
    }

    async fn add_note(&self, note: &AdminNote) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO order_notes (id, order_id, author_id, body, is_internal, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(note.id)
        .bind(note.order_id)
        .bind(note.author_id)
        .bind(&note.body)
        .bind(note.is_internal)
        .bind(note.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notes(&self, order_id: Uuid, include_internal: bool) -> AppResult<Vec<AdminNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT id, order_id, author_id, body, is_internal, created_at FROM order_notes \
             WHERE order_id = $1 AND ($2 OR NOT is_internal) ORDER BY created_at ASC",
        )
        .bind(order_id)
        .bind(include_internal)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AdminNote::from).collect())
    }

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, user_id, payment_type, provider, reference, amount_usd,
                currency, exchange_rate, amount_local, status, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.user_id)
        .bind(payment.payment_type.as_str())
        .bind(&payment.provider)
        .bind(&payment.reference)
        .bind(payment.amount_usd)
        .bind(&payment.currency)
        .bind(payment.exchange_rate)
        .bind(payment.amount_local)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                conflict_error("Payment", "reference", &payment.reference)
            } else {
                AppError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn find_payment_by_reference(&self, reference: &str) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE reference = $1",
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Payment::try_from).transpose()
    }

    async fn list_payments(&self, order_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        completed_at: DateTime<Utc>,
        amount_usd: Decimal,
        transition: Option<&StatusTransition>,
    ) -> AppResult<(Payment, Order)> {
        let mut tx = self.pool.begin().await?;

        let payment_row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE payments SET status = 'COMPLETED', completed_at = $2 \
             WHERE id = $1 AND status = 'PENDING' RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment_row) = payment_row else {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!("Payment {} is no longer pending", payment_id)));
        };
        let payment = Payment::try_from(payment_row)?;

        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET amount_paid_usd = amount_paid_usd + $2, updated_at = $3 \
             WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(payment.order_id)
        .bind(amount_usd)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order_row) = order_row else {
            tx.rollback().await?;
            return Err(not_found_error("Order", &payment.order_id.to_string()));
        };
        let mut order = Order::try_from(order_row)?;

        if let Some(transition) = transition {
            match Self::transition_in(&mut tx, transition, None).await? {
                Some(updated) => order = updated,
                None => {
                    tx.rollback().await?;
                    return Err(self.missing_or_stale(transition.order_id).await);
                }
            }
        }

        tx.commit().await?;
        Ok((payment, order))
    }
}
