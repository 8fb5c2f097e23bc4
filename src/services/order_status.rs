use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{Actor, Role},
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        store::{self, Entity as StoreEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// How the caller is allowed to drive the status machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusAuthority {
    /// Store owner of at least one item on the order: forward moves and
    /// early cancellation only.
    Seller,
    /// May force any status on a non-terminal order, including backward.
    Admin,
}

/// Whether `from → to` is legal for the given authority.
///
/// Terminal states (delivered, cancelled) are frozen for everyone, and a
/// same-status write is rejected rather than silently accepted.
pub fn is_valid_transition(authority: StatusAuthority, from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() || from == to {
        return false;
    }
    match authority {
        StatusAuthority::Admin => true,
        StatusAuthority::Seller => match (from.sequence(), to.sequence()) {
            (Some(f), Some(t)) => t > f,
            // Forward path -> cancelled, only before fulfillment is underway.
            (Some(_), None) => matches!(from, OrderStatus::Pending | OrderStatus::Processing),
            (None, _) => false,
        },
    }
}

/// True when `seller_id` owns a store with at least one item on the order.
pub async fn seller_owns_order<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
    order_id: Uuid,
) -> Result<bool, ServiceError> {
    let store_ids: Vec<Uuid> = StoreEntity::find()
        .filter(store::Column::OwnerId.eq(seller_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    if store_ids.is_empty() {
        return Ok(false);
    }

    let matching = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .filter(order_item::Column::StoreId.is_in(store_ids))
        .count(conn)
        .await?;

    Ok(matching > 0)
}

/// Resolve the caller's authority over one order, or fail with a
/// role-specific forbidden error.
pub async fn resolve_authority<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    order_id: Uuid,
) -> Result<StatusAuthority, ServiceError> {
    if actor.is_admin() {
        return Ok(StatusAuthority::Admin);
    }
    if actor.has_role(Role::Seller) {
        if seller_owns_order(conn, actor.user_id, order_id).await? {
            return Ok(StatusAuthority::Seller);
        }
        return Err(ServiceError::Forbidden(
            "None of your stores have items on this order".to_string(),
        ));
    }
    Err(ServiceError::Forbidden(
        "Only sellers and admins may update order status".to_string(),
    ))
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order to `new_status` after validating the caller's
    /// authority and the transition itself.
    ///
    /// The write is an optimistic compare-and-swap on the row version, so a
    /// concurrent seller update and admin override cannot silently clobber
    /// each other; the loser sees a conflict and retries.
    #[instrument(skip(self, actor), fields(order_id = %order_id, new_status = %new_status, actor_id = %actor.user_id))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        actor: &Actor,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let authority = resolve_authority(db, actor, order_id).await?;
        let old_status = order.status;

        if !is_valid_transition(authority, old_status, new_status) {
            warn!(
                old_status = %old_status,
                "Rejected status transition"
            );
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move order from '{}' to '{}'",
                old_status, new_status
            )));
        }

        let now = Utc::now();
        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Version.eq(order.version));

        if new_status == OrderStatus::Cancelled {
            update = update.col_expr(order::Column::CancelledAt, Expr::value(Some(now)));
        }

        let result = update.exec(db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        let updated = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        info!(
            old_status = %old_status,
            "Order status updated"
        );

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                })
                .await
            {
                warn!(error = %e, "Failed to send order status changed event");
            }
            if new_status == OrderStatus::Cancelled {
                if let Err(e) = sender.send(Event::OrderCancelled(order_id)).await {
                    warn!(error = %e, "Failed to send order cancelled event");
                }
            }
        }

        Ok(updated)
    }
}
