use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Actor,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, OrderStatus, RefundStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::order_status::resolve_authority,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefundDecision {
    Approve,
    Reject,
}

/// Buyer-initiated cancellation and seller/admin adjudication.
///
/// The refund sub-state machine: none → requested → {approved, rejected},
/// approved → completed. Every other edge is rejected.
#[derive(Clone)]
pub struct RefundService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl RefundService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Files a cancellation request on the buyer's own pending order.
    ///
    /// This is a request, not a cancellation: fulfillment status stays
    /// untouched until a seller or admin adjudicates.
    #[instrument(skip(self, reason), fields(order_id = %order_id, buyer_id = %buyer_id))]
    pub async fn request_cancellation(
        &self,
        order_id: Uuid,
        buyer_id: Uuid,
        reason: String,
    ) -> Result<order::Model, ServiceError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "A cancellation reason is required".to_string(),
            ));
        }

        let db = &*self.db;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != buyer_id {
            return Err(ServiceError::Forbidden(
                "You do not own this order".to_string(),
            ));
        }
        if order.refund_status != RefundStatus::None {
            return Err(ServiceError::Conflict(
                "A cancellation has already been requested for this order".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidTransition(
                "This order is already in fulfillment and can no longer be cancelled".to_string(),
            ));
        }

        let updated = self
            .apply(
                &order,
                RefundWrite {
                    refund_status: RefundStatus::Requested,
                    cancellation_reason: Some(reason),
                    ..Default::default()
                },
            )
            .await?;

        info!("Cancellation requested");
        self.emit(Event::CancellationRequested { order_id, buyer_id })
            .await;

        Ok(updated)
    }

    /// Seller/admin decision on a pending cancellation request.
    ///
    /// Approval pairs the refund state with an actual cancellation: the
    /// fulfillment status moves to cancelled and `cancelled_at` is stamped.
    /// Rejection requires a note for the buyer and leaves fulfillment alone.
    #[instrument(skip(self, actor, notes), fields(order_id = %order_id, actor_id = %actor.user_id, decision = ?decision))]
    pub async fn adjudicate(
        &self,
        order_id: Uuid,
        actor: &Actor,
        decision: RefundDecision,
        notes: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        resolve_authority(db, actor, order_id).await?;

        if order.refund_status != RefundStatus::Requested {
            return Err(ServiceError::InvalidTransition(format!(
                "No cancellation request awaiting adjudication (refund status is '{}')",
                order.refund_status
            )));
        }

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let updated = match decision {
            RefundDecision::Approve => {
                if order.status == OrderStatus::Delivered {
                    return Err(ServiceError::InvalidTransition(
                        "A delivered order cannot be cancelled".to_string(),
                    ));
                }
                self.apply(
                    &order,
                    RefundWrite {
                        refund_status: RefundStatus::Approved,
                        status: Some(OrderStatus::Cancelled),
                        cancelled_at: true,
                        seller_notes: notes,
                        ..Default::default()
                    },
                )
                .await?
            }
            RefundDecision::Reject => {
                let notes = notes.ok_or_else(|| {
                    ServiceError::ValidationError(
                        "A reason is required when rejecting a cancellation request".to_string(),
                    )
                })?;
                self.apply(
                    &order,
                    RefundWrite {
                        refund_status: RefundStatus::Rejected,
                        seller_notes: Some(notes),
                        ..Default::default()
                    },
                )
                .await?
            }
        };

        match decision {
            RefundDecision::Approve => {
                info!("Cancellation approved; order cancelled");
                self.emit(Event::RefundApproved(order_id)).await;
                self.emit(Event::OrderCancelled(order_id)).await;
            }
            RefundDecision::Reject => {
                info!("Cancellation rejected; order proceeds");
                self.emit(Event::RefundRejected(order_id)).await;
            }
        }

        Ok(updated)
    }

    /// Marks an approved refund as paid out. Pure bookkeeping: the refund
    /// itself is issued out-of-band.
    #[instrument(skip(self, actor), fields(order_id = %order_id, actor_id = %actor.user_id))]
    pub async fn complete_refund(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        resolve_authority(db, actor, order_id).await?;

        if order.refund_status != RefundStatus::Approved {
            return Err(ServiceError::InvalidTransition(format!(
                "Only an approved refund can be completed (refund status is '{}')",
                order.refund_status
            )));
        }

        let updated = self
            .apply(
                &order,
                RefundWrite {
                    refund_status: RefundStatus::Completed,
                    ..Default::default()
                },
            )
            .await?;

        info!("Refund marked completed");
        self.emit(Event::RefundCompleted(order_id)).await;

        Ok(updated)
    }

    /// Compare-and-swap write of the refund sub-state (and its coupled
    /// fields) guarded by the row version.
    async fn apply(
        &self,
        order: &order::Model,
        write: RefundWrite,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let mut update = OrderEntity::update_many()
            .col_expr(
                order::Column::RefundStatus,
                Expr::value(write.refund_status),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Version.eq(order.version));

        if let Some(status) = write.status {
            update = update.col_expr(order::Column::Status, Expr::value(status));
        }
        if write.cancelled_at {
            update = update.col_expr(order::Column::CancelledAt, Expr::value(Some(now)));
        }
        if let Some(reason) = write.cancellation_reason {
            update = update.col_expr(
                order::Column::CancellationReason,
                Expr::value(Some(reason)),
            );
        }
        if let Some(notes) = write.seller_notes {
            update = update.col_expr(order::Column::SellerNotes, Expr::value(Some(notes)));
        }

        let result = update.exec(db).await?;
        if result.rows_affected == 0 {
            warn!(order_id = %order.id, "Refund write lost an optimistic concurrency race");
            return Err(ServiceError::ConcurrentModification(order.id));
        }

        OrderEntity::find_by_id(order.id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send refund workflow event");
            }
        }
    }
}

#[derive(Default)]
struct RefundWrite {
    refund_status: RefundStatus,
    status: Option<OrderStatus>,
    cancelled_at: bool,
    cancellation_reason: Option<String>,
    seller_notes: Option<String>,
}
