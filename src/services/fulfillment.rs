use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Actor,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    errors::ServiceError,
    events::EventSender,
    services::order_status::{resolve_authority, OrderStatusService},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTrackingRequest {
    pub tracking_number: Option<String>,
    pub seller_notes: Option<String>,
}

/// Per-order result of a bulk status update.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkStatusOutcome {
    pub order_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Seller-facing mutations layered on the order state machine.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DbPool>,
    status: OrderStatusService,
}

impl FulfillmentService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        let status = OrderStatusService::new(db.clone(), event_sender);
        Self { db, status }
    }

    /// Advances (or, for admins, forces) an order's fulfillment status.
    pub async fn update_status(
        &self,
        order_id: Uuid,
        actor: &Actor,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        self.status.update_status(order_id, actor, new_status).await
    }

    /// Sets tracking number and/or seller notes. Allowed at any status for
    /// the owning seller or an admin; the fulfillment status is untouched.
    #[instrument(skip(self, actor, request), fields(order_id = %order_id, actor_id = %actor.user_id))]
    pub async fn update_tracking(
        &self,
        order_id: Uuid,
        actor: &Actor,
        request: UpdateTrackingRequest,
    ) -> Result<order::Model, ServiceError> {
        if request.tracking_number.is_none() && request.seller_notes.is_none() {
            return Err(ServiceError::ValidationError(
                "Nothing to update: provide a tracking number or seller notes".to_string(),
            ));
        }

        let db = &*self.db;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        resolve_authority(db, actor, order_id).await?;

        let current_version = order.version;
        let mut active: order::ActiveModel = order.into();
        if let Some(tracking) = request.tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        if let Some(notes) = request.seller_notes {
            active.seller_notes = Set(Some(notes));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(current_version + 1);

        let updated = active.update(db).await?;

        info!("Order tracking details updated");
        Ok(updated)
    }

    /// Applies one target status across many orders.
    ///
    /// Each order goes through the same guard independently; one failure
    /// never rolls back the others, and every id gets its own outcome.
    #[instrument(skip(self, actor, order_ids), fields(count = order_ids.len(), new_status = %new_status))]
    pub async fn bulk_update_status(
        &self,
        order_ids: Vec<Uuid>,
        actor: &Actor,
        new_status: OrderStatus,
    ) -> Result<Vec<BulkStatusOutcome>, ServiceError> {
        if order_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "No order ids provided".to_string(),
            ));
        }

        let mut outcomes = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            match self.status.update_status(order_id, actor, new_status).await {
                Ok(order) => outcomes.push(BulkStatusOutcome {
                    order_id,
                    success: true,
                    status: Some(order.status),
                    error: None,
                }),
                Err(e) => outcomes.push(BulkStatusOutcome {
                    order_id,
                    success: false,
                    status: None,
                    error: Some(e.response_message()),
                }),
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(succeeded, total = outcomes.len(), "Bulk status update finished");

        Ok(outcomes)
    }
}
