use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
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
    services::order_status::seller_owns_order,
};

/// Filters shared by the buyer and seller listings.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct OrderFilters {
    /// Order id (full UUID) or a shipping-address fragment.
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read side of the order workflow.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Fetches the order aggregate, enforcing visibility: buyers see their
    /// own orders, sellers see orders carrying their items, admins see all.
    #[instrument(skip(self, actor), fields(order_id = %order_id, actor_id = %actor.user_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> Result<OrderWithItems, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let visible = actor.is_admin()
            || order.user_id == actor.user_id
            || (actor.has_role(Role::Seller)
                && seller_owns_order(db, actor.user_id, order_id).await?);

        if !visible {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Buyer's own orders, newest first.
    #[instrument(skip(self, filters), fields(buyer_id = %buyer_id))]
    pub async fn list_orders(
        &self,
        buyer_id: Uuid,
        filters: &OrderFilters,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListPage, ServiceError> {
        let query = OrderEntity::find()
            .filter(order::Column::UserId.eq(buyer_id))
            .filter(filter_condition(filters));

        self.paginate(query, page, per_page).await
    }

    /// Orders containing at least one item from one of the seller's stores.
    #[instrument(skip(self, filters), fields(seller_id = %seller_id))]
    pub async fn list_seller_orders(
        &self,
        seller_id: Uuid,
        filters: &OrderFilters,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListPage, ServiceError> {
        let db = &*self.db;

        let store_ids: Vec<Uuid> = StoreEntity::find()
            .filter(store::Column::OwnerId.eq(seller_id))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        if store_ids.is_empty() {
            return Ok(OrderListPage {
                orders: Vec::new(),
                total: 0,
                page,
                per_page,
            });
        }

        let order_ids: HashSet<Uuid> = OrderItemEntity::find()
            .filter(order_item::Column::StoreId.is_in(store_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|item| item.order_id)
            .collect();

        let query = OrderEntity::find()
            .filter(order::Column::Id.is_in(order_ids))
            .filter(filter_condition(filters));

        self.paginate(query, page, per_page).await
    }

    async fn paginate(
        &self,
        query: sea_orm::Select<OrderEntity>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListPage, ServiceError> {
        let db = &*self.db;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        info!(total, page, returned = orders.len(), "Orders listed");

        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }
}

pub(crate) fn filter_condition(filters: &OrderFilters) -> Condition {
    let mut condition = Condition::all();

    if let Some(status) = filters.status {
        condition = condition.add(order::Column::Status.eq(status));
    }
    if let Some(from) = filters.date_from {
        condition = condition.add(order::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filters.date_to {
        condition = condition.add(order::Column::CreatedAt.lte(to));
    }
    if let Some(search) = filters.search.as_deref() {
        let search = search.trim();
        if !search.is_empty() {
            if let Ok(id) = Uuid::parse_str(search) {
                condition = condition.add(order::Column::Id.eq(id));
            } else {
                condition =
                    condition.add(order::Column::ShippingAddress.contains(search));
            }
        }
    }

    condition
}
