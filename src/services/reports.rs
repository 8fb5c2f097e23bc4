use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        store::{self, Entity as StoreEntity},
    },
    errors::ServiceError,
    services::orders::{filter_condition, OrderFilters},
};

const TOP_PRODUCTS_LIMIT: usize = 5;
const TRAILING_MONTHS: i64 = 12;

/// Whose orders a CSV export covers.
#[derive(Debug, Clone, Copy)]
pub enum ExportScope {
    Buyer(Uuid),
    Seller(Uuid),
    All,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: Decimal,
    pub orders: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SellerAnalytics {
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub completed_orders: i64,
    pub pending_orders: i64,
    pub cancelled_orders: i64,
    pub average_order_value: Decimal,
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlatformStats {
    pub total_orders: i64,
    pub orders_by_status: HashMap<String, i64>,
    pub total_revenue: Decimal,
    pub open_refund_requests: i64,
}

/// Read-only projections over the committed order/order-item stream.
///
/// Every figure is recomputed from rows on demand; there is no hidden
/// state, so the projector can always be rebuilt from source data.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Revenue, order counts and product rankings for one seller.
    #[instrument(skip(self), fields(seller_id = %seller_id))]
    pub async fn seller_analytics(
        &self,
        seller_id: Uuid,
    ) -> Result<SellerAnalytics, ServiceError> {
        let db = &*self.db;

        let store_ids: Vec<Uuid> = StoreEntity::find()
            .filter(store::Column::OwnerId.eq(seller_id))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let items = if store_ids.is_empty() {
            Vec::new()
        } else {
            OrderItemEntity::find()
                .filter(order_item::Column::StoreId.is_in(store_ids))
                .all(db)
                .await?
        };

        let order_ids: HashSet<Uuid> = items.iter().map(|i| i.order_id).collect();
        let orders = if order_ids.is_empty() {
            Vec::new()
        } else {
            OrderEntity::find()
                .filter(order::Column::Id.is_in(order_ids))
                .all(db)
                .await?
        };

        let analytics = aggregate_seller_analytics(&orders, &items, Utc::now());
        info!(
            total_orders = analytics.total_orders,
            "Seller analytics computed"
        );
        Ok(analytics)
    }

    /// Platform-wide order and revenue totals for the admin dashboard.
    #[instrument(skip(self))]
    pub async fn platform_stats(&self) -> Result<PlatformStats, ServiceError> {
        let db = &*self.db;
        let orders = OrderEntity::find().all(db).await?;
        Ok(aggregate_platform_stats(&orders))
    }

    /// Flattened CSV export of the filtered order set.
    ///
    /// Columns, in stable order: order id, date, status, total, item count.
    #[instrument(skip(self, filters))]
    pub async fn export_csv(
        &self,
        scope: ExportScope,
        filters: &OrderFilters,
    ) -> Result<String, ServiceError> {
        let db = &*self.db;

        let orders = match scope {
            ExportScope::Buyer(buyer_id) => {
                OrderEntity::find()
                    .filter(order::Column::UserId.eq(buyer_id))
                    .filter(filter_condition(filters))
                    .all(db)
                    .await?
            }
            ExportScope::Seller(seller_id) => {
                let store_ids: Vec<Uuid> = StoreEntity::find()
                    .filter(store::Column::OwnerId.eq(seller_id))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
                if store_ids.is_empty() {
                    Vec::new()
                } else {
                    let order_ids: HashSet<Uuid> = OrderItemEntity::find()
                        .filter(order_item::Column::StoreId.is_in(store_ids))
                        .all(db)
                        .await?
                        .into_iter()
                        .map(|i| i.order_id)
                        .collect();
                    OrderEntity::find()
                        .filter(order::Column::Id.is_in(order_ids))
                        .filter(filter_condition(filters))
                        .all(db)
                        .await?
                }
            }
            ExportScope::All => {
                OrderEntity::find()
                    .filter(filter_condition(filters))
                    .all(db)
                    .await?
            }
        };

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = if order_ids.is_empty() {
            Vec::new()
        } else {
            OrderItemEntity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(db)
                .await?
        };

        let mut item_counts: HashMap<Uuid, i64> = HashMap::new();
        for item in &items {
            *item_counts.entry(item.order_id).or_insert(0) += 1;
        }

        Ok(render_csv(&orders, &item_counts))
    }
}

/// Aggregates one seller's view from raw rows.
///
/// `items` must already be scoped to the seller's stores; `orders` is the
/// set of orders those items belong to. Items whose order is missing from
/// that set are skipped rather than failing the whole aggregation.
pub fn aggregate_seller_analytics(
    orders: &[order::Model],
    items: &[order_item::Model],
    now: DateTime<Utc>,
) -> SellerAnalytics {
    let orders_by_id: HashMap<Uuid, &order::Model> =
        orders.iter().map(|o| (o.id, o)).collect();

    let mut total_revenue = Decimal::ZERO;
    let mut completed_orders = 0i64;
    let mut pending_orders = 0i64;
    let mut cancelled_orders = 0i64;
    let mut revenue_per_order: HashMap<Uuid, Decimal> = HashMap::new();
    let mut monthly: HashMap<String, (Decimal, HashSet<Uuid>)> = HashMap::new();
    let mut products: HashMap<Uuid, (String, i64, Decimal)> = HashMap::new();

    for o in orders {
        match o.status {
            OrderStatus::Delivered => completed_orders += 1,
            OrderStatus::Pending => pending_orders += 1,
            OrderStatus::Cancelled => cancelled_orders += 1,
            _ => {}
        }
    }

    let month_floor = now - Duration::days(31 * TRAILING_MONTHS);

    for item in items {
        let Some(o) = orders_by_id.get(&item.order_id) else {
            // Orphaned row; exclude it instead of failing the report.
            continue;
        };
        if o.status == OrderStatus::Cancelled {
            continue;
        }

        let line_revenue = item.price_at_time * Decimal::from(item.quantity);
        total_revenue += line_revenue;
        *revenue_per_order.entry(o.id).or_insert(Decimal::ZERO) += line_revenue;

        if o.created_at >= month_floor {
            let key = month_key(o.created_at);
            let entry = monthly
                .entry(key)
                .or_insert_with(|| (Decimal::ZERO, HashSet::new()));
            entry.0 += line_revenue;
            entry.1.insert(o.id);
        }

        let entry = products.entry(item.product_id).or_insert_with(|| {
            (item.product_name.clone(), 0, Decimal::ZERO)
        });
        entry.1 += i64::from(item.quantity);
        entry.2 += line_revenue;
    }

    let revenue_order_count = revenue_per_order.len() as i64;
    let average_order_value = if revenue_order_count > 0 {
        total_revenue / Decimal::from(revenue_order_count)
    } else {
        Decimal::ZERO
    };

    let mut revenue_by_month: Vec<MonthlyRevenue> = monthly
        .into_iter()
        .map(|(month, (revenue, order_ids))| MonthlyRevenue {
            month,
            revenue,
            orders: order_ids.len() as i64,
        })
        .collect();
    revenue_by_month.sort_by(|a, b| a.month.cmp(&b.month));

    let mut top_products: Vec<TopProduct> = products
        .into_iter()
        .map(|(product_id, (product_name, quantity_sold, revenue))| TopProduct {
            product_id,
            product_name,
            quantity_sold,
            revenue,
        })
        .collect();
    top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    top_products.truncate(TOP_PRODUCTS_LIMIT);

    SellerAnalytics {
        total_revenue,
        total_orders: orders.len() as i64,
        completed_orders,
        pending_orders,
        cancelled_orders,
        average_order_value,
        revenue_by_month,
        top_products,
    }
}

pub fn aggregate_platform_stats(orders: &[order::Model]) -> PlatformStats {
    let mut orders_by_status: HashMap<String, i64> = HashMap::new();
    let mut total_revenue = Decimal::ZERO;
    let mut open_refund_requests = 0i64;

    for o in orders {
        *orders_by_status.entry(o.status.to_string()).or_insert(0) += 1;
        if o.status != OrderStatus::Cancelled {
            total_revenue += o.total_amount;
        }
        if o.refund_status == crate::entities::order::RefundStatus::Requested {
            open_refund_requests += 1;
        }
    }

    PlatformStats {
        total_orders: orders.len() as i64,
        orders_by_status,
        total_revenue,
        open_refund_requests,
    }
}

fn month_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// RFC-4180-ish field quoting: only fields containing separators, quotes or
/// newlines get wrapped.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_csv(orders: &[order::Model], item_counts: &HashMap<Uuid, i64>) -> String {
    let mut out = String::from("order_id,date,status,total,item_count\n");
    for o in orders {
        let count = item_counts.get(&o.id).copied().unwrap_or(0);
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_escape(&o.id.to_string()),
            csv_escape(&o.created_at.to_rfc3339()),
            csv_escape(&o.status.to_string()),
            csv_escape(&o.total_amount.to_string()),
            count
        ));
    }
    out
}
