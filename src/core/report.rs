//! Report generation business logic.
//!
//! Read-only aggregates over orders and carts for an admin surface. All functions return
//! structured data; formatting is left to the caller.

use crate::{
    core::cart,
    entities::{Order, OrderItem, OrderStatus, order},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, Iterable, PaginatorTrait, QueryOrder, prelude::*};
use std::collections::{BTreeMap, HashMap};

/// Number of orders currently in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    /// The status
    pub status: OrderStatus,
    /// Orders in that status
    pub count: u64,
}

/// Revenue booked on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRevenue {
    /// Order date
    pub date: NaiveDate,
    /// Sum of `total_amount` of that day's orders
    pub revenue: f64,
    /// Orders that contributed
    pub order_count: u64,
}

/// Units sold of one product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductSales {
    /// Product id
    pub product_id: i64,
    /// Units across all non-cancelled orders
    pub units: i64,
    /// Revenue at the order line prices
    pub revenue: f64,
}

/// Snapshot of the store for a dashboard.
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    /// Active carts
    pub active_carts: u64,
    /// Order count per status, every status present
    pub status_counts: Vec<StatusCount>,
    /// Orders placed in the recent window
    pub recent_orders: u64,
}

/// Counts orders per status. Every status is present, zero-filled.
pub async fn order_status_counts(db: &DatabaseConnection) -> Result<Vec<StatusCount>> {
    let mut counts = Vec::new();

    for status in OrderStatus::iter() {
        let count = Order::find()
            .filter(order::Column::Status.eq(status))
            .count(db)
            .await?;
        counts.push(StatusCount { status, count });
    }

    Ok(counts)
}

/// Revenue per order date in `[start, end]`, ascending. Cancelled orders are excluded.
///
/// # Errors
/// Returns `InvalidArgument` if `start` is after `end`.
pub async fn revenue_by_date(
    db: &DatabaseConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyRevenue>> {
    if start > end {
        return Err(Error::InvalidArgument {
            message: format!("Start date {start} is after end date {end}"),
        });
    }

    let orders = Order::find()
        .filter(order::Column::OrderDate.gte(start))
        .filter(order::Column::OrderDate.lte(end))
        .filter(order::Column::Status.ne(OrderStatus::Cancelled))
        .order_by_asc(order::Column::OrderDate)
        .all(db)
        .await?;

    let mut by_date: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
    for placed in orders {
        let entry = by_date.entry(placed.order_date).or_default();
        entry.0 += placed.total_amount;
        entry.1 += 1;
    }

    Ok(by_date
        .into_iter()
        .map(|(date, (revenue, order_count))| DailyRevenue {
            date,
            revenue,
            order_count,
        })
        .collect())
}

/// Best sellers by units, excluding cancelled orders. Ties break on product id.
pub async fn top_selling_products(
    db: &DatabaseConnection,
    limit: usize,
) -> Result<Vec<ProductSales>> {
    let lines = OrderItem::find().find_also_related(Order).all(db).await?;

    let mut totals: HashMap<i64, ProductSales> = HashMap::new();
    for (line, parent) in lines {
        if parent.is_some_and(|placed| placed.status == OrderStatus::Cancelled) {
            continue;
        }
        let entry = totals.entry(line.product_id).or_insert(ProductSales {
            product_id: line.product_id,
            units: 0,
            revenue: 0.0,
        });
        entry.units += i64::from(line.quantity);
        entry.revenue += line.total_price();
    }

    let mut ranked: Vec<ProductSales> = totals.into_values().collect();
    ranked.sort_by(|a, b| {
        b.units
            .cmp(&a.units)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(limit);

    Ok(ranked)
}

/// Builds the dashboard snapshot. `recent_since` bounds the recent-order window.
pub async fn dashboard_summary(
    db: &DatabaseConnection,
    recent_since: NaiveDate,
) -> Result<DashboardSummary> {
    let active_carts = cart::count_active_carts(db).await?;
    let status_counts = order_status_counts(db).await?;
    let recent_orders = Order::find()
        .filter(order::Column::OrderDate.gte(recent_since))
        .count(db)
        .await?;

    Ok(DashboardSummary {
        active_carts,
        status_counts,
        recent_orders,
    })
}

/// Formats a money amount with two decimals, e.g. `$35.00`.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${amount:.2}")
    }
}
