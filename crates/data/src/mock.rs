//! Deterministic in-memory store used when `executor.mode = "mock"`.
//!
//! The dataset is generated from a fixed seed and anchored at a reference
//! date, so the same seed and date always produce the same orders. Queries are
//! answered from the classified intent rather than by parsing the query text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use storesight_core::{
    Category, DataExecutor, ExecutorError, Intent, Metric, Row, StoreContext,
};
use tracing::debug;

const HISTORY_DAYS: u64 = 90;
const RECENT_DAYS: u64 = 30;

struct ProductSeed {
    title: &'static str,
    sku: &'static str,
    price_cents: i64,
    stock: i64,
}

const PRODUCT_SEEDS: &[ProductSeed] = &[
    ProductSeed { title: "Wireless Bluetooth Headphones", sku: "WBH-001", price_cents: 7_999, stock: 45 },
    ProductSeed { title: "Organic Cotton T-Shirt", sku: "OCT-001", price_cents: 2_999, stock: 15 },
    ProductSeed { title: "Stainless Steel Water Bottle", sku: "SSWB-001", price_cents: 2_499, stock: 78 },
    ProductSeed { title: "Yoga Mat Pro", sku: "YMP-001", price_cents: 4_999, stock: 22 },
    ProductSeed { title: "Smart Watch Series 5", sku: "SWS5-001", price_cents: 29_999, stock: 12 },
    ProductSeed { title: "Leather Laptop Bag", sku: "LLB-001", price_cents: 8_999, stock: 34 },
    ProductSeed { title: "Portable Phone Charger", sku: "PPC-001", price_cents: 3_499, stock: 56 },
    ProductSeed { title: "Bamboo Sunglasses", sku: "BS-001", price_cents: 5_999, stock: 28 },
    ProductSeed { title: "Ceramic Coffee Mug Set", sku: "CCMS-001", price_cents: 3_999, stock: 41 },
    ProductSeed { title: "Fitness Resistance Bands", sku: "FRB-001", price_cents: 1_999, stock: 67 },
];

const CUSTOMER_NAMES: &[&str] = &[
    "Sarah Johnson",
    "Michael Chen",
    "Emily Davis",
    "James Wilson",
    "Lisa Anderson",
    "David Martinez",
    "Jennifer Taylor",
    "Robert Brown",
    "Maria Garcia",
    "William Lee",
    "Amanda White",
    "Christopher Moore",
    "Jessica Thomas",
    "Daniel Jackson",
    "Ashley Harris",
    "Matthew Martin",
    "Stephanie Thompson",
    "Andrew Robinson",
    "Michelle Clark",
    "Kevin Lewis",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockProduct {
    pub product_id: i64,
    pub title: String,
    pub sku: String,
    pub price_cents: i64,
    pub available: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockCustomer {
    pub customer_id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockOrder {
    pub order_id: i64,
    pub product_id: i64,
    pub customer_id: i64,
    pub quantity: i64,
    pub total_price_cents: i64,
    pub created_at: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockDataset {
    pub anchor: NaiveDate,
    pub products: Vec<MockProduct>,
    pub customers: Vec<MockCustomer>,
    pub orders: Vec<MockOrder>,
}

impl MockDataset {
    pub fn generate(seed: u64, anchor: NaiveDate) -> Self {
        let products = PRODUCT_SEEDS
            .iter()
            .zip(1..)
            .map(|(seed, product_id)| MockProduct {
                product_id,
                title: seed.title.to_string(),
                sku: seed.sku.to_string(),
                price_cents: seed.price_cents,
                available: seed.stock,
            })
            .collect::<Vec<_>>();

        let customers = CUSTOMER_NAMES
            .iter()
            .zip(1..)
            .map(|(name, customer_id)| MockCustomer {
                customer_id,
                name: (*name).to_string(),
                email: format!("{}@email.com", name.to_ascii_lowercase().replace(' ', ".")),
            })
            .collect::<Vec<_>>();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut orders = Vec::new();
        for days_ago in 0..HISTORY_DAYS {
            let Some(created_at) = anchor.checked_sub_days(Days::new(days_ago)) else {
                break;
            };
            let daily_orders =
                if days_ago < RECENT_DAYS { rng.gen_range(3..=8) } else { rng.gen_range(1..=4) };

            for _ in 0..daily_orders {
                let product = &products[rng.gen_range(0..products.len())];
                let customer = &customers[rng.gen_range(0..customers.len())];
                let quantity = rng.gen_range(1..=3_i64);
                orders.push(MockOrder {
                    order_id: orders.len() as i64 + 1,
                    product_id: product.product_id,
                    customer_id: customer.customer_id,
                    quantity,
                    total_price_cents: product.price_cents * quantity,
                    created_at,
                });
            }
        }

        Self { anchor, products, customers, orders }
    }

    /// Catalog and customers without any order history.
    pub fn without_orders(anchor: NaiveDate) -> Self {
        Self { orders: Vec::new(), ..Self::generate(0, anchor) }
    }

    fn product(&self, product_id: i64) -> Option<&MockProduct> {
        self.products.iter().find(|product| product.product_id == product_id)
    }

    fn customer(&self, customer_id: i64) -> Option<&MockCustomer> {
        self.customers.iter().find(|customer| customer.customer_id == customer_id)
    }

    /// Orders inside `[anchor - days, anchor]`, both ends inclusive.
    fn orders_within(&self, days: u32) -> impl Iterator<Item = &MockOrder> {
        let start =
            self.anchor.checked_sub_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MIN);
        let end = self.anchor;
        self.orders.iter().filter(move |order| order.created_at >= start && order.created_at <= end)
    }

    fn product_orders(&self, days: u32, entities: &[String]) -> Vec<(&MockOrder, &MockProduct)> {
        self.orders_within(days)
            .filter_map(|order| self.product(order.product_id).map(|product| (order, product)))
            .filter(|(_, product)| matches_entities(&product.title, entities))
            .collect()
    }

    pub fn top_products(&self, days: u32, entities: &[String], limit: usize) -> Vec<Row> {
        let mut totals: BTreeMap<i64, (&MockProduct, i64, i64)> = BTreeMap::new();
        for (order, product) in self.product_orders(days, entities) {
            let entry = totals.entry(product.product_id).or_insert((product, 0, 0));
            entry.1 += order.quantity;
            entry.2 += order.total_price_cents;
        }

        let mut ranked = totals.into_values().collect::<Vec<_>>();
        ranked.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.product_id.cmp(&right.0.product_id)));

        ranked
            .into_iter()
            .take(limit)
            .map(|(product, total_sold, revenue_cents)| {
                row(json!({
                    "product_id": product.product_id,
                    "product_title": product.title,
                    "total_sold": total_sold,
                    "revenue": cents(revenue_cents),
                }))
            })
            .collect()
    }

    pub fn sales_summary(&self, days: u32, entities: &[String]) -> Vec<Row> {
        let mut daily: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for (order, _) in self.product_orders(days, entities) {
            let entry = daily.entry(order.created_at).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += order.total_price_cents;
        }

        daily
            .into_iter()
            .rev()
            .map(|(date, (order_count, revenue_cents))| {
                row(json!({
                    "order_date": date.to_string(),
                    "order_count": order_count,
                    "total_revenue": cents(revenue_cents),
                }))
            })
            .collect()
    }

    pub fn sales_velocity(&self, days: u32, entities: &[String]) -> Vec<Row> {
        let mut totals: BTreeMap<i64, (&MockProduct, i64)> = BTreeMap::new();
        for (order, product) in self.product_orders(days, entities) {
            totals.entry(product.product_id).or_insert((product, 0)).1 += order.quantity;
        }

        totals
            .into_values()
            .map(|(product, total_sold)| {
                row(json!({
                    "product_id": product.product_id,
                    "product_title": product.title,
                    "current_stock": product.available,
                    "total_sold": total_sold,
                    "avg_daily_sales": total_sold as f64 / f64::from(days.max(1)),
                }))
            })
            .collect()
    }

    pub fn stockout_risks(&self, days: u32, horizon_days: u32, entities: &[String]) -> Vec<Row> {
        let mut at_risk = self
            .sales_velocity(days, entities)
            .into_iter()
            .filter_map(|mut row| {
                let stock = row.get("current_stock").and_then(Value::as_f64)?;
                let daily = row.get("avg_daily_sales").and_then(Value::as_f64)?;
                if daily <= 0.0 {
                    return None;
                }
                let cover = stock / daily;
                if cover > f64::from(horizon_days) {
                    return None;
                }
                row.remove("total_sold");
                row.insert("days_of_cover".to_string(), json!(cover));
                Some((cover, row))
            })
            .collect::<Vec<_>>();

        at_risk.sort_by(|left, right| left.0.total_cmp(&right.0));
        at_risk.into_iter().map(|(_, row)| row).collect()
    }

    pub fn inventory_levels(&self, entities: &[String]) -> Vec<Row> {
        self.products
            .iter()
            .filter(|product| matches_entities(&product.title, entities))
            .map(|product| {
                row(json!({
                    "product_id": product.product_id,
                    "product_title": product.title,
                    "sku": product.sku,
                    "available": product.available,
                }))
            })
            .collect()
    }

    pub fn customer_totals(&self, days: u32, entities: &[String], min_orders: i64) -> Vec<Row> {
        let mut totals: BTreeMap<i64, (&MockCustomer, i64, i64)> = BTreeMap::new();
        for order in self.orders_within(days) {
            let Some(customer) = self.customer(order.customer_id) else {
                continue;
            };
            if !matches_entities(&customer.name, entities) {
                continue;
            }
            let entry = totals.entry(customer.customer_id).or_insert((customer, 0, 0));
            entry.1 += 1;
            entry.2 += order.total_price_cents;
        }

        let mut ranked =
            totals.into_values().filter(|(_, count, _)| *count >= min_orders).collect::<Vec<_>>();
        ranked.sort_by(|left, right| {
            right.1.cmp(&left.1).then(right.2.cmp(&left.2)).then(left.0.customer_id.cmp(&right.0.customer_id))
        });

        ranked
            .into_iter()
            .map(|(customer, order_count, spent_cents)| {
                row(json!({
                    "customer_id": customer.customer_id,
                    "customer_name": customer.name,
                    "email": customer.email,
                    "order_count": order_count,
                    "total_spent": cents(spent_cents),
                }))
            })
            .collect()
    }

    pub fn top_customers(&self, days: u32, entities: &[String], limit: usize) -> Vec<Row> {
        let mut rows = self.customer_totals(days, entities, 1);
        rows.sort_by(|left, right| {
            let spent = |row: &Row| row.get("total_spent").and_then(Value::as_f64).unwrap_or(0.0);
            spent(right).total_cmp(&spent(left))
        });
        rows.truncate(limit);
        rows
    }

    pub fn recent_orders(&self, days: u32, entities: &[String], limit: usize) -> Vec<Row> {
        let mut orders = self.product_orders(days, entities);
        orders.sort_by(|left, right| {
            right.0.created_at.cmp(&left.0.created_at).then(right.0.order_id.cmp(&left.0.order_id))
        });

        orders
            .into_iter()
            .take(limit)
            .map(|(order, product)| {
                row(json!({
                    "order_id": order.order_id,
                    "product_id": product.product_id,
                    "product_title": product.title,
                    "quantity": order.quantity,
                    "total_price": cents(order.total_price_cents),
                    "created_at": order.created_at.to_string(),
                }))
            })
            .collect()
    }
}

pub struct MockExecutor {
    dataset: MockDataset,
    default_top_n: usize,
    row_cap: usize,
}

impl MockExecutor {
    pub fn new(dataset: MockDataset) -> Self {
        Self { dataset, default_top_n: 5, row_cap: 100 }
    }

    pub fn seeded(seed: u64, anchor: NaiveDate) -> Self {
        Self::new(MockDataset::generate(seed, anchor))
    }

    pub fn with_limits(mut self, default_top_n: u32, row_cap: u32) -> Self {
        self.default_top_n = default_top_n as usize;
        self.row_cap = row_cap as usize;
        self
    }

    pub fn dataset(&self) -> &MockDataset {
        &self.dataset
    }

    fn limit(&self, intent: &Intent, ranked_default: bool) -> usize {
        let fallback = if ranked_default { self.default_top_n } else { self.row_cap };
        intent.result_limit.map(|limit| limit as usize).unwrap_or(fallback).min(self.row_cap)
    }

    pub fn rows_for(&self, intent: &Intent) -> Vec<Row> {
        let days = intent.time_period.in_days();
        let entities = intent.entities.as_slice();
        let data = &self.dataset;

        match (intent.category, intent.primary_metric()) {
            (Category::Sales, Some(Metric::SalesSummary)) => data.sales_summary(days, entities),
            (Category::Sales, _) => data.top_products(days, entities, self.limit(intent, true)),
            (Category::Inventory, Some(Metric::ReorderQuantity)) => {
                data.sales_velocity(days, entities)
            }
            (Category::Inventory, Some(Metric::StockoutPrediction)) => {
                data.stockout_risks(days, days, entities)
            }
            (Category::Inventory, _) => data.inventory_levels(entities),
            (Category::Customers, Some(Metric::RepeatCustomers)) => {
                let mut rows = data.customer_totals(days, entities, 2);
                rows.truncate(self.limit(intent, false));
                rows
            }
            (Category::Customers, _) => data.top_customers(days, entities, self.limit(intent, true)),
            (Category::General, _) => data.recent_orders(days, entities, self.limit(intent, false)),
        }
    }
}

#[async_trait]
impl DataExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(
        &self,
        store: &StoreContext,
        query: &str,
        intent: &Intent,
    ) -> Result<Vec<Row>, ExecutorError> {
        let rows = self.rows_for(intent);
        debug!(
            event_name = "data.mock.executed",
            store_domain = %store.domain,
            category = %intent.category,
            query_len = query.len(),
            rows = rows.len(),
            "mock query answered from seeded dataset"
        );
        Ok(rows)
    }
}

/// Every entity must appear in the name, as the generated LIKE filters are ANDed.
fn matches_entities(name: &str, entities: &[String]) -> bool {
    let name = name.to_lowercase();
    entities.iter().all(|entity| name.contains(&entity.to_lowercase()))
}

fn cents(value: i64) -> f64 {
    value as f64 / 100.0
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
