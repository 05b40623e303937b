use storesight_core::{
    AggregateFn, AggregationType, Category, Intent, Measure, Metric, Plan, Table,
};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("no plan for category `{category}` with metric `{}`", metric_label(.metric))]
    Unsupported { category: Category, metric: Option<Metric> },
}

fn metric_label(metric: &Option<Metric>) -> &'static str {
    metric.as_ref().map(Metric::as_str).unwrap_or("none")
}

/// Maps an intent onto the tables, fields, and aggregation that answer it.
#[derive(Clone, Debug, Default)]
pub struct SourcePlanner;

impl SourcePlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, intent: &Intent) -> Result<Plan, PlanError> {
        let metric = intent.primary_metric();
        let plan = match (intent.category, metric) {
            (Category::Sales, Some(Metric::TopProducts)) => top_products(),
            (Category::Sales, Some(Metric::SalesSummary)) => sales_summary(),
            (Category::Inventory, Some(Metric::StockoutPrediction)) => stockout_prediction(),
            (Category::Inventory, Some(Metric::ReorderQuantity)) => reorder_quantity(),
            (Category::Inventory, Some(Metric::InventoryLevels)) => inventory_levels(),
            (Category::Customers, Some(Metric::RepeatCustomers)) => repeat_customers(),
            (Category::Customers, Some(Metric::TopCustomers)) => top_customers(),
            (Category::General, _) => recent_orders(),
            (category, metric) => return Err(PlanError::Unsupported { category, metric }),
        };
        Ok(plan)
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

const ORDER_DATE: &str = "orders.created_at";
const PRODUCT_NAME: &str = "products.product_title";
const CUSTOMER_NAME: &str = "customers.customer_name";

fn top_products() -> Plan {
    Plan {
        data_sources: vec![Table::Orders, Table::Products],
        required_fields: fields(&["products.product_id", PRODUCT_NAME]),
        measures: vec![
            Measure::new(AggregateFn::Sum, "orders.quantity", "total_sold"),
            Measure::new(AggregateFn::Sum, "orders.total_price", "revenue"),
        ],
        aggregation_type: AggregationType::SumGroup,
        date_field: ORDER_DATE.to_string(),
        name_field: PRODUCT_NAME.to_string(),
    }
}

fn sales_summary() -> Plan {
    Plan {
        data_sources: vec![Table::Orders, Table::Products],
        required_fields: fields(&[ORDER_DATE]),
        measures: vec![
            Measure::new(AggregateFn::Count, "orders.order_id", "order_count"),
            Measure::new(AggregateFn::Sum, "orders.total_price", "total_revenue"),
        ],
        aggregation_type: AggregationType::DailyTotals,
        date_field: ORDER_DATE.to_string(),
        name_field: PRODUCT_NAME.to_string(),
    }
}

/// Measures are `[current stock, units sold]`; the generator derives the
/// daily rate and days of cover from them.
fn stockout_prediction() -> Plan {
    Plan {
        data_sources: vec![Table::Products, Table::InventoryLevels, Table::Orders],
        required_fields: fields(&["products.product_id", PRODUCT_NAME]),
        measures: vec![
            Measure::new(AggregateFn::Max, "inventory_levels.available", "current_stock"),
            Measure::new(AggregateFn::Sum, "orders.quantity", "total_sold"),
        ],
        aggregation_type: AggregationType::StockoutProjection,
        date_field: ORDER_DATE.to_string(),
        name_field: PRODUCT_NAME.to_string(),
    }
}

fn reorder_quantity() -> Plan {
    Plan {
        data_sources: vec![Table::Orders, Table::Products, Table::InventoryLevels],
        required_fields: fields(&["products.product_id", PRODUCT_NAME]),
        measures: vec![
            Measure::new(AggregateFn::Sum, "orders.quantity", "total_sold"),
            Measure::new(AggregateFn::Max, "inventory_levels.available", "current_stock"),
        ],
        aggregation_type: AggregationType::SumGroupAverage,
        date_field: ORDER_DATE.to_string(),
        name_field: PRODUCT_NAME.to_string(),
    }
}

fn inventory_levels() -> Plan {
    Plan {
        data_sources: vec![Table::Products, Table::InventoryLevels],
        required_fields: fields(&[
            "products.product_id",
            PRODUCT_NAME,
            "products.sku",
            "inventory_levels.available",
        ]),
        measures: Vec::new(),
        aggregation_type: AggregationType::Projection,
        date_field: "inventory_levels.updated_at".to_string(),
        name_field: PRODUCT_NAME.to_string(),
    }
}

fn repeat_customers() -> Plan {
    Plan {
        data_sources: vec![Table::Orders, Table::Customers],
        required_fields: fields(&["customers.customer_id", CUSTOMER_NAME, "customers.email"]),
        measures: vec![
            Measure::new(AggregateFn::Count, "orders.order_id", "order_count"),
            Measure::new(AggregateFn::Sum, "orders.total_price", "total_spent"),
        ],
        aggregation_type: AggregationType::SumGroupHaving { min_count: 1 },
        date_field: ORDER_DATE.to_string(),
        name_field: CUSTOMER_NAME.to_string(),
    }
}

fn top_customers() -> Plan {
    Plan {
        data_sources: vec![Table::Orders, Table::Customers],
        required_fields: fields(&["customers.customer_id", CUSTOMER_NAME, "customers.email"]),
        measures: vec![
            Measure::new(AggregateFn::Sum, "orders.total_price", "total_spent"),
            Measure::new(AggregateFn::Count, "orders.order_id", "order_count"),
        ],
        aggregation_type: AggregationType::SumGroup,
        date_field: ORDER_DATE.to_string(),
        name_field: CUSTOMER_NAME.to_string(),
    }
}

fn recent_orders() -> Plan {
    Plan {
        data_sources: vec![Table::Orders],
        required_fields: fields(&[
            "orders.order_id",
            "orders.product_id",
            "orders.product_title",
            "orders.quantity",
            "orders.total_price",
            ORDER_DATE,
        ]),
        measures: Vec::new(),
        aggregation_type: AggregationType::Projection,
        date_field: ORDER_DATE.to_string(),
        name_field: "orders.product_title".to_string(),
    }
}
