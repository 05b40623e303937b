use chrono::NaiveDate;
use storesight_core::config::PipelineConfig;
use storesight_core::{AggregateFn, AggregationType, Intent, Plan, Table, TimePeriod};

/// Renders an intent and plan as a read-only query.
///
/// The generator is not a safety boundary: unknown fields are emitted
/// verbatim and left for the validator to judge.
#[derive(Clone, Debug)]
pub struct QueryGenerator {
    today: NaiveDate,
    default_top_n: u32,
    row_cap: u32,
}

impl QueryGenerator {
    pub fn new(today: NaiveDate, pipeline: &PipelineConfig) -> Self {
        Self { today, default_top_n: pipeline.default_top_n, row_cap: pipeline.row_cap }
    }

    pub fn generate(&self, intent: &Intent, plan: &Plan) -> String {
        let days = intent.time_period.in_days();
        let shape = Shape::from_plan(plan, days);

        let mut clauses = vec![format!("SELECT {}", shape.select_list(plan).join(", "))];
        if let Some(from) = from_clause(plan) {
            clauses.push(from);
        }
        clauses.push(format!("WHERE {}", self.filters(intent, plan, days).join(" AND ")));

        if plan.aggregation_type.groups() && !plan.required_fields.is_empty() {
            clauses.push(format!("GROUP BY {}", plan.required_fields.join(", ")));
        }
        if let Some(having) = shape.having(plan, days) {
            clauses.push(format!("HAVING {having}"));
        }
        if let Some(order) = shape.order_by(plan) {
            clauses.push(format!("ORDER BY {order}"));
        }
        clauses.push(format!("LIMIT {}", self.limit(intent, plan)));

        clauses.join(" ")
    }

    /// Inclusive `[today - days, today]`, clamped to the calendar.
    pub fn window(&self, days: u32) -> (NaiveDate, NaiveDate) {
        TimePeriod::days(days).range_from(self.today)
    }

    fn filters(&self, intent: &Intent, plan: &Plan, days: u32) -> Vec<String> {
        let (start, end) = self.window(days);
        let date_field = &plan.date_field;
        let mut filters =
            vec![format!("{date_field} >= '{start}'"), format!("{date_field} <= '{end}'")];

        filters.extend(intent.entities.iter().map(|entity| {
            let needle = escape_literal(&entity.to_lowercase());
            format!("LOWER({}) LIKE '%{needle}%'", plan.name_field)
        }));
        filters
    }

    fn limit(&self, intent: &Intent, plan: &Plan) -> u32 {
        match intent.result_limit {
            Some(explicit) => explicit.clamp(1, self.row_cap),
            None if intent.is_ranked() && plan.aggregation_type.groups() => {
                self.default_top_n.min(self.row_cap)
            }
            None => self.row_cap,
        }
    }
}

/// Aggregation-specific pieces of the select, having, and order clauses.
struct Shape {
    kind: AggregationType,
    rate: Option<String>,
    cover: Option<String>,
}

impl Shape {
    fn from_plan(plan: &Plan, days: u32) -> Self {
        let sales = plan
            .measures
            .iter()
            .find(|measure| measure.function == AggregateFn::Sum)
            .map(|measure| measure.expression());
        let rate = sales.map(|sales| format!("{sales} / {days}.0"));

        let cover = match plan.aggregation_type {
            AggregationType::StockoutProjection => {
                let stock = plan
                    .measures
                    .iter()
                    .find(|measure| measure.function == AggregateFn::Max)
                    .map(|measure| measure.expression());
                stock.zip(rate.clone()).map(|(stock, rate)| format!("{stock} / ({rate})"))
            }
            _ => None,
        };

        Self { kind: plan.aggregation_type, rate, cover }
    }

    fn select_list(&self, plan: &Plan) -> Vec<String> {
        let mut columns = match self.kind {
            AggregationType::DailyTotals => {
                vec![format!("{} AS order_date", plan.date_field)]
            }
            _ => plan.required_fields.clone(),
        };
        columns.extend(
            plan.measures
                .iter()
                .map(|measure| format!("{} AS {}", measure.expression(), measure.alias)),
        );

        let derived_rate = matches!(
            self.kind,
            AggregationType::SumGroupAverage | AggregationType::StockoutProjection
        );
        if let (true, Some(rate)) = (derived_rate, &self.rate) {
            columns.push(format!("{rate} AS avg_daily_sales"));
        }
        if let Some(cover) = &self.cover {
            columns.push(format!("{cover} AS days_of_cover"));
        }

        if columns.is_empty() {
            columns.push("*".to_string());
        }
        columns
    }

    fn having(&self, plan: &Plan, days: u32) -> Option<String> {
        match self.kind {
            AggregationType::SumGroupHaving { min_count } => {
                let counted = plan
                    .measures
                    .iter()
                    .find(|measure| measure.function == AggregateFn::Count)
                    .map(|measure| measure.expression())
                    .unwrap_or_else(|| "COUNT(*)".to_string());
                Some(format!("{counted} > {min_count}"))
            }
            AggregationType::StockoutProjection => {
                self.cover.as_ref().map(|cover| format!("{cover} <= {days}"))
            }
            _ => None,
        }
    }

    fn order_by(&self, plan: &Plan) -> Option<String> {
        match self.kind {
            AggregationType::Projection => None,
            AggregationType::DailyTotals => Some(format!("{} DESC", plan.date_field)),
            AggregationType::StockoutProjection if self.cover.is_some() => {
                Some("days_of_cover ASC".to_string())
            }
            _ => plan.measures.first().map(|measure| format!("{} DESC", measure.alias)),
        }
    }
}

fn from_clause(plan: &Plan) -> Option<String> {
    let mut joined: Vec<Table> = Vec::new();
    let mut clause = String::new();

    for table in &plan.data_sources {
        if joined.contains(table) {
            continue;
        }
        if joined.is_empty() {
            clause.push_str(&format!("FROM {table}"));
        } else {
            let condition = joined
                .iter()
                .find_map(|earlier| Table::join_condition(*earlier, *table))
                .unwrap_or_else(|| "1 = 1".to_string());
            clause.push_str(&format!(" JOIN {table} ON {condition}"));
        }
        joined.push(*table);
    }

    (!clause.is_empty()).then_some(clause)
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
