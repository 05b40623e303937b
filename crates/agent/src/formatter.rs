use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use storesight_core::config::PipelineConfig;
use storesight_core::{Category, Confidence, FormattedAnswer, Intent, Metric, Row, TimePeriod};

const HIGH_RISK_DAYS: f64 = 5.0;
const REORDER_COVER_DAYS: f64 = 14.0;
const REORDER_SAFETY_FACTOR: f64 = 1.2;
const LISTED_ROWS: usize = 5;

#[derive(Clone, Debug)]
pub struct AnswerFormatter {
    today: NaiveDate,
    high_confidence_days: u32,
    medium_confidence_days: u32,
    density_floor: u32,
    default_top_n: u32,
}

impl AnswerFormatter {
    pub fn new(pipeline: &PipelineConfig, today: NaiveDate) -> Self {
        Self {
            today,
            high_confidence_days: pipeline.high_confidence_days,
            medium_confidence_days: pipeline.medium_confidence_days,
            density_floor: pipeline.density_floor,
            default_top_n: pipeline.default_top_n,
        }
    }

    pub fn format(&self, rows: &[Row], intent: &Intent, question: &str) -> FormattedAnswer {
        let window = self.window_text(&intent.time_period);
        let text = if rows.is_empty() {
            insufficient_data(intent.category, question, &window)
        } else {
            match (intent.category, intent.primary_metric()) {
                (Category::Sales, Some(Metric::SalesSummary)) => sales_summary(rows, &window),
                (Category::Sales, _) => top_products(rows, &window),
                (Category::Inventory, Some(Metric::StockoutPrediction)) => {
                    stockout_risks(rows, intent.time_period.in_days(), &window)
                }
                (Category::Inventory, Some(Metric::ReorderQuantity)) => {
                    reorder_plan(rows, intent.time_period.in_days(), &window)
                }
                (Category::Inventory, _) => inventory_levels(rows, &window),
                (Category::Customers, Some(Metric::RepeatCustomers)) => {
                    repeat_customers(rows, &window)
                }
                (Category::Customers, _) => top_customers(rows, &window),
                (Category::General, _) => recent_orders(rows, &window),
            }
        };

        FormattedAnswer { text, confidence: self.confidence(rows, intent) }
    }

    pub fn confidence(&self, rows: &[Row], intent: &Intent) -> Confidence {
        let days = intent.time_period.in_days();
        if rows.is_empty() || days < self.medium_confidence_days || !entities_matched(rows, intent)
        {
            return Confidence::Low;
        }
        if days >= self.high_confidence_days && rows.len() >= self.expected_rows(intent) {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }

    fn expected_rows(&self, intent: &Intent) -> usize {
        if !intent.is_ranked() {
            return 1;
        }
        let requested = intent.result_limit.unwrap_or(self.default_top_n);
        requested.min(self.density_floor).max(1) as usize
    }

    /// Window phrase plus its ISO date range.
    pub fn window_text(&self, period: &TimePeriod) -> String {
        let (start, end) = period.range_from(self.today);
        format!("{} ({start} to {end})", period.describe())
    }
}

fn insufficient_data(category: Category, question: &str, window: &str) -> String {
    let subject = match category {
        Category::Sales => "sales",
        Category::Inventory => "inventory",
        Category::Customers => "customer",
        Category::General => "order",
    };
    let mut text = format!(
        "Insufficient data to answer \"{}\" {window}: no matching {subject} records were returned, so no figures can be reported.",
        question.trim()
    );
    if category == Category::Inventory {
        text.push_str(
            "\nRecommendation: Confirm inventory tracking is enabled for these products, then ask again once sales have been recorded.",
        );
    }
    text
}

fn top_products(rows: &[Row], window: &str) -> String {
    let mut text = format!("Top {} selling {} {window}:", rows.len(), plural(rows.len(), "product"));
    for (rank, row) in rows.iter().enumerate() {
        let sold = count(row, "total_sold");
        text.push_str(&format!(
            "\n{}. {}: {sold} {} sold, {} revenue",
            rank + 1,
            name(row),
            plural(sold, "unit"),
            currency(decimal(row, "revenue")),
        ));
    }
    text
}

fn sales_summary(rows: &[Row], window: &str) -> String {
    let orders = rows.iter().map(|row| count(row, "order_count")).sum::<i64>();
    let revenue = rows.iter().map(|row| decimal(row, "total_revenue")).sum::<Decimal>();

    let mut text = format!(
        "Sales summary {window}:\n- Total orders: {orders}\n- Total revenue: {}",
        currency(revenue)
    );
    if orders > 0 {
        text.push_str(&format!(
            "\n- Average order value: {}",
            currency(revenue / Decimal::from(orders))
        ));
    }
    text
}

struct StockPosition {
    name: String,
    stock: i64,
    daily: f64,
    cover: f64,
}

fn stockout_risks(rows: &[Row], horizon_days: u32, window: &str) -> String {
    let horizon = f64::from(horizon_days);
    let mut at_risk = rows
        .iter()
        .filter_map(|row| {
            let stock = count(row, "current_stock");
            let daily = rate(row, "avg_daily_sales");
            let cover = number(row, "days_of_cover")
                .or_else(|| (daily > 0.0).then(|| stock as f64 / daily))?;
            (cover <= horizon).then(|| StockPosition { name: name(row), stock, daily, cover })
        })
        .collect::<Vec<_>>();
    at_risk.sort_by(|left, right| {
        left.cover.partial_cmp(&right.cover).unwrap_or(Ordering::Equal)
    });

    if at_risk.is_empty() {
        return format!(
            "None of your products are at risk of stocking out {window} based on recent sales velocity.\nRecommendation: No urgent reorders are needed; keep monitoring sales velocity."
        );
    }

    let (high, medium): (Vec<_>, Vec<_>) =
        at_risk.iter().partition(|position| position.cover <= HIGH_RISK_DAYS);
    let mut text = format!(
        "{} {} {} at risk of stocking out {window} based on recent sales velocity:",
        at_risk.len(),
        plural(at_risk.len(), "product"),
        if at_risk.len() == 1 { "is" } else { "are" },
    );
    let tiers = [("High risk (5 days of cover or less)", &high), ("Medium risk", &medium)];
    for (label, tier) in tiers {
        if tier.is_empty() {
            continue;
        }
        text.push_str(&format!("\n{label}:"));
        for position in tier {
            text.push_str(&format!(
                "\n- {}: {} {} in stock, {:.1} sold per day, runs out in about {:.1} days",
                position.name,
                position.stock,
                plural(position.stock, "unit"),
                position.daily,
                position.cover,
            ));
        }
    }

    let priority = high.first().or(medium.first()).map(|position| position.name.as_str());
    text.push_str(&format!(
        "\nRecommendation: Prioritize reordering {} immediately.",
        priority.unwrap_or("the listed products")
    ));
    text
}

struct ReorderLine {
    name: String,
    sold: i64,
    stock: i64,
    daily: f64,
    quantity: i64,
}

/// Units to order: `ceil(daily * 14 * 1.2) - stock`, never negative.
pub fn reorder_quantity(daily_rate: f64, stock: i64) -> i64 {
    let target = (daily_rate.max(0.0) * REORDER_COVER_DAYS * REORDER_SAFETY_FACTOR).ceil();
    (target as i64 - stock).max(0)
}

fn reorder_plan(rows: &[Row], period_days: u32, window: &str) -> String {
    let mut lines = rows
        .iter()
        .map(|row| {
            let sold = count(row, "total_sold");
            let stock = count(row, "current_stock");
            let daily = number(row, "avg_daily_sales")
                .unwrap_or_else(|| sold as f64 / f64::from(period_days.max(1)));
            let quantity = reorder_quantity(daily, stock);
            ReorderLine { name: name(row), sold, stock, daily, quantity }
        })
        .collect::<Vec<_>>();
    lines.sort_by(|left, right| {
        right.quantity.cmp(&left.quantity).then_with(|| left.name.cmp(&right.name))
    });

    let mut text = format!("Reorder outlook from sales {window}:");
    for line in lines.iter().take(LISTED_ROWS) {
        text.push_str(&format!(
            "\n- {}: sold {} {} ({:.1} per day), {} in stock, order {} {}",
            line.name,
            line.sold,
            plural(line.sold, "unit"),
            line.daily,
            line.stock,
            line.quantity,
            plural(line.quantity, "unit"),
        ));
    }

    match lines.first() {
        Some(line) if line.quantity > 0 => text.push_str(&format!(
            "\nRecommendation: Order {} {} of {} to cover the next 14 days with a 20% safety buffer.",
            line.quantity,
            plural(line.quantity, "unit"),
            line.name
        )),
        _ => text.push_str(
            "\nRecommendation: Current stock covers the next 14 days; no reorder is needed yet.",
        ),
    }
    text
}

fn inventory_levels(rows: &[Row], window: &str) -> String {
    let mut sorted = rows.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|row| count(row, "available"));

    let mut text = format!(
        "Inventory levels for {} {} {window}:",
        rows.len(),
        plural(rows.len(), "product")
    );
    for row in sorted.iter().take(LISTED_ROWS * 2) {
        let available = count(row, "available");
        let sku = row.get("sku").and_then(Value::as_str).map(|sku| format!(" ({sku})"));
        text.push_str(&format!(
            "\n- {}{}: {available} {} available",
            name(row),
            sku.unwrap_or_default(),
            plural(available, "unit")
        ));
    }

    if let Some(lowest) = sorted.first() {
        text.push_str(&format!(
            "\nRecommendation: Review stock of {}, the lowest at {} units.",
            name(lowest),
            count(lowest, "available")
        ));
    }
    text
}

fn repeat_customers(rows: &[Row], window: &str) -> String {
    let orders = rows.iter().map(|row| count(row, "order_count")).sum::<i64>();
    let spent = rows.iter().map(|row| decimal(row, "total_spent")).sum::<Decimal>();

    let mut text = format!(
        "{} repeat {} {window} placed {orders} {} worth {} in total.\nMost frequent:",
        rows.len(),
        plural(rows.len(), "customer"),
        plural(orders, "order"),
        currency(spent)
    );
    for row in rows.iter().take(LISTED_ROWS) {
        let placed = count(row, "order_count");
        text.push_str(&format!(
            "\n- {}: {placed} {}, {} spent",
            name(row),
            plural(placed, "order"),
            currency(decimal(row, "total_spent"))
        ));
    }
    text
}

fn top_customers(rows: &[Row], window: &str) -> String {
    let mut text =
        format!("Top {} {} by spend {window}:", rows.len(), plural(rows.len(), "customer"));
    for (rank, row) in rows.iter().enumerate() {
        let placed = count(row, "order_count");
        text.push_str(&format!(
            "\n{}. {}: {} across {placed} {}",
            rank + 1,
            name(row),
            currency(decimal(row, "total_spent")),
            plural(placed, "order")
        ));
    }
    text
}

fn recent_orders(rows: &[Row], window: &str) -> String {
    let revenue = rows.iter().map(|row| decimal(row, "total_price")).sum::<Decimal>();
    let mut text = format!(
        "Found {} {} {window} totalling {}.\nMost recent:",
        rows.len(),
        plural(rows.len(), "order"),
        currency(revenue)
    );
    for row in rows.iter().take(LISTED_ROWS) {
        let quantity = count(row, "quantity");
        let placed = row.get("created_at").and_then(Value::as_str).unwrap_or("an unknown date");
        text.push_str(&format!(
            "\n- {}: {quantity} {} for {} on {placed}",
            name(row),
            plural(quantity, "unit"),
            currency(decimal(row, "total_price"))
        ));
    }
    text
}

fn entities_matched(rows: &[Row], intent: &Intent) -> bool {
    if intent.entities.is_empty() {
        return true;
    }
    let entities = intent.entities.iter().map(|entity| entity.to_lowercase()).collect::<Vec<_>>();
    rows.iter().flat_map(|row| row.values()).filter_map(Value::as_str).any(|text| {
        let text = text.to_lowercase();
        entities.iter().any(|entity| text.contains(entity.as_str()))
    })
}

fn name(row: &Row) -> String {
    ["product_title", "customer_name", "name", "title"]
        .iter()
        .find_map(|key| row.get(*key).and_then(Value::as_str))
        .unwrap_or("Unknown")
        .to_string()
}

fn number(row: &Row, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn rate(row: &Row, key: &str) -> f64 {
    number(row, key).unwrap_or(0.0)
}

/// Whole count; fractional inputs round to the nearest integer.
fn count(row: &Row, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(value)) => {
            value.as_i64().unwrap_or_else(|| value.as_f64().unwrap_or(0.0).round() as i64)
        }
        Some(Value::String(value)) => value.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn decimal(row: &Row, key: &str) -> Decimal {
    match row.get(key) {
        Some(Value::Number(value)) => value
            .as_i64()
            .map(Decimal::from)
            .or_else(|| value.as_f64().and_then(Decimal::from_f64))
            .unwrap_or_default(),
        Some(Value::String(value)) => value.trim().parse().unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

/// `$1,234.50`; negative amounts render as `-$5.00`.
pub fn currency(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let digits = format!("{:.2}", rounded.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{cents}")
}

fn plural<N>(count: N, noun: &str) -> String
where
    N: TryInto<i64>,
{
    match count.try_into() {
        Ok(1) => noun.to_string(),
        _ => format!("{noun}s"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;
    use storesight_core::config::PipelineConfig;
    use storesight_core::{Category, Confidence, Intent, Metric, Row, TimePeriod, TimeUnit};

    use super::{currency, reorder_quantity, AnswerFormatter};

    fn formatter() -> AnswerFormatter {
        AnswerFormatter::new(
            &PipelineConfig::default(),
            NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default(),
        )
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    fn intent(category: Category, metric: Option<Metric>, period: TimePeriod) -> Intent {
        Intent {
            category,
            time_period: period,
            entities: Vec::new(),
            metrics: metric.into_iter().collect::<BTreeSet<_>>(),
            result_limit: None,
        }
    }

    fn product_rows() -> Vec<Row> {
        vec![
            row(json!({"product_title": "Smart Watch Series 5", "total_sold": 12, "revenue": 3599.88})),
            row(json!({"product_title": "Yoga Mat Pro", "total_sold": 9, "revenue": 449.91})),
            row(json!({"product_title": "Bamboo Sunglasses", "total_sold": 1, "revenue": 59.99})),
        ]
    }

    #[test]
    fn currency_uses_thousands_separators_and_two_decimals() {
        assert_eq!(currency(Decimal::new(123_450, 2)), "$1,234.50");
        assert_eq!(currency(Decimal::ZERO), "$0.00");
        assert_eq!(currency(Decimal::new(1_234_567_891, 3)), "$1,234,567.89");
        assert_eq!(currency(Decimal::new(-5, 0)), "-$5.00");
        assert_eq!(currency(Decimal::new(99_999, 2)), "$999.99");
    }

    #[test]
    fn confidence_never_decreases_as_window_grows() {
        let rows = product_rows();
        let levels = [5, 15, 35].map(|days| {
            let top = intent(Category::Sales, Some(Metric::TopProducts), TimePeriod::days(days));
            formatter().confidence(&rows, &top)
        });

        assert_eq!(levels, [Confidence::Low, Confidence::Medium, Confidence::High]);
        assert!(levels.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn sparse_ranked_results_cap_confidence_at_medium() {
        let rows = product_rows()[..1].to_vec();
        let confidence = formatter().confidence(
            &rows,
            &intent(Category::Sales, Some(Metric::TopProducts), TimePeriod::days(60)),
        );
        assert_eq!(confidence, Confidence::Medium);
    }

    #[test]
    fn unmatched_entity_is_low_confidence() {
        let mut top = intent(Category::Sales, Some(Metric::TopProducts), TimePeriod::days(60));
        top.entities = vec!["Ceramic Mug".to_string()];
        assert_eq!(formatter().confidence(&product_rows(), &top), Confidence::Low);

        top.entities = vec!["yoga mat".to_string()];
        assert_eq!(formatter().confidence(&product_rows(), &top), Confidence::High);
    }

    #[test]
    fn empty_rows_report_insufficient_data_without_figures() {
        let categories =
            [Category::Sales, Category::Inventory, Category::Customers, Category::General];
        for category in categories {
            let answer = formatter().format(
                &[],
                &intent(category, None, TimePeriod::days(90)),
                "How did we do?",
            );
            assert_eq!(answer.confidence, Confidence::Low);
            assert!(answer.text.to_lowercase().contains("insufficient data"));
            assert!(!answer.text.contains('$'));
            assert!(answer.text.contains("2026-07-16 to 2026-10-14"));
        }
    }

    #[test]
    fn top_products_list_names_and_currency() {
        let answer = formatter().format(
            &product_rows(),
            &intent(Category::Sales, Some(Metric::TopProducts), TimePeriod::days(7)),
            "What were my top selling products last week?",
        );

        assert!(answer.text.starts_with("Top 3 selling products over the past 7 days (2026-10-07 to 2026-10-14):"));
        assert!(answer.text.contains("1. Smart Watch Series 5: 12 units sold, $3,599.88 revenue"));
        assert!(answer.text.contains("3. Bamboo Sunglasses: 1 unit sold, $59.99 revenue"));
        assert_eq!(answer.confidence, Confidence::Medium);
    }

    #[test]
    fn stockout_answer_tiers_risk_and_recommends() {
        let rows = vec![
            row(json!({"product_title": "Smart Watch Series 5", "current_stock": 12, "avg_daily_sales": 4.0})),
            row(json!({"product_title": "Organic Cotton T-Shirt", "current_stock": 15, "avg_daily_sales": 2.5})),
            row(json!({"product_title": "Yoga Mat Pro", "current_stock": 78, "avg_daily_sales": 1.0})),
        ];
        let answer = formatter().format(
            &rows,
            &intent(
                Category::Inventory,
                Some(Metric::StockoutPrediction),
                TimePeriod::upcoming(7, TimeUnit::Days),
            ),
            "Which products will run out of stock next week?",
        );

        assert!(answer.text.contains("2 products are at risk of stocking out over the next 7 days (2026-10-14 to 2026-10-21)"));
        assert!(answer.text.contains("High risk (5 days of cover or less):\n- Smart Watch Series 5: 12 units in stock, 4.0 sold per day, runs out in about 3.0 days"));
        assert!(answer.text.contains("Medium risk:\n- Organic Cotton T-Shirt"));
        assert!(!answer.text.contains("Yoga Mat Pro"));
        assert!(answer.text.ends_with("Recommendation: Prioritize reordering Smart Watch Series 5 immediately."));
    }

    #[test]
    fn window_text_states_the_span_for_named_periods() {
        let formatter = formatter();
        let this_month = formatter.format(
            &product_rows(),
            &intent(Category::Sales, Some(Metric::TopProducts), TimePeriod::days(30)),
            "What are my top selling products this month?",
        );
        assert!(this_month.text.contains("over the past 30 days (2026-09-14 to 2026-10-14)"));
        assert!(!this_month.text.contains("last month"));

        assert_eq!(
            formatter.window_text(&TimePeriod::days(1)),
            "over the past day (2026-10-13 to 2026-10-14)"
        );
    }

    #[test]
    fn huge_windows_stay_inside_the_calendar() {
        let formatter = AnswerFormatter::new(&PipelineConfig::default(), NaiveDate::MIN);
        let text = formatter.window_text(&TimePeriod::days(u32::MAX));
        assert!(text.starts_with("over the past"));
    }

    #[test]
    fn reorder_quantity_covers_two_weeks_with_buffer() {
        assert_eq!(reorder_quantity(2.0, 10), 24);
        assert_eq!(reorder_quantity(1.1, 0), 19);
        assert_eq!(reorder_quantity(0.5, 40), 0);
    }

    #[test]
    fn reorder_answer_includes_recommendation_line() {
        let rows = vec![row(json!({
            "product_title": "Yoga Mat Pro",
            "total_sold": 28,
            "current_stock": 22,
            "avg_daily_sales": 2.0
        }))];
        let answer = formatter().format(
            &rows,
            &intent(Category::Inventory, Some(Metric::ReorderQuantity), TimePeriod::days(14)),
            "How many Yoga Mat Pro should I reorder?",
        );

        assert!(answer.text.contains("- Yoga Mat Pro: sold 28 units (2.0 per day), 22 in stock, order 12 units"));
        assert!(answer.text.contains("Recommendation: Order 12 units of Yoga Mat Pro"));
        assert_eq!(answer.confidence, Confidence::Medium);
    }

    #[test]
    fn inventory_levels_recommend_lowest_stock() {
        let rows = vec![
            row(json!({"product_title": "Yoga Mat Pro", "sku": "YMP-001", "available": 22})),
            row(json!({"product_title": "Smart Watch Series 5", "sku": "SWS5-001", "available": 12})),
        ];
        let answer = formatter().format(
            &rows,
            &intent(Category::Inventory, Some(Metric::InventoryLevels), TimePeriod::days(30)),
            "What is my inventory?",
        );

        assert!(answer.text.contains("- Smart Watch Series 5 (SWS5-001): 12 units available"));
        assert!(answer.text.contains("Recommendation: Review stock of Smart Watch Series 5, the lowest at 12 units."));
        assert_eq!(answer.confidence, Confidence::High);
    }

    #[test]
    fn sales_summary_totals_daily_rows() {
        let rows = vec![
            row(json!({"order_date": "2026-10-14", "order_count": 3, "total_revenue": 150.0})),
            row(json!({"order_date": "2026-10-13", "order_count": 1, "total_revenue": "50.00"})),
        ];
        let answer = formatter().format(
            &rows,
            &intent(Category::Sales, Some(Metric::SalesSummary), TimePeriod::days(30)),
            "How were sales last month?",
        );

        assert!(answer.text.contains("- Total orders: 4"));
        assert!(answer.text.contains("- Total revenue: $200.00"));
        assert!(answer.text.contains("- Average order value: $50.00"));
    }
}
