use std::collections::BTreeSet;
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default lookback applied when a question names no time window.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Upper bound on any window, about one hundred years.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sales,
    Inventory,
    Customers,
    General,
}

impl Category {
    /// Tie-break order used by the classifier, highest priority first.
    pub const PRIORITY: [Category; 4] =
        [Category::Sales, Category::Inventory, Category::Customers, Category::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Inventory => "inventory",
            Self::Customers => "customers",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TopProducts,
    SalesSummary,
    StockoutPrediction,
    ReorderQuantity,
    InventoryLevels,
    RepeatCustomers,
    TopCustomers,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopProducts => "top_products",
            Self::SalesSummary => "sales_summary",
            Self::StockoutPrediction => "stockout_prediction",
            Self::ReorderQuantity => "reorder_quantity",
            Self::InventoryLevels => "inventory_levels",
            Self::RepeatCustomers => "repeat_customers",
            Self::TopCustomers => "top_customers",
        }
    }

    /// Metrics answered as a ranked "top N" list.
    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::TopProducts | Self::TopCustomers)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Days,
    Weeks,
    Months,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            Self::Days => "day",
            Self::Weeks => "week",
            Self::Months => "month",
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            Self::Days => 1,
            Self::Weeks => 7,
            Self::Months => 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    pub value: u32,
    pub unit: TimeUnit,
    /// Forward-looking window ("in 7 days", "next week").
    #[serde(default)]
    pub future: bool,
}

impl TimePeriod {
    pub fn days(value: u32) -> Self {
        Self { value, unit: TimeUnit::Days, future: false }
    }

    pub fn new(value: u32, unit: TimeUnit) -> Self {
        Self { value, unit, future: false }
    }

    pub fn upcoming(value: u32, unit: TimeUnit) -> Self {
        Self { value, unit, future: true }
    }

    /// Window length in days, never zero and never above `MAX_WINDOW_DAYS`.
    pub fn in_days(&self) -> u32 {
        self.value.saturating_mul(self.unit.days()).clamp(1, MAX_WINDOW_DAYS)
    }

    /// Shrinks the count so the window spans at most `max_days`.
    pub fn capped(self, max_days: u32) -> Self {
        let max_days = max_days.clamp(1, MAX_WINDOW_DAYS);
        if self.value.saturating_mul(self.unit.days()) <= max_days {
            return self;
        }
        match max_days / self.unit.days() {
            0 => Self { value: max_days, unit: TimeUnit::Days, ..self },
            value => Self { value, ..self },
        }
    }

    /// Inclusive date range of the window relative to `today`.
    pub fn range_from(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let span = Days::new(u64::from(self.in_days()));
        if self.future {
            (today, today.checked_add_days(span).unwrap_or(NaiveDate::MAX))
        } else {
            (today.checked_sub_days(span).unwrap_or(NaiveDate::MIN), today)
        }
    }

    /// Neutral phrase for the window. Named periods ("this month", "last
    /// month") collapse to the same length, so the phrase states the span.
    pub fn describe(&self) -> String {
        let direction = if self.future { "next" } else { "past" };
        match self.value {
            1 => format!("over the {direction} {}", self.unit.singular()),
            value => format!("over the {direction} {value} {}", self.unit.as_str()),
        }
    }
}

impl Default for TimePeriod {
    fn default() -> Self {
        Self::days(DEFAULT_WINDOW_DAYS)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub category: Category,
    pub time_period: TimePeriod,
    pub entities: Vec<String>,
    pub metrics: BTreeSet<Metric>,
    /// Explicit count from the question, e.g. the 5 in "top 5".
    pub result_limit: Option<u32>,
}

impl Intent {
    pub fn general() -> Self {
        Self {
            category: Category::General,
            time_period: TimePeriod::default(),
            entities: Vec::new(),
            metrics: BTreeSet::new(),
            result_limit: None,
        }
    }

    pub fn has_metric(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    pub fn primary_metric(&self) -> Option<Metric> {
        self.metrics.iter().next().copied()
    }

    pub fn is_ranked(&self) -> bool {
        self.metrics.iter().any(Metric::is_ranked)
    }
}
