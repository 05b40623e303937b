use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::schema::Table;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    /// Filtered select, no aggregation.
    Projection,
    /// Aggregate measures grouped by the identifying fields, ranked descending.
    SumGroup,
    /// `SumGroup` plus an average-per-day sales column.
    SumGroupAverage,
    /// `SumGroup` restricted to groups with more than `min_count` rows.
    SumGroupHaving { min_count: u32 },
    /// Current stock divided by average daily sales, filtered to the horizon.
    StockoutProjection,
    /// Order count and revenue per day.
    DailyTotals,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projection => "projection",
            Self::SumGroup => "sum_group",
            Self::SumGroupAverage => "sum_group_average",
            Self::SumGroupHaving { .. } => "sum_group_having",
            Self::StockoutProjection => "stockout_projection",
            Self::DailyTotals => "daily_totals",
        }
    }

    pub fn groups(&self) -> bool {
        !matches!(self, Self::Projection)
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFn {
    Sum,
    Count,
    Avg,
    Max,
    Min,
}

impl AggregateFn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Count => "COUNT",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub function: AggregateFn,
    pub field: String,
    pub alias: String,
}

impl Measure {
    pub fn new(function: AggregateFn, field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { function, field: field.into(), alias: alias.into() }
    }

    pub fn expression(&self) -> String {
        format!("{}({})", self.function.as_str(), self.field)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Ordered set of tables; the first is the `FROM` table.
    pub data_sources: Vec<Table>,
    /// Identifying or projected fields, qualified as `table.column`.
    pub required_fields: Vec<String>,
    pub measures: Vec<Measure>,
    pub aggregation_type: AggregationType,
    /// Timestamp field the time window filters on.
    pub date_field: String,
    /// Name or title field entity filters match against.
    pub name_field: String,
}

impl Plan {
    pub fn driving_table(&self) -> Option<Table> {
        self.data_sources.first().copied()
    }

    pub fn uses(&self, table: Table) -> bool {
        self.data_sources.contains(&table)
    }
}
