use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of store tables a generated query may touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Orders,
    Products,
    InventoryLevels,
    Customers,
    OrderLineItems,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Orders,
        Table::Products,
        Table::InventoryLevels,
        Table::Customers,
        Table::OrderLineItems,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Products => "products",
            Self::InventoryLevels => "inventory_levels",
            Self::Customers => "customers",
            Self::OrderLineItems => "order_line_items",
        }
    }

    pub fn is_allowed(name: &str) -> bool {
        name.parse::<Table>().is_ok()
    }

    /// Equi-join predicate linking two tables, if the schema relates them.
    pub fn join_condition(left: Table, right: Table) -> Option<String> {
        let key = match (left, right) {
            (Self::Orders, Self::Products) | (Self::Products, Self::Orders) => "product_id",
            (Self::Orders, Self::InventoryLevels) | (Self::InventoryLevels, Self::Orders) => {
                "product_id"
            }
            (Self::Products, Self::InventoryLevels) | (Self::InventoryLevels, Self::Products) => {
                "product_id"
            }
            (Self::Orders, Self::Customers) | (Self::Customers, Self::Orders) => "customer_id",
            (Self::Orders, Self::OrderLineItems) | (Self::OrderLineItems, Self::Orders) => {
                "order_id"
            }
            (Self::Products, Self::OrderLineItems) | (Self::OrderLineItems, Self::Products) => {
                "product_id"
            }
            _ => return None,
        };

        Some(format!("{}.{key} = {}.{key}", right.as_str(), left.as_str()))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownTable(pub String);

impl fmt::Display for UnknownTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown table `{}`", self.0)
    }
}

impl std::error::Error for UnknownTable {}

impl FromStr for Table {
    type Err = UnknownTable;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "orders" => Ok(Self::Orders),
            "products" => Ok(Self::Products),
            "inventory_levels" => Ok(Self::InventoryLevels),
            "customers" => Ok(Self::Customers),
            "order_line_items" => Ok(Self::OrderLineItems),
            _ => Err(UnknownTable(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Table;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ORDERS".parse::<Table>(), Ok(Table::Orders));
        assert_eq!(" inventory_levels ".parse::<Table>(), Ok(Table::InventoryLevels));
        assert!(!Table::is_allowed("users"));
        assert!(Table::ALL.iter().all(|table| Table::is_allowed(table.as_str())));
    }

    #[test]
    fn joins_use_shared_keys() {
        assert_eq!(
            Table::join_condition(Table::Orders, Table::Products).as_deref(),
            Some("products.product_id = orders.product_id")
        );
        assert_eq!(
            Table::join_condition(Table::Orders, Table::Customers).as_deref(),
            Some("customers.customer_id = orders.customer_id")
        );
        assert_eq!(Table::join_condition(Table::Products, Table::Customers), None);
    }
}
