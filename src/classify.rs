//! Column classification: what a column *means* and what it holds.
//!
//! [`classify()`] assigns a semantic [`Role`] from the column name and a value
//! sample using an ordered rule list where the first matching rule wins. A
//! name such as `product_category` satisfies both the product and category
//! rules, so the order of the checks is part of the contract.
//! [`detect_data_type()`] is independent of the role and only looks at how
//! many sampled cells parse as numbers.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::data::Cell;

/// Semantic meaning inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Date,
    Product,
    Category,
    Quantity,
    Revenue,
    Region,
    Customer,
    Other,
}

impl Role {
    /// Roles that map onto canonical record fields, in output order.
    pub const CANONICAL: [Role; 7] = [
        Role::Date,
        Role::Product,
        Role::Category,
        Role::Quantity,
        Role::Revenue,
        Role::Region,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Date => "date",
            Role::Product => "product",
            Role::Category => "category",
            Role::Quantity => "quantity",
            Role::Revenue => "revenue",
            Role::Region => "region",
            Role::Customer => "customer",
            Role::Other => "other",
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, Role::Other)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        Role::CANONICAL
            .into_iter()
            .chain([Role::Other])
            .find(|role| role.as_str() == lowered)
            .ok_or_else(|| anyhow!("Unknown role '{value}'"))
    }
}

/// Primitive type detected from sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => f.write_str("string"),
            DataType::Number => f.write_str("number"),
        }
    }
}

const DATE_TOKENS: &[&str] = &["date", "time", "when", "created"];
const PRODUCT_TOKENS: &[&str] = &["product", "item", "sku", "good", "merchandise", "article"];
const CATEGORY_TOKENS: &[&str] = &["category", "type", "class", "group"];
const QUANTITY_TOKENS: &[&str] = &["quantity", "qty", "units", "count", "pieces", "number"];
const TOTAL_SALES_NAMES: &[&str] = &["total_sales", "totalsales", "total sales"];
const REVENUE_TOKENS: &[&str] = &[
    "revenue", "sales", "amount", "total", "price", "cost", "value", "payment", "income",
];
const REGION_TOKENS: &[&str] = &[
    "region", "location", "area", "city", "state", "zone", "country", "place", "district",
];
const CUSTOMER_TOKENS: &[&str] = &[
    "segment",
    "customer",
    "client",
    "buyer",
    "user",
    "purchaser",
    "shopper",
];

/// Share thresholds used by the numeric checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum numeric share among non-empty values for quantity/revenue.
    pub role_ratio: f64,
    /// Minimum numeric share among all sampled values for [`DataType::Number`].
    pub type_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            role_ratio: 0.5,
            type_ratio: 0.7,
        }
    }
}

/// Infers the role of a column with the default thresholds.
pub fn classify(column_name: &str, sample: &[Cell]) -> Role {
    classify_with(column_name, sample, &Thresholds::default())
}

pub fn classify_with(column_name: &str, sample: &[Cell], thresholds: &Thresholds) -> Role {
    let lower = column_name.to_lowercase();
    let contains_any = |tokens: &[&str]| tokens.iter().any(|token| lower.contains(token));

    if contains_any(DATE_TOKENS) {
        return Role::Date;
    }
    if lower.contains("product") && lower.contains("category") {
        return Role::Category;
    }
    if contains_any(PRODUCT_TOKENS) {
        return Role::Product;
    }
    if contains_any(CATEGORY_TOKENS) {
        return Role::Category;
    }
    if contains_any(QUANTITY_TOKENS) && mostly_numeric(sample, thresholds.role_ratio) {
        return Role::Quantity;
    }
    if TOTAL_SALES_NAMES.contains(&lower.as_str()) {
        return Role::Revenue;
    }
    if contains_any(REVENUE_TOKENS) && mostly_numeric(sample, thresholds.role_ratio) {
        return Role::Revenue;
    }
    if contains_any(REGION_TOKENS) {
        return Role::Region;
    }
    if contains_any(CUSTOMER_TOKENS) {
        return Role::Customer;
    }
    Role::Other
}

/// `true` when at least `ratio` of the non-empty values parse as numbers.
/// A sample without any non-empty value never qualifies.
fn mostly_numeric(sample: &[Cell], ratio: f64) -> bool {
    let (non_empty, numeric) = sample
        .iter()
        .filter(|cell| !cell.is_empty())
        .fold((0usize, 0usize), |(seen, numeric), cell| {
            (seen + 1, numeric + usize::from(cell.as_number().is_some()))
        });
    non_empty > 0 && numeric as f64 / non_empty as f64 >= ratio
}

/// Detects the primitive type of a column with the default threshold.
pub fn detect_data_type(sample: &[Cell]) -> DataType {
    detect_data_type_with(sample, Thresholds::default().type_ratio)
}

/// Blank cells count against the numeric share, so a sparse column of
/// numbers can still be typed as a string.
pub fn detect_data_type_with(sample: &[Cell], ratio: f64) -> DataType {
    if sample.is_empty() {
        return DataType::String;
    }
    let numeric = sample
        .iter()
        .filter(|cell| cell.as_number().is_some())
        .count();
    if numeric as f64 / sample.len() as f64 >= ratio {
        DataType::Number
    } else {
        DataType::String
    }
}
