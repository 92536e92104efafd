//! Key-value summaries and chart datasets derived from canonical records.
//!
//! [`summarize()`] produces the structured digest handed to a text-generation
//! collaborator: totals, distinct dimension values, per-product and
//! per-region statistics and a monthly trend. It never produces prose.
//! [`chart_data()`] builds the three dashboard series.

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{self, Aggregate, FieldRef},
    classify::Role,
    data,
    normalize::{CanonicalRecord, SENTINELS},
    schema::{ColumnMapping, SchemaReport},
};

/// The numeric field insights are ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Revenue,
    Quantity,
}

impl Metric {
    /// Revenue, unless it sums to zero across `records` (e.g. a sales column
    /// that was exported empty), in which case quantity.
    pub fn select(records: &[CanonicalRecord]) -> Self {
        if aggregate::total(records, &Role::Revenue.into()) == 0.0 {
            Metric::Quantity
        } else {
            Metric::Revenue
        }
    }

    pub fn field(&self) -> FieldRef {
        match self {
            Metric::Revenue => FieldRef::Canonical(Role::Revenue),
            Metric::Quantity => FieldRef::Canonical(Role::Quantity),
        }
    }

    fn of(&self, stats: &GroupStats) -> f64 {
        match self {
            Metric::Revenue => stats.revenue,
            Metric::Quantity => stats.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub name: String,
    pub revenue: f64,
    pub quantity: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Entries kept in `top_products`.
    pub top: usize,
    /// Restrict product statistics to one region.
    pub region: Option<String>,
    /// Customer fallbacks written by normalization; left out of `customers`.
    pub customer_fallbacks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total_records: usize,
    pub columns: Vec<String>,
    pub mapping: ColumnMapping,
    pub metric: Metric,
    pub total_revenue: f64,
    pub total_quantity: f64,
    pub average_revenue: f64,
    pub average_quantity: f64,
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    pub customers: Vec<String>,
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_filter: Option<String>,
    pub filtered_records: usize,
    pub top_products: Vec<GroupStats>,
    pub region_performance: Vec<GroupStats>,
    pub monthly_trend: Aggregate,
}

pub fn summarize(
    records: &[CanonicalRecord],
    schema: &SchemaReport,
    options: &SummaryOptions,
) -> SalesSummary {
    let revenue = FieldRef::Canonical(Role::Revenue);
    let quantity = FieldRef::Canonical(Role::Quantity);
    let metric = Metric::select(records);

    let filtered: Vec<CanonicalRecord> = match &options.region {
        Some(region) => records
            .iter()
            .filter(|r| r.region.eq_ignore_ascii_case(region))
            .cloned()
            .collect(),
        None => records.to_vec(),
    };
    debug!(
        "Summarizing {} record(s) by {:?} ({} after region filter)",
        records.len(),
        metric,
        filtered.len()
    );

    let mut top_products = group_stats(&filtered, &Role::Product.into());
    rank(&mut top_products, metric);
    top_products.truncate(options.top);
    let mut region_performance = group_stats(records, &Role::Region.into());
    rank(&mut region_performance, metric);

    SalesSummary {
        total_records: records.len(),
        columns: schema.stats.columns.clone(),
        mapping: schema.mapping.clone(),
        metric,
        total_revenue: aggregate::total(records, &revenue),
        total_quantity: aggregate::total(records, &quantity),
        average_revenue: aggregate::mean(records, &revenue),
        average_quantity: aggregate::mean(records, &quantity),
        regions: distinct(records.iter().map(|r| r.region.as_str())),
        categories: distinct(records.iter().map(|r| r.category.as_str())),
        customers: distinct(
            records
                .iter()
                .map(|r| r.customer.as_str())
                .filter(|customer| !options.customer_fallbacks.iter().any(|f| f == customer)),
        ),
        date_range: date_range(records),
        region_filter: options.region.clone(),
        filtered_records: filtered.len(),
        top_products,
        region_performance,
        monthly_trend: aggregate::monthly_trend(records, &Role::Date.into(), &metric.field()),
    }
}

/// Revenue, quantity and row count per group, in first-seen order.
pub fn group_stats(records: &[CanonicalRecord], key: &FieldRef) -> Vec<GroupStats> {
    let revenue = aggregate::group_sum(records, key, &Role::Revenue.into());
    let quantity = aggregate::group_sum(records, key, &Role::Quantity.into());
    let counts = aggregate::group_count(records, key);
    revenue
        .entries()
        .iter()
        .zip(quantity.entries())
        .zip(counts.entries())
        .map(|((rev, qty), count)| GroupStats {
            name: rev.name.clone(),
            revenue: rev.value,
            quantity: qty.value,
            count: count.value as usize,
        })
        .collect()
}

fn rank(stats: &mut [GroupStats], metric: Metric) {
    stats.sort_by(|a, b| metric.of(b).total_cmp(&metric.of(a)));
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|value| !SENTINELS.contains(value))
        .unique()
        .map(str::to_string)
        .collect()
}

fn date_range(records: &[CanonicalRecord]) -> Option<DateRange> {
    let (first, last) = records
        .iter()
        .filter_map(|r| data::parse_cell_date(&r.canonical(Role::Date)))
        .minmax()
        .into_option()?;
    Some(DateRange { first, last })
}

/// Series rendered by the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Monthly revenue in order of first occurrence.
    pub line: Aggregate,
    /// Best selling products by revenue.
    pub bar: Aggregate,
    /// Revenue share per category.
    pub pie: Aggregate,
}

pub const BAR_CHART_TOP: usize = 6;

pub fn chart_data(records: &[CanonicalRecord]) -> ChartData {
    let revenue = FieldRef::Canonical(Role::Revenue);
    ChartData {
        line: aggregate::monthly_time_series(records, &Role::Date.into(), &revenue).rounded(),
        bar: aggregate::top_n(
            &aggregate::group_sum(records, &Role::Product.into(), &revenue),
            BAR_CHART_TOP,
        )
        .rounded(),
        pie: aggregate::group_sum(records, &Role::Category.into(), &revenue).rounded(),
    }
}
