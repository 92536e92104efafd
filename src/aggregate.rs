//! Rollups over canonical records: grouped sums, averages and counts, top-N
//! selection and month-bucketed series.
//!
//! Everything here is a pure function of its inputs. Groups are reported in
//! the order their key was first seen, and every sort is stable, so identical
//! inputs always produce identical output.

use std::{collections::HashMap, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    classify::Role,
    data::{self, Cell},
    normalize::{CanonicalRecord, UNKNOWN},
};

/// Bucket label for records whose date cannot be read.
pub const INVALID_DATE: &str = "Invalid Date";

/// A field of a [`CanonicalRecord`] addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRef {
    /// One of the seven canonical fields.
    Canonical(Role),
    /// An original column, by its exact name.
    Column(String),
}

impl FieldRef {
    /// Lowercase canonical names (`revenue`, `region`, ...) select canonical
    /// fields; anything else names an original column.
    pub fn parse(name: &str) -> Self {
        Role::CANONICAL
            .into_iter()
            .find(|role| role.as_str() == name)
            .map(FieldRef::Canonical)
            .unwrap_or_else(|| FieldRef::Column(name.to_string()))
    }

    pub fn column(name: impl Into<String>) -> Self {
        FieldRef::Column(name.into())
    }

    pub fn resolve(&self, record: &CanonicalRecord) -> Cell {
        match self {
            FieldRef::Canonical(role) => record.canonical(*role),
            FieldRef::Column(name) => record.original(name).cloned().unwrap_or_default(),
        }
    }

    fn group_key(&self, record: &CanonicalRecord) -> String {
        self.resolve(record)
            .as_text()
            .map(|text| text.into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn amount(&self, record: &CanonicalRecord) -> f64 {
        self.resolve(record).number_or_zero()
    }
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        FieldRef::parse(name)
    }
}

impl From<Role> for FieldRef {
    fn from(role: Role) -> Self {
        FieldRef::Canonical(role)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Canonical(role) => write!(f, "{role}"),
            FieldRef::Column(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub name: String,
    pub value: f64,
}

/// Group key to derived value, in first-seen order unless sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aggregate {
    entries: Vec<GroupValue>,
}

impl Aggregate {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(name, value)| GroupValue {
                    name: name.into(),
                    value,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[GroupValue] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn pairs(&self) -> Vec<(&str, f64)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.value))
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }

    /// Values rounded to whole units, as charts display them.
    pub fn rounded(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|e| GroupValue {
                    name: e.name.clone(),
                    value: e.value.round(),
                })
                .collect(),
        }
    }
}

/// How grouped values are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Average,
    Count,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Sum => f.write_str("sum"),
            Aggregation::Average => f.write_str("average"),
            Aggregation::Count => f.write_str("count"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "average" | "avg" | "mean" => Ok(Aggregation::Average),
            "count" => Ok(Aggregation::Count),
            other => Err(anyhow!("Unknown aggregation '{other}'")),
        }
    }
}

struct Group {
    name: String,
    sum: f64,
    count: usize,
}

fn accumulate(records: &[CanonicalRecord], key: &FieldRef, value: Option<&FieldRef>) -> Vec<Group> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for record in records {
        let name = key.group_key(record);
        let amount = value.map(|field| field.amount(record)).unwrap_or(0.0);
        let idx = *positions.entry(name.clone()).or_insert_with(|| {
            groups.push(Group {
                name,
                sum: 0.0,
                count: 0,
            });
            groups.len() - 1
        });
        groups[idx].sum += amount;
        groups[idx].count += 1;
    }
    groups
}

/// Sum of `value` per distinct `key`. Blank keys group under `Unknown`;
/// unparseable values contribute zero.
pub fn group_sum(records: &[CanonicalRecord], key: &FieldRef, value: &FieldRef) -> Aggregate {
    Aggregate::from_pairs(
        accumulate(records, key, Some(value))
            .into_iter()
            .map(|g| (g.name, g.sum)),
    )
}

pub fn group_average(records: &[CanonicalRecord], key: &FieldRef, value: &FieldRef) -> Aggregate {
    Aggregate::from_pairs(
        accumulate(records, key, Some(value))
            .into_iter()
            .map(|g| (g.name, g.sum / g.count as f64)),
    )
}

pub fn group_count(records: &[CanonicalRecord], key: &FieldRef) -> Aggregate {
    Aggregate::from_pairs(
        accumulate(records, key, None)
            .into_iter()
            .map(|g| (g.name, g.count as f64)),
    )
}

pub fn group_by(
    records: &[CanonicalRecord],
    key: &FieldRef,
    value: &FieldRef,
    aggregation: Aggregation,
) -> Aggregate {
    match aggregation {
        Aggregation::Sum => group_sum(records, key, value),
        Aggregation::Average => group_average(records, key, value),
        Aggregation::Count => group_count(records, key),
    }
}

/// Sum of `value` over every record.
pub fn total(records: &[CanonicalRecord], value: &FieldRef) -> f64 {
    records.iter().map(|record| value.amount(record)).sum()
}

/// Mean of `value` over every record, zero for an empty slice.
pub fn mean(records: &[CanonicalRecord], value: &FieldRef) -> f64 {
    if records.is_empty() {
        0.0
    } else {
        total(records, value) / records.len() as f64
    }
}

/// The `n` largest groups, descending. Ties keep their first-seen order.
pub fn top_n(aggregate: &Aggregate, n: usize) -> Aggregate {
    let mut entries = aggregate.entries.clone();
    entries.sort_by(|a, b| b.value.total_cmp(&a.value));
    entries.truncate(n);
    Aggregate { entries }
}

/// [`top_n()`] over the groups whose value is not zero.
pub fn zero_filtered_top_n(aggregate: &Aggregate, n: usize) -> Aggregate {
    let filtered = Aggregate {
        entries: aggregate
            .entries
            .iter()
            .filter(|e| e.value != 0.0)
            .cloned()
            .collect(),
    };
    top_n(&filtered, n)
}

struct MonthBucket {
    label: String,
    key: Option<(i32, u32)>,
    sum: f64,
}

fn bucket_by_month(
    records: &[CanonicalRecord],
    date: &FieldRef,
    value: &FieldRef,
) -> Vec<MonthBucket> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<MonthBucket> = Vec::new();
    for record in records {
        let parsed = data::parse_cell_date(&date.resolve(record));
        let label = parsed
            .map(data::month_label)
            .unwrap_or_else(|| INVALID_DATE.to_string());
        let amount = value.amount(record);
        let idx = *positions.entry(label.clone()).or_insert_with(|| {
            buckets.push(MonthBucket {
                label,
                key: parsed.map(data::month_key),
                sum: 0.0,
            });
            buckets.len() - 1
        });
        buckets[idx].sum += amount;
    }
    buckets
}

/// Sum of `value` per calendar month of `date`, in order of first
/// occurrence. Unreadable dates collect under [`INVALID_DATE`].
pub fn monthly_time_series(
    records: &[CanonicalRecord],
    date: &FieldRef,
    value: &FieldRef,
) -> Aggregate {
    Aggregate::from_pairs(
        bucket_by_month(records, date, value)
            .into_iter()
            .map(|b| (b.label, b.sum)),
    )
}

/// [`monthly_time_series()`] sorted chronologically, with the
/// [`INVALID_DATE`] bucket last.
pub fn monthly_trend(records: &[CanonicalRecord], date: &FieldRef, value: &FieldRef) -> Aggregate {
    let mut buckets = bucket_by_month(records, date, value);
    buckets.sort_by_key(|b| (b.key.is_none(), b.key));
    Aggregate::from_pairs(buckets.into_iter().map(|b| (b.label, b.sum)))
}

/// A grouped chart request: `y` aggregated per `x`, rounded, largest first,
/// zero groups dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartQuery {
    pub x: FieldRef,
    pub y: FieldRef,
    pub aggregation: Aggregation,
    pub top: usize,
}

impl ChartQuery {
    pub const DEFAULT_TOP: usize = 10;

    pub fn new(x: impl Into<FieldRef>, y: impl Into<FieldRef>, aggregation: Aggregation) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            aggregation,
            top: Self::DEFAULT_TOP,
        }
    }

    pub fn execute(&self, records: &[CanonicalRecord]) -> Aggregate {
        let grouped = group_by(records, &self.x, &self.y, self.aggregation).rounded();
        zero_filtered_top_n(&grouped, self.top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::RawTable,
        normalize::{NormalizeMode, normalize},
        schema::infer_schema,
    };

    fn records(rows: Vec<Vec<(&str, &str)>>) -> Vec<CanonicalRecord> {
        let table = RawTable::from_records(rows);
        let report = infer_schema(&table);
        normalize(&table, &report.mapping, NormalizeMode::Lenient)
    }

    fn order<'a>(
        date: &'a str,
        item: &'a str,
        region: &'a str,
        sales: &'a str,
        qty: &'a str,
    ) -> Vec<(&'a str, &'a str)> {
        vec![
            ("Date", date),
            ("Item", item),
            ("Region", region),
            ("Sales", sales),
            ("Qty", qty),
        ]
    }

    fn orders() -> Vec<CanonicalRecord> {
        records(vec![
            order("2024-02-03", "Pen", "North", "10", "1"),
            order("2024-01-15", "Ink", "South", "5", "4"),
            order("2024-02-20", "Pen", "", "oops", "2"),
            order("someday", "Pad", "North", "7", "3"),
        ])
    }

    #[test]
    fn group_sum_orders_groups_by_first_appearance() {
        let sums = group_sum(&orders(), &"product".into(), &"revenue".into());
        assert_eq!(sums.pairs(), vec![("Pen", 10.0), ("Ink", 5.0), ("Pad", 7.0)]);
    }

    #[test]
    fn blank_keys_group_under_unknown() {
        let sums = group_sum(&orders(), &FieldRef::column("Region"), &"quantity".into());
        assert_eq!(sums.pairs(), vec![("North", 4.0), ("South", 4.0), ("Unknown", 2.0)]);
        let canonical = group_sum(&orders(), &"region".into(), &"quantity".into());
        assert_eq!(canonical.get("Unspecified"), Some(2.0));
    }

    #[test]
    fn average_and_count_share_grouping() {
        let orders = orders();
        let avg = group_average(&orders, &"product".into(), &"quantity".into());
        assert_eq!(avg.get("Pen"), Some(1.5));
        let count = group_count(&orders, &"product".into());
        assert_eq!(count.pairs(), vec![("Pen", 2.0), ("Ink", 1.0), ("Pad", 1.0)]);
        assert_eq!(
            group_by(&orders, &"product".into(), &"quantity".into(), Aggregation::Count),
            count
        );
    }

    #[test]
    fn original_columns_are_summed_as_numbers() {
        let sums = group_sum(&orders(), &"product".into(), &FieldRef::column("Sales"));
        assert_eq!(sums.get("Pen"), Some(10.0));
    }

    #[test]
    fn top_n_is_stable_for_ties() {
        let aggregate = Aggregate::from_pairs([
            ("a", 50.0),
            ("b", 30.0),
            ("c", 30.0),
            ("d", 10.0),
            ("e", 5.0),
        ]);
        let top = top_n(&aggregate, 3);
        assert_eq!(top.pairs(), vec![("a", 50.0), ("b", 30.0), ("c", 30.0)]);

        let reversed = Aggregate::from_pairs([("e", 5.0), ("c", 30.0), ("b", 30.0)]);
        assert_eq!(top_n(&reversed, 2).names(), vec!["c", "b"]);
        assert_eq!(top_n(&aggregate, 10).len(), 5);
    }

    #[test]
    fn zero_filtered_top_n_skips_zero_groups() {
        let aggregate = Aggregate::from_pairs([("a", 0.0), ("b", 3.0), ("c", 0.0), ("d", 1.0)]);
        assert_eq!(zero_filtered_top_n(&aggregate, 5).names(), vec!["b", "d"]);
        assert_eq!(zero_filtered_top_n(&aggregate, 1).names(), vec!["b"]);
        let zeros = Aggregate::from_pairs([("a", 0.0)]);
        assert!(zero_filtered_top_n(&zeros, 3).is_empty());
    }

    #[test]
    fn monthly_series_keeps_insertion_order() {
        let series = monthly_time_series(&orders(), &"date".into(), &"quantity".into());
        assert_eq!(
            series.pairs(),
            vec![("Feb 2024", 3.0), ("Jan 2024", 4.0), (INVALID_DATE, 3.0)]
        );
    }

    #[test]
    fn monthly_trend_sorts_chronologically_with_invalid_last() {
        let mut rows = orders();
        rows.rotate_left(3);
        let trend = monthly_trend(&rows, &"date".into(), &"quantity".into());
        assert_eq!(trend.names(), vec!["Jan 2024", "Feb 2024", INVALID_DATE]);
    }

    #[test]
    fn missing_dates_are_invalid_buckets() {
        let rows = records(vec![vec![("Item", "Pen"), ("Qty", "2")]]);
        let series = monthly_time_series(&rows, &"date".into(), &"quantity".into());
        assert_eq!(series.pairs(), vec![(INVALID_DATE, 2.0)]);
    }

    #[test]
    fn chart_query_rounds_sorts_and_drops_zero_groups() {
        let rows = records(vec![
            vec![("Region", "East"), ("Amount", "2.4")],
            vec![("Region", "West"), ("Amount", "0.2")],
            vec![("Region", "East"), ("Amount", "1.3")],
            vec![("Region", "North"), ("Amount", "9")],
        ]);
        let query = ChartQuery::new("region", "revenue", Aggregation::Sum);
        assert_eq!(query.execute(&rows).pairs(), vec![("North", 9.0), ("East", 4.0)]);
    }

    #[test]
    fn field_ref_parse_prefers_lowercase_canonical_names() {
        assert_eq!(FieldRef::parse("revenue"), FieldRef::Canonical(Role::Revenue));
        assert_eq!(FieldRef::parse("Revenue"), FieldRef::column("Revenue"));
        assert_eq!(FieldRef::parse("other"), FieldRef::column("other"));
        assert_eq!("avg".parse::<Aggregation>().unwrap(), Aggregation::Average);
    }

    #[test]
    fn totals_and_means() {
        let orders = orders();
        assert_eq!(total(&orders, &"revenue".into()), 22.0);
        assert_eq!(mean(&orders, &"quantity".into()), 2.5);
        assert_eq!(mean(&[], &"quantity".into()), 0.0);
    }
}
