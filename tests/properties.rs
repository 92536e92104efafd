mod common;

use common::{analyze, table};
use proptest::prelude::*;
use sales_lens::{
    aggregate::{self, Aggregate, FieldRef},
    classify::{Role, classify},
    data::{Cell, RawTable},
    normalize::{NormalizeMode, normalize},
    schema::infer_schema,
};

fn numbers(values: &[&str]) -> Vec<Cell> {
    values.iter().map(|v| Cell::from(*v)).collect()
}

#[test]
fn total_sales_variants_classify_as_revenue() {
    let sample = numbers(&["10", "20.5", "0"]);
    for name in [
        "total_sales",
        "Total_Sales",
        "TOTAL SALES",
        "TotalSales",
        "total sales",
    ] {
        assert_eq!(classify(name, &sample), Role::Revenue, "{name}");
    }
}

#[test]
fn total_sales_is_revenue_even_when_values_are_text() {
    let sample = numbers(&["n/a", "pending"]);
    assert_eq!(classify("Total_Sales", &sample), Role::Revenue);
    assert_eq!(classify("Sales Amount", &sample), Role::Other);
}

#[test]
fn product_category_names_are_never_products() {
    for name in ["Product_Category", "product_category", "PRODUCT_CATEGORY_CODE"] {
        assert_eq!(classify(name, &numbers(&["Toys"])), Role::Category, "{name}");
    }
}

#[test]
fn normalize_keeps_every_original_key() {
    let table = table(&[
        &[("Item", "Pen"), ("Memo", "x"), ("Sales", "3")],
        &[("Item", "Ink"), ("Warehouse", "B"), ("Sales", "")],
    ]);
    let (_, records) = analyze(&table);
    for (record, row) in records.iter().zip(table.rows()) {
        for (key, value) in row {
            assert_eq!(record.fields.get(key), Some(value));
        }
    }
}

#[test]
fn normalize_is_deterministic() {
    let table = table(&[
        &[("Date", "2024-05-01"), ("Item", "Pen"), ("Sales", "3")],
        &[("Date", "bad"), ("Item", ""), ("Sales", "x")],
    ]);
    let schema = infer_schema(&table);
    for mode in [NormalizeMode::Lenient, NormalizeMode::Strict] {
        let first = normalize(&table, &schema.mapping, mode);
        let second = normalize(&table, &schema.mapping, mode);
        assert_eq!(first, second);
    }
}

#[test]
fn top_n_keeps_first_seen_order_for_ties() {
    let aggregate = Aggregate::from_pairs([
        ("a", 50.0),
        ("b", 30.0),
        ("c", 30.0),
        ("d", 10.0),
        ("e", 5.0),
    ]);
    let top = aggregate::top_n(&aggregate, 3);
    assert_eq!(top.pairs(), vec![("a", 50.0), ("b", 30.0), ("c", 30.0)]);

    let reversed = Aggregate::from_pairs([
        ("e", 5.0),
        ("c", 30.0),
        ("d", 10.0),
        ("b", 30.0),
        ("a", 50.0),
    ]);
    assert_eq!(aggregate::top_n(&reversed, 3).names(), vec!["a", "c", "b"]);
}

fn region_table(rows: &[(usize, u32)]) -> RawTable {
    const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
    RawTable::from_records(rows.iter().map(|(region, amount)| {
        vec![
            ("Region", Cell::from(REGIONS[*region])),
            ("Sales", Cell::Number(f64::from(*amount) / 4.0)),
        ]
    }))
}

proptest! {
    #[test]
    fn group_sums_ignore_row_order(
        (rows, shuffled) in proptest::collection::vec((0usize..4, 0u32..10_000), 1..40)
            .prop_flat_map(|rows| {
                let shuffled = Just(rows.clone()).prop_shuffle();
                (Just(rows), shuffled)
            })
    ) {
        let key = FieldRef::Canonical(Role::Region);
        let value = FieldRef::Canonical(Role::Revenue);
        let (_, original) = analyze(&region_table(&rows));
        let (_, reordered) = analyze(&region_table(&shuffled));
        let expected = aggregate::group_sum(&original, &key, &value);
        let actual = aggregate::group_sum(&reordered, &key, &value);

        prop_assert_eq!(expected.len(), actual.len());
        for entry in expected.entries() {
            let other = actual.get(&entry.name).expect("group present after shuffle");
            prop_assert!((entry.value - other).abs() < 1e-6);
        }
    }

    #[test]
    fn top_n_never_exceeds_n(
        values in proptest::collection::vec(0u32..100, 0..20),
        n in 0usize..8,
    ) {
        let aggregate = Aggregate::from_pairs(
            values.iter().enumerate().map(|(idx, v)| (format!("g{idx}"), f64::from(*v))),
        );
        let top = aggregate::top_n(&aggregate, n);
        prop_assert_eq!(top.len(), n.min(values.len()));
        let ranked: Vec<f64> = top.entries().iter().map(|e| e.value).collect();
        prop_assert!(ranked.windows(2).all(|pair| pair[0] >= pair[1]));
    }
}
