use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use encoding_rs::UTF_8;
use sales_lens::aggregate::{self, Aggregation, ChartQuery, FieldRef};
use sales_lens::classify::Role;
use sales_lens::io_utils;
use sales_lens::normalize::{NormalizeMode, normalize};
use sales_lens::schema::infer_schema;
use sales_lens::summary::chart_data;
use tempfile::TempDir;

const REGIONS: [&str; 5] = ["Addis Ababa", "Afar", "Amhara", "Oromia", "Tigray"];
const PRODUCTS: [&str; 4] = ["Coffee Beans", "Tea Leaves", "Honey", "Teff Flour"];

fn generate_sales(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("sales.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "Order Date,Item,Units Sold,Total Sales,Region").expect("header");
    for i in 0..rows {
        let month = (i % 12) + 1;
        let day = (i % 28) + 1;
        let units = (i % 9) + 1;
        writeln!(
            file,
            "2024-{month:02}-{day:02},{},{units},{}.50,{}",
            PRODUCTS[i % PRODUCTS.len()],
            units * 20,
            REGIONS[i % REGIONS.len()]
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_rollups(c: &mut Criterion) {
    let (_dir, csv_path) = generate_sales(20_000);
    let table = io_utils::read_table(&csv_path, None, UTF_8).expect("read sales");
    let schema = infer_schema(&table);
    let records = normalize(&table, &schema.mapping, NormalizeMode::Lenient);
    let region = FieldRef::Canonical(Role::Region);
    let revenue = FieldRef::Canonical(Role::Revenue);

    c.bench_function("normalize_lenient", |b| {
        b.iter_batched(
            || table.clone(),
            |table| normalize(&table, &schema.mapping, NormalizeMode::Lenient),
            BatchSize::LargeInput,
        )
    });
    c.bench_function("group_sum_by_region", |b| {
        b.iter(|| aggregate::group_sum(&records, &region, &revenue))
    });
    c.bench_function("monthly_trend", |b| {
        b.iter(|| aggregate::monthly_trend(&records, &Role::Date.into(), &revenue))
    });
    c.bench_function("chart_query_average", |b| {
        let query = ChartQuery::new(Role::Product, Role::Quantity, Aggregation::Average);
        b.iter(|| query.execute(&records))
    });
    c.bench_function("chart_data", |b| b.iter(|| chart_data(&records)));
}

criterion_group!(benches, bench_rollups);
criterion_main!(benches);
