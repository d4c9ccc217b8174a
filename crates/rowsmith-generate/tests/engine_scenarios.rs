use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use rowsmith_core::DatabaseSchema;
use rowsmith_generate::{
    CollectingSink, GenerateOptions, GeneratedValue, GenerationEngine, GenerationError,
    GenerationReport, Row, TableStatus,
};
use rowsmith_plan::GenerationConfig;
use serde_json::json;

fn load_schema() -> DatabaseSchema {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shop.schema.json");
    let contents =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing json at {}", path.display()));
    serde_json::from_str(&contents).expect("parse schema")
}

fn config(value: serde_json::Value) -> GenerationConfig {
    serde_json::from_value(value).expect("parse config")
}

fn engine(workers: usize) -> GenerationEngine {
    GenerationEngine::new(GenerateOptions {
        workers,
        chunk_rows: 500,
        ..GenerateOptions::default()
    })
}

fn run_ok(config: &GenerationConfig) -> (GenerationReport, CollectingSink) {
    let mut sink = CollectingSink::new();
    let report = engine(4)
        .run(&load_schema(), config, &mut sink)
        .expect("run generation");
    (report, sink)
}

fn int(row: &Row, column: &str) -> i64 {
    row.get(column)
        .and_then(GeneratedValue::as_i64)
        .unwrap_or_else(|| panic!("column {column} is not an integer in {row:?}"))
}

fn text<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column)
        .and_then(GeneratedValue::as_str)
        .unwrap_or_else(|| panic!("column {column} is not text in {row:?}"))
}

#[test]
fn overlapping_uniques_are_balanced_per_shared_key() {
    let config = config(json!({
        "seed": 42,
        "tables": [{
            "schema": "shop",
            "table": "enrollments",
            "rows": 6000,
            "populate_columns": [
                { "column": "a_id", "min": 1, "max": 3000 },
                { "column": "c_id", "min": 1, "max": 10 },
                { "column": "pr", "min": 0, "max": 1 }
            ]
        }]
    }));
    let (report, sink) = run_ok(&config);
    let rows = sink.rows("shop", "enrollments").expect("enrollments rows");
    assert_eq!(rows.len(), 6000);

    let a_c: HashSet<(i64, i64)> = rows.iter().map(|row| (int(row, "a_id"), int(row, "c_id"))).collect();
    let a_pr: HashSet<(i64, i64)> = rows.iter().map(|row| (int(row, "a_id"), int(row, "pr"))).collect();
    assert_eq!(a_c.len(), 6000, "duplicate (a_id, c_id)");
    assert_eq!(a_pr.len(), 6000, "duplicate (a_id, pr)");

    let mut per_a: HashMap<i64, BTreeSet<i64>> = HashMap::new();
    for row in rows {
        per_a.entry(int(row, "a_id")).or_default().insert(int(row, "pr"));
    }
    assert_eq!(per_a.len(), 3000);
    assert!(per_a.values().all(|prs| *prs == BTreeSet::from([0, 1])));

    let table = report.table("shop", "enrollments").expect("table report");
    assert_eq!(table.strategy, vec!["overlap_group:uq_a_c+uq_a_pr".to_string()]);
    assert_eq!(report.warnings_with_code("capacity_shortfall").count(), 0);
}

#[test]
fn template_pool_wraps_once_past_capacity() {
    let config = config(json!({
        "seed": 7,
        "tables": [{
            "schema": "shop",
            "table": "codes",
            "rows": 2000,
            "populate_columns": [
                { "column": "code", "format": "CODE_{:03d}_{:02d}", "min": 100, "max": 200 }
            ]
        }]
    }));
    let (report, sink) = run_ok(&config);
    let rows = sink.rows("shop", "codes").expect("codes rows");
    assert_eq!(rows.len(), 2000);
    assert!(rows.iter().all(|row| !row.contains_key("id")));

    let codes: Vec<&str> = rows.iter().map(|row| text(row, "code")).collect();
    assert_eq!(codes[0], "CODE_100_00");
    assert_eq!(codes[1], "CODE_101_00");
    let first_cycle: HashSet<&str> = codes[..1010].iter().copied().collect();
    assert_eq!(first_cycle.len(), 1010);
    assert_eq!(codes[1010], codes[0]);

    let wrapped: Vec<_> = report.warnings_with_code("allocator_wrapped").collect();
    assert_eq!(wrapped.len(), 1);
    assert_eq!(wrapped[0].column.as_deref(), Some("code"));
    assert_eq!(wrapped[0].available, Some(1010));
    assert_eq!(wrapped[0].requested, Some(2000));
}

#[test]
fn short_composite_fk_pool_cycles_evenly() {
    let config = config(json!({
        "seed": 3,
        "tables": [
            { "schema": "shop", "table": "teams", "rows": 5 },
            { "schema": "shop", "table": "players", "rows": 5 },
            { "schema": "shop", "table": "rosters", "rows": 100 }
        ]
    }));
    let (report, sink) = run_ok(&config);
    let rows = sink.rows("shop", "rosters").expect("roster rows");
    assert_eq!(rows.len(), 100);

    let mut counts: HashMap<(i64, i64), u32> = HashMap::new();
    for row in rows {
        let pair = (int(row, "team_id"), int(row, "player_id"));
        assert!((1..=5).contains(&pair.0) && (1..=5).contains(&pair.1));
        *counts.entry(pair).or_default() += 1;
    }
    assert_eq!(counts.len(), 25);
    assert!(counts.values().all(|count| *count == 4));

    let shortfall: Vec<_> = report.warnings_with_code("capacity_shortfall").collect();
    assert_eq!(shortfall.len(), 1);
    assert_eq!(shortfall[0].constraint.as_deref(), Some("uq_roster"));
    assert_eq!(shortfall[0].requested, Some(100));
    assert_eq!(shortfall[0].available, Some(25));
}

#[test]
fn roster_pairs_stay_distinct_within_capacity() {
    let config = config(json!({
        "seed": 17,
        "tables": [
            { "schema": "shop", "table": "teams", "rows": 8 },
            { "schema": "shop", "table": "players", "rows": 9 },
            { "schema": "shop", "table": "rosters", "rows": 60 }
        ]
    }));
    let (report, sink) = run_ok(&config);
    let rows = sink.rows("shop", "rosters").expect("roster rows");
    assert_eq!(rows.len(), 60);

    let pairs: HashSet<(i64, i64)> = rows
        .iter()
        .map(|row| (int(row, "team_id"), int(row, "player_id")))
        .collect();
    assert_eq!(pairs.len(), 60, "duplicate (team_id, player_id)");
    assert!(pairs
        .iter()
        .all(|(team, player)| (1..=8).contains(team) && (1..=9).contains(player)));
    assert_eq!(report.warnings_with_code("capacity_shortfall").count(), 0);
}

#[test]
fn typed_columns_follow_their_ranges() {
    let config = config(json!({
        "seed": 9,
        "tables": [{
            "schema": "shop",
            "table": "employees",
            "rows": 300,
            "populate_columns": [
                { "column": "badge", "min": 1000, "max": 9999 },
                { "column": "salary", "min": 10, "max": 1000 },
                { "column": "hired_on", "min": "2020-01-01", "max": "2024-12-31" },
                { "column": "last_login", "min": "2024-01-01", "max": "2024-03-31" }
            ]
        }]
    }));
    let (report, sink) = run_ok(&config);
    let rows = sink.rows("shop", "employees").expect("employee rows");
    assert_eq!(rows.len(), 300);
    assert_eq!(report.warnings_with_code("capacity_shortfall").count(), 0);

    let mut badges = HashSet::new();
    let mut salaries = HashSet::new();
    let mut hired = HashSet::new();
    for row in rows {
        let badge = text(row, "badge");
        assert!(badge.chars().all(|ch| ch.is_ascii_digit()), "badge {badge}");
        let number: i64 = badge.parse().expect("digits");
        assert!((1000..=9999).contains(&number));
        badges.insert(badge.to_string());

        let Some(GeneratedValue::Decimal { units, scale }) = row.get("salary") else {
            panic!("salary is not a decimal in {row:?}");
        };
        assert_eq!(*scale, 2);
        assert!((1_000..=100_000).contains(units));
        salaries.insert(*units);

        let hired_on = text(row, "hired_on");
        assert_eq!(hired_on.len(), 10);
        assert!(("2020-01-01"..="2024-12-31").contains(&hired_on), "hired_on {hired_on}");
        hired.insert(hired_on.to_string());

        let last_login = text(row, "last_login");
        assert_eq!(last_login.len(), 19);
        assert!(
            ("2024-01-01 00:00:00"..="2024-03-31 23:59:59").contains(&last_login),
            "last_login {last_login}"
        );

        let skills = text(row, "skills");
        assert!(skills.is_empty() || skills.split(',').all(|m| ["rust", "sql", "go"].contains(&m)));
        assert_eq!(text(row, "external_id").len(), 36);
        assert!(matches!(row.get("active"), Some(GeneratedValue::Bool(_))));
        assert_eq!(text(row, "payload").len(), 8);
    }
    assert_eq!(badges.len(), 300);
    assert_eq!(salaries.len(), 300);
    assert_eq!(hired.len(), 300);
}

#[test]
fn same_seed_gives_same_rows() {
    let config = config(json!({
        "seed": 2024,
        "tables": [
            { "schema": "shop", "table": "teams", "rows": 8 },
            { "schema": "shop", "table": "players", "rows": 9 },
            { "schema": "shop", "table": "rosters", "rows": 60 },
            { "schema": "shop", "table": "users", "rows": 40 },
            {
                "schema": "shop",
                "table": "orders",
                "rows": 1200,
                "populate_columns": [{ "column": "total", "min": 1, "max": 999 }]
            }
        ]
    }));
    let schema = load_schema();

    let mut first = CollectingSink::new();
    engine(4).run(&schema, &config, &mut first).expect("first run");
    let mut second = CollectingSink::new();
    engine(4).run(&schema, &config, &mut second).expect("second run");
    let mut single = CollectingSink::new();
    engine(1).run(&schema, &config, &mut single).expect("single worker run");

    let first = first.into_tables();
    assert_eq!(first, second.into_tables());
    assert_eq!(first, single.into_tables());
}

#[test]
fn conditional_fk_follows_the_discriminator() {
    let config = config(json!({
        "seed": 11,
        "tables": [
            { "schema": "shop", "table": "users", "rows": 3 },
            {
                "schema": "shop",
                "table": "groups",
                "rows": 5,
                "populate_columns": [{ "column": "code", "min": 100, "max": 199 }]
            },
            {
                "schema": "shop",
                "table": "memberships",
                "rows": 50,
                "logical_fks": [
                    {
                        "column": "owner_id",
                        "referenced_table": "users",
                        "referenced_column": "id",
                        "condition": "owner_type = 'user'"
                    },
                    {
                        "column": "owner_id",
                        "referenced_table": "groups",
                        "referenced_column": "code",
                        "condition": "owner_type = 'group'"
                    }
                ]
            }
        ]
    }));
    let (_, sink) = run_ok(&config);
    let rows = sink.rows("shop", "memberships").expect("membership rows");
    assert_eq!(rows.len(), 50);
    for row in rows {
        let owner = int(row, "owner_id");
        match text(row, "owner_type") {
            "user" => assert!((1..=3).contains(&owner), "user owner {owner}"),
            "group" => assert!((100..=104).contains(&owner), "group owner {owner}"),
            other => panic!("unexpected owner_type {other}"),
        }
    }
}

#[test]
fn unmatched_condition_fails_only_its_table() {
    let config = config(json!({
        "seed": 5,
        "tables": [
            { "schema": "shop", "table": "users", "rows": 3 },
            {
                "schema": "shop",
                "table": "notes",
                "rows": 10,
                "logical_fks": [{
                    "column": "owner_id",
                    "referenced_table": "users",
                    "referenced_column": "id",
                    "condition": "owner_type = 'user'"
                }]
            },
            {
                "schema": "shop",
                "table": "codes",
                "rows": 10,
                "populate_columns": [{ "column": "code", "format": "N{}", "min": 0, "max": 99 }]
            }
        ]
    }));
    let mut sink = CollectingSink::new();
    let err = engine(2)
        .run(&load_schema(), &config, &mut sink)
        .expect_err("notes must fail");
    let report = match err {
        GenerationError::Failed(report) => report,
        other => panic!("expected a failed-run report, got {other}"),
    };

    let notes = report.table("shop", "notes").expect("notes report");
    assert_eq!(notes.status, TableStatus::Failed);
    assert_eq!(report.table("shop", "codes").map(|t| t.status), Some(TableStatus::Completed));
    assert_eq!(report.table("shop", "users").map(|t| t.status), Some(TableStatus::Completed));
    assert!(report
        .errors
        .iter()
        .any(|issue| issue.code == "table_failed" && issue.message.contains("no condition matched")));

    assert!(sink.rows("shop", "notes").is_none());
    assert_eq!(sink.rows("shop", "codes").map(<[Row]>::len), Some(10));
}

#[test]
fn missing_parent_fails_table_and_skips_children() {
    let config = config(json!({
        "seed": 9,
        "tables": [
            { "schema": "shop", "table": "orders", "rows": 10 },
            { "schema": "shop", "table": "order_items", "rows": 10 },
            { "schema": "shop", "table": "teams", "rows": 4 }
        ]
    }));
    let mut sink = CollectingSink::new();
    let err = engine(2)
        .run(&load_schema(), &config, &mut sink)
        .expect_err("orders has no parent");
    let report = match err {
        GenerationError::Failed(report) => report,
        other => panic!("expected a failed-run report, got {other}"),
    };

    assert_eq!(report.table("shop", "orders").map(|t| t.status), Some(TableStatus::Failed));
    assert_eq!(
        report.table("shop", "order_items").map(|t| t.status),
        Some(TableStatus::Skipped)
    );
    assert_eq!(report.table("shop", "teams").map(|t| t.status), Some(TableStatus::Completed));
    assert_eq!(report.warnings_with_code("parent_failed").count(), 1);
    assert!(report.errors[0].message.contains("shop.users"));
    assert_eq!(sink.rows("shop", "teams").map(<[Row]>::len), Some(4));
}

#[test]
fn static_fks_stand_in_for_parent_tables() {
    let config = config(json!({
        "seed": 1,
        "tables": [{
            "schema": "shop",
            "table": "orders",
            "rows": 30,
            "static_fks": [{ "column": "user_id", "values": [10, 20, 30], "source": "prod sample" }]
        }]
    }));
    let (report, sink) = run_ok(&config);
    let rows = sink.rows("shop", "orders").expect("orders rows");
    assert_eq!(rows.len(), 30);
    assert!(rows.iter().all(|row| [10, 20, 30].contains(&int(row, "user_id"))));
    assert!(report.errors.is_empty());
}

#[test]
fn fk_ratio_clusters_children_per_parent() {
    let config = config(json!({
        "seed": 8,
        "tables": [
            { "schema": "shop", "table": "users", "rows": 200 },
            {
                "schema": "shop",
                "table": "orders",
                "rows": 100,
                "fk_ratios": { "user_id": 5.0 }
            }
        ]
    }));
    let (_, sink) = run_ok(&config);
    let rows = sink.rows("shop", "orders").expect("orders rows");
    let parents: HashSet<i64> = rows.iter().map(|row| int(row, "user_id")).collect();
    assert!(parents.len() <= 20, "{} distinct parents", parents.len());
    for block in rows.chunks(5) {
        let first = int(&block[0], "user_id");
        assert!(block.iter().all(|row| int(row, "user_id") == first));
    }
}

#[test]
fn malformed_template_aborts_before_generation() {
    let config = config(json!({
        "seed": 1,
        "tables": [
            { "schema": "shop", "table": "teams", "rows": 3 },
            {
                "schema": "shop",
                "table": "codes",
                "rows": 3,
                "populate_columns": [{ "column": "code", "format": "CODE", "min": 1, "max": 2 }]
            }
        ]
    }));
    let mut sink = CollectingSink::new();
    let err = engine(1)
        .run(&load_schema(), &config, &mut sink)
        .expect_err("template without placeholders");
    assert!(matches!(err, GenerationError::Format { .. }));
    assert_eq!(sink.table_keys().count(), 0);
}

#[test]
fn unknown_column_is_a_config_error() {
    let config = config(json!({
        "seed": 1,
        "tables": [{
            "schema": "shop",
            "table": "teams",
            "rows": 3,
            "populate_columns": [{ "column": "missing", "values": ["x"] }]
        }]
    }));
    let mut sink = CollectingSink::new();
    let err = engine(1)
        .run(&load_schema(), &config, &mut sink)
        .expect_err("unknown column");
    assert!(matches!(err, GenerationError::Config(_)));
}
