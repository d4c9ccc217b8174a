use rowsmith_core::DatabaseSchema;
use rowsmith_plan::{
    ConfigError, GenerationConfig, RangeBound, config_json_schema, ensure_config_valid,
    validate_config, validate_config_against_schema, validate_config_json,
};

fn schema() -> DatabaseSchema {
    serde_json::from_value(serde_json::json!({
        "schema_version": "0.1",
        "engine": "postgres",
        "schemas": [{
            "name": "public",
            "tables": [
                {
                    "name": "users",
                    "columns": [
                        {"name": "id", "type_class": "integer", "is_nullable": false},
                        {"name": "code", "type_class": "string", "is_nullable": false}
                    ],
                    "constraints": [{"kind": "primary_key", "columns": ["id"]}]
                },
                {
                    "name": "orders",
                    "columns": [
                        {"name": "id", "type_class": "integer", "is_nullable": false, "is_auto_generated": true},
                        {"name": "user_id", "type_class": "integer", "is_nullable": false},
                        {"name": "region_id", "type_class": "integer", "is_nullable": true}
                    ],
                    "constraints": [{
                        "kind": "foreign_key",
                        "columns": ["user_id"],
                        "referenced_schema": "public",
                        "referenced_table": "users",
                        "referenced_columns": ["id"]
                    }]
                }
            ]
        }]
    }))
    .expect("parse schema")
}

fn config_json() -> serde_json::Value {
    serde_json::json!({
        "seed": 42,
        "tables": [
            {
                "schema": "public",
                "table": "users",
                "rows": 10,
                "populate_columns": [
                    {"column": "id", "min": 1, "max": 10},
                    {"column": "code", "format": "U_{:04d}", "min": 1, "max": 9999}
                ]
            },
            {
                "schema": "public",
                "table": "orders",
                "rows": 30,
                "static_fks": [{"column": "region_id", "values": [1, 2, 3]}],
                "fk_ratios": {"user_id": 3.0}
            }
        ]
    })
}

#[test]
fn config_validates_against_generated_json_schema() {
    let config_schema =
        serde_json::to_value(config_json_schema()).expect("serialize config schema");

    let structural =
        validate_config_json(&config_json(), &config_schema).expect("validate config json");
    assert!(structural.errors.is_empty(), "structural errors found");

    let validated = validate_config(&config_json(), &config_schema, &schema())
        .expect("config validation should succeed");
    assert!(validated.warnings.is_empty(), "unexpected warnings");
    assert_eq!(validated.config.seed, 42);
}

#[test]
fn toml_and_json_load_the_same_config() {
    let toml = r#"
seed = 42

[[tables]]
schema = "public"
table = "users"
rows = 10

[[tables.populate_columns]]
column = "id"
min = 1
max = 10

[[tables.populate_columns]]
column = "code"
format = "U_{:04d}"
min = 1
max = 9999

[[tables]]
schema = "public"
table = "orders"
rows = 30

[tables.fk_ratios]
user_id = 3.0

[[tables.static_fks]]
column = "region_id"
values = [1, 2, 3]
"#;

    let from_toml = GenerationConfig::from_toml_str(toml).expect("parse toml");
    let from_json =
        GenerationConfig::from_json_str(&config_json().to_string()).expect("parse json");

    assert_eq!(
        serde_json::to_value(&from_toml).expect("serialize toml config"),
        serde_json::to_value(&from_json).expect("serialize json config")
    );
}

#[test]
fn unknown_columns_and_bad_ratios_are_errors() {
    let mut config: GenerationConfig =
        serde_json::from_value(config_json()).expect("parse config");
    config.tables[0].populate_columns[0].column = "missing".to_string();
    config.tables[1].fk_ratios.insert("user_id".to_string(), 0.5);

    let report = validate_config_against_schema(&config, &schema());
    let codes: Vec<&str> = report.errors.iter().map(|issue| issue.code.as_str()).collect();
    assert!(codes.contains(&"unknown_column"));
    assert!(codes.contains(&"invalid_ratio"));

    assert!(matches!(
        ensure_config_valid(&config, &schema()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn ratio_on_plain_column_is_a_warning() {
    let mut config: GenerationConfig =
        serde_json::from_value(config_json()).expect("parse config");
    config.tables[0].fk_ratios.insert("code".to_string(), 2.0);

    let warnings = ensure_config_valid(&config, &schema()).expect("still valid");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, "ratio_not_fk");
}

#[test]
fn inverted_range_fails_before_generation() {
    let mut config: GenerationConfig =
        serde_json::from_value(config_json()).expect("parse config");
    config.tables[0].populate_columns[0].min = Some(RangeBound::Integer(50));

    let report = validate_config_against_schema(&config, &schema());
    assert!(report.errors.iter().any(|issue| issue.code == "invalid_domain"));
}
