//! Integration test: federated joins over Parquet files and local tables.
//!
//! Remote databases are stood in for by tables created directly in the
//! engine and referenced from a query template, which exercises the same
//! compose, execute and materialize path as an attached `PostgreSQL` source.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray, Float64Array, Int32Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Int32Type, Schema};
use arrowlake_db::{
    ColumnRef, DbError, Engine, FederationConfig, JoinCondition, JoinOrchestrator, JoinPhase,
    JoinSpec, JoinState, JoinType, ParquetLoadMode, SourceSpec,
};

/// Writes `(id INT32, amount FLOAT64)` rows to `dir/file`.
fn write_parquet(dir: &Path, file: &str, ids: &[i32]) -> String {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("amount", DataType::Float64, true),
    ]));
    let amounts: Vec<f64> = ids.iter().map(|i| f64::from(*i) * 1.5).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from(ids.to_vec())),
            Arc::new(Float64Array::from(amounts)),
        ],
    )
    .unwrap();
    let path = dir.join(file);
    let mut writer =
        parquet::arrow::ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None)
            .unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path.to_string_lossy().into_owned()
}

fn on_id(left: &str, right: &str) -> JoinCondition {
    JoinCondition::new(ColumnRef::new(left, "id"), ColumnRef::new(right, "id"))
}

#[test]
fn test_synthesized_parquet_join() {
    let dir = tempfile::tempdir().unwrap();
    let left = write_parquet(dir.path(), "left.parquet", &[1, 2]);
    let right = write_parquet(dir.path(), "right.parquet", &[1, 3]);
    let mut engine = Engine::open_in_memory().unwrap();

    let config = FederationConfig::new(
        vec![
            SourceSpec::parquet("parquet_table", left),
            SourceSpec::parquet("other_table", right).with_load_mode(ParquetLoadMode::Eager),
        ],
        JoinSpec {
            conditions: vec![on_id("parquet_table", "other_table")],
            select_columns: vec!["parquet_table.id".into(), "other_table.amount".into()],
            ..JoinSpec::default()
        },
    );

    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    let batch = orchestrator.run(&config).unwrap();

    assert_eq!(orchestrator.state(), JoinState::Active(JoinPhase::Done));
    assert_eq!(
        orchestrator.sql(),
        Some(
            "SELECT parquet_table.id, other_table.amount FROM parquet_table AS parquet_table \
             INNER JOIN other_table AS other_table ON parquet_table.id = other_table.id"
        )
    );
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(batch.num_columns(), 2);
    assert_eq!(batch.column(0).as_primitive::<Int32Type>().value(0), 1);
    for column in batch.columns() {
        assert_eq!(column.len(), batch.num_rows());
    }
}

#[test]
fn test_default_select_list_over_shared_join_column() {
    let dir = tempfile::tempdir().unwrap();
    let left = write_parquet(dir.path(), "a.parquet", &[1, 2]);
    let right = write_parquet(dir.path(), "b.parquet", &[1, 3]);
    let mut engine = Engine::open_in_memory().unwrap();

    let config = FederationConfig::new(
        vec![SourceSpec::parquet("a", left), SourceSpec::parquet("b", right)],
        JoinSpec {
            conditions: vec![on_id("a", "b")],
            ..JoinSpec::default()
        },
    );
    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    let batch = orchestrator.run(&config).unwrap();

    assert_eq!(
        orchestrator.sql(),
        Some("SELECT * FROM a AS a INNER JOIN b AS b ON a.id = b.id")
    );
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(batch.num_columns(), 4);
    let schema = batch.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, ["id", "amount", "id_1", "amount_1"]);
    assert_eq!(batch.column(0).as_primitive::<Int32Type>().value(0), 1);
    assert_eq!(batch.column(2).as_primitive::<Int32Type>().value(0), 1);
}

#[test]
fn test_left_join_keeps_unmatched_rows() {
    let dir = tempfile::tempdir().unwrap();
    let left = write_parquet(dir.path(), "left.parquet", &[1, 2]);
    let right = write_parquet(dir.path(), "right.parquet", &[1, 3]);
    let mut engine = Engine::open_in_memory().unwrap();

    let config = FederationConfig::new(
        vec![SourceSpec::parquet("l", left), SourceSpec::parquet("r", right)],
        JoinSpec {
            conditions: vec![on_id("l", "r")],
            join_type: JoinType::Left,
            select_columns: vec!["l.id".into(), "r.amount".into()],
            ..JoinSpec::default()
        },
    );
    let mut batch = JoinOrchestrator::new(&mut engine).run(&config).unwrap();
    assert_eq!(batch.num_rows(), 2);

    // Order is not guaranteed without ORDER BY.
    batch = arrow::compute::take_record_batch(
        &batch,
        &arrow::compute::sort_to_indices(batch.column(0), None, None).unwrap(),
    )
    .unwrap();
    assert!(batch.column(1).is_valid(0));
    assert!(batch.column(1).is_null(1));
}

#[test]
fn test_template_join_against_local_table() {
    let dir = tempfile::tempdir().unwrap();
    let parquet = write_parquet(dir.path(), "orders.parquet", &[1, 2]);
    let mut engine = Engine::open_in_memory().unwrap();
    engine
        .execute_batch(
            "CREATE TABLE postgres_table (id INTEGER, name VARCHAR);
             INSERT INTO postgres_table VALUES (1, 'Alice'), (3, 'Charlie');",
        )
        .unwrap();

    let config = FederationConfig::new(
        vec![SourceSpec::parquet("parquet_table", parquet)],
        JoinSpec {
            conditions: vec![on_id("parquet_table", "postgres_table")],
            select_columns: vec!["parquet_table.id".into(), "postgres_table.name".into()],
            sql: Some(
                "SELECT {select_columns} FROM parquet_table \
                 JOIN postgres_table ON {parquet_table.id} = {postgres_table.id}"
                    .into(),
            ),
            ..JoinSpec::default()
        },
    );
    let batch = JoinOrchestrator::new(&mut engine).run(&config).unwrap();

    assert_eq!(batch.num_rows(), 1);
    let names = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(names.value(0), "Alice");
    engine.close().unwrap();
}

#[test]
fn test_config_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[1, 2, 3]);
    let b = write_parquet(dir.path(), "b.parquet", &[2, 3, 4]);
    let json = serde_json::json!({
        "sources": [
            {"name": "a", "type": "parquet", "path": a},
            {"name": "b", "type": "parquet", "file_path": b, "load": "eager"}
        ],
        "query": {
            "conditions": [{
                "left": {"source": "a", "column": "id"},
                "right": {"source": "b", "column": "id"}
            }],
            "select_columns": ["a.id"]
        },
        "materialize": {"capacity": 4}
    });
    let config: FederationConfig = serde_json::from_value(json).unwrap();
    let mut engine = Engine::open_in_memory().unwrap();
    let batch = JoinOrchestrator::new(&mut engine).run(&config).unwrap();
    assert_eq!(batch.num_rows(), 2);
}

#[test]
fn test_missing_file_fails_before_sources_ready() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::open_in_memory().unwrap();
    let config = FederationConfig::new(
        vec![SourceSpec::parquet(
            "gone",
            dir.path().join("gone.parquet").to_string_lossy(),
        )],
        JoinSpec::default(),
    );

    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    let err = orchestrator.run(&config).unwrap_err();
    assert!(matches!(err, DbError::AttachFile { .. }), "{err}");
    assert_eq!(orchestrator.state(), JoinState::Failed(JoinPhase::Idle));
    assert!(orchestrator.sql().is_none());
}

#[test]
fn test_composition_failure_state() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[1]);
    let b = write_parquet(dir.path(), "b.parquet", &[1]);
    let mut engine = Engine::open_in_memory().unwrap();
    let config = FederationConfig::new(
        vec![SourceSpec::parquet("a", a), SourceSpec::parquet("b", b)],
        JoinSpec::default(),
    );

    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    let err = orchestrator.run(&config).unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
    assert_eq!(orchestrator.state(), JoinState::Failed(JoinPhase::SourcesReady));
}

#[test]
fn test_query_failure_state() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[1]);
    let mut engine = Engine::open_in_memory().unwrap();
    let config = FederationConfig::new(
        vec![SourceSpec::parquet("a", a)],
        JoinSpec {
            sql: Some("SELECT * FROM a JOIN missing USING (id)".into()),
            ..JoinSpec::default()
        },
    );

    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    let err = orchestrator.run(&config).unwrap_err();
    assert!(matches!(err, DbError::Query { .. }), "{err}");
    assert_eq!(orchestrator.state(), JoinState::Failed(JoinPhase::QueryComposed));
}

#[test]
fn test_unsupported_result_type_fails_after_execution() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[1]);
    let mut engine = Engine::open_in_memory().unwrap();
    let config = FederationConfig::new(
        vec![SourceSpec::parquet("a", a)],
        JoinSpec {
            sql: Some("SELECT id, DATE '2024-01-01' AS day FROM a".into()),
            ..JoinSpec::default()
        },
    );

    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    let err = orchestrator.run(&config).unwrap_err();
    assert!(matches!(err, DbError::Schema(_)), "{err}");
    assert_eq!(orchestrator.state(), JoinState::Failed(JoinPhase::Executed));
}

#[test]
fn test_orchestrator_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_parquet(dir.path(), "a.parquet", &[1]);
    let mut engine = Engine::open_in_memory().unwrap();
    let config = FederationConfig::new(vec![SourceSpec::parquet("a", a)], JoinSpec::default());

    let mut orchestrator = JoinOrchestrator::new(&mut engine);
    orchestrator.run(&config).unwrap();
    let err = orchestrator.run(&config).unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
    // A rejected rerun leaves the completed state alone.
    assert_eq!(orchestrator.state(), JoinState::Active(JoinPhase::Done));
}

/// Needs network access for the extension and a server in
/// `ARROWLAKE_TEST_PG` with a `people (id INTEGER, name TEXT)` table.
#[test]
#[ignore = "needs a live PostgreSQL server"]
fn test_parquet_postgres_join() {
    let Ok(conn_str) = std::env::var("ARROWLAKE_TEST_PG") else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let parquet = write_parquet(dir.path(), "p.parquet", &[1, 2]);
    let mut engine = Engine::open_in_memory().unwrap();
    let config = FederationConfig::new(
        vec![
            SourceSpec::parquet("parquet_table", parquet),
            SourceSpec::postgres("postgres_table", conn_str).with_table("public.people"),
        ],
        JoinSpec {
            conditions: vec![on_id("parquet_table", "postgres_table")],
            ..JoinSpec::default()
        },
    );
    let batch = JoinOrchestrator::new(&mut engine).run(&config).unwrap();
    assert!(batch.num_rows() <= 2);
}
