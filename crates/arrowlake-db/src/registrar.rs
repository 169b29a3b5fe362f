//! Source registration.
//!
//! Makes each configured source addressable by its logical name inside the
//! engine:
//!
//! - **Parquet**: a view (lazy) or table (eager) over `read_parquet`
//! - **`PostgreSQL` / `SQLite`**: the engine extension is loaded once, then the
//!   database is attached read-only as a catalog named after the source
//!
//! Registration is not retried and not rolled back. Sources attached before
//! a failure stay attached until the engine is closed.

use std::path::Path;

use crate::config::{ParquetLoadMode, SourceKind, SourceSpec};
use crate::engine::{quote_literal, Engine};
use crate::error::DbError;

/// A source the engine can now resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSource {
    /// Logical name.
    pub name: String,
    /// Relation reference used by synthesized queries (`orders`,
    /// `crm.public.customers`).
    pub relation: String,
    /// `true` when `relation` names an attached database rather than a
    /// table. Such sources can only be used from query templates.
    pub catalog: bool,
}

/// Attaches sources to a borrowed engine.
pub struct SourceRegistrar<'a> {
    engine: &'a mut Engine,
}

impl<'a> SourceRegistrar<'a> {
    /// Creates a registrar over `engine`.
    pub fn new(engine: &'a mut Engine) -> Self {
        Self { engine }
    }

    /// Attaches every source in order, stopping at the first failure.
    pub fn attach_all(&mut self, specs: &[SourceSpec]) -> Result<Vec<RegisteredSource>, DbError> {
        specs.iter().map(|spec| self.attach(spec)).collect()
    }

    /// Attaches one source.
    pub fn attach(&mut self, spec: &SourceSpec) -> Result<RegisteredSource, DbError> {
        spec.validate()?;
        let registered = match &spec.kind {
            SourceKind::Parquet { path, load } => self.attach_parquet(&spec.name, path, *load)?,
            SourceKind::Postgres {
                connection_string,
                table,
            } => self.attach_database(
                &spec.name,
                connection_string,
                RemoteKind::Postgres,
                table.as_deref(),
            )?,
            SourceKind::Sqlite { path, table } => {
                if is_local_path(path) && !Path::new(path).exists() {
                    return Err(DbError::AttachRemote {
                        source_name: spec.name.clone(),
                        reason: format!("database file '{path}' not found"),
                    });
                }
                self.attach_database(&spec.name, path, RemoteKind::Sqlite, table.as_deref())?
            }
        };
        tracing::info!(
            source = %spec.name,
            kind = spec.kind_name(),
            relation = %registered.relation,
            "source attached"
        );
        Ok(registered)
    }

    fn attach_parquet(
        &mut self,
        name: &str,
        path: &str,
        load: ParquetLoadMode,
    ) -> Result<RegisteredSource, DbError> {
        let attach_err = |reason: String| DbError::AttachFile {
            source_name: name.to_string(),
            path: path.to_string(),
            reason,
        };
        if is_local_path(path) && !Path::new(path).exists() {
            return Err(attach_err("file not found".into()));
        }
        let sql = parquet_statement(name, path, load);
        tracing::debug!(source = %name, sql = %sql, "registering parquet source");
        self.engine
            .connection()
            .execute_batch(&sql)
            .map_err(|e| attach_err(e.to_string()))?;
        Ok(RegisteredSource {
            name: name.to_string(),
            relation: name.to_string(),
            catalog: false,
        })
    }

    fn attach_database(
        &mut self,
        name: &str,
        locator: &str,
        kind: RemoteKind,
        table: Option<&str>,
    ) -> Result<RegisteredSource, DbError> {
        self.engine.load_extension(kind.extension())?;
        let sql = attach_statement(name, locator, kind);
        // The locator may hold credentials; only the name is logged.
        tracing::debug!(source = %name, extension = kind.extension(), "attaching database");
        self.engine
            .connection()
            .execute_batch(&sql)
            .map_err(|e| DbError::AttachRemote {
                source_name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(RegisteredSource {
            name: name.to_string(),
            relation: table.map_or_else(|| name.to_string(), |t| format!("{name}.{t}")),
            catalog: table.is_none(),
        })
    }
}

/// Database kinds attached through an engine extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteKind {
    Postgres,
    Sqlite,
}

impl RemoteKind {
    fn extension(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    fn type_keyword(self) -> &'static str {
        match self {
            Self::Postgres => "POSTGRES",
            Self::Sqlite => "SQLITE",
        }
    }
}

pub(crate) fn parquet_statement(name: &str, path: &str, load: ParquetLoadMode) -> String {
    let object = match load {
        ParquetLoadMode::Lazy => "VIEW",
        ParquetLoadMode::Eager => "TABLE",
    };
    format!(
        "CREATE {object} {name} AS SELECT * FROM read_parquet({})",
        quote_literal(path)
    )
}

pub(crate) fn attach_statement(name: &str, locator: &str, kind: RemoteKind) -> String {
    format!(
        "ATTACH {} AS {name} (TYPE {}, READ_ONLY)",
        quote_literal(locator),
        kind.type_keyword()
    )
}

/// Local filesystem path without URL scheme or glob characters.
fn is_local_path(path: &str) -> bool {
    !path.contains("://") && !path.contains(['*', '?', '[', '{'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::write_parquet;
    use arrow_array::{Array, StringArray};
    use arrowlake_connectors::MaterializeOptions;

    #[test]
    fn test_parquet_statements() {
        assert_eq!(
            parquet_statement("t", "/d/a.parquet", ParquetLoadMode::Lazy),
            "CREATE VIEW t AS SELECT * FROM read_parquet('/d/a.parquet')"
        );
        assert_eq!(
            parquet_statement("t", "it's.parquet", ParquetLoadMode::Eager),
            "CREATE TABLE t AS SELECT * FROM read_parquet('it''s.parquet')"
        );
    }

    #[test]
    fn test_attach_statements() {
        assert_eq!(
            attach_statement("pg", "host=localhost password='x'", RemoteKind::Postgres),
            "ATTACH 'host=localhost password=''x''' AS pg (TYPE POSTGRES, READ_ONLY)"
        );
        assert_eq!(
            attach_statement("lite", "/tmp/a.db", RemoteKind::Sqlite),
            "ATTACH '/tmp/a.db' AS lite (TYPE SQLITE, READ_ONLY)"
        );
    }

    #[test]
    fn test_local_path_detection() {
        assert!(is_local_path("/data/a.parquet"));
        assert!(!is_local_path("s3://bucket/a.parquet"));
        assert!(!is_local_path("/data/*.parquet"));
    }

    #[test]
    fn test_attach_parquet_lazy_and_eager() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_parquet(dir.path(), "a.parquet", &[1, 2]);
        let b = write_parquet(dir.path(), "b.parquet", &[5]);
        let mut engine = Engine::open_in_memory().unwrap();

        let registered = SourceRegistrar::new(&mut engine)
            .attach_all(&[
                SourceSpec::parquet("lazy_src", a),
                SourceSpec::parquet("eager_src", b).with_load_mode(ParquetLoadMode::Eager),
            ])
            .unwrap();
        assert_eq!(registered[0].relation, "lazy_src");
        assert!(!registered[1].catalog);

        let batch = engine
            .query_batch(
                "SELECT (SELECT count(*) FROM lazy_src) AS l, (SELECT count(*) FROM eager_src) AS e",
                &[],
                &MaterializeOptions::default(),
            )
            .unwrap();
        assert_eq!(batch.num_rows(), 1);

        let kinds = engine
            .query_batch(
                "SELECT table_name, table_type FROM information_schema.tables ORDER BY table_name",
                &[],
                &MaterializeOptions::default(),
            )
            .unwrap();
        let types = kinds.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(types.value(0), "BASE TABLE");
        assert_eq!(types.value(1), "VIEW");
    }

    #[test]
    fn test_missing_parquet_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.parquet");
        let mut engine = Engine::open_in_memory().unwrap();
        let err = SourceRegistrar::new(&mut engine)
            .attach(&SourceSpec::parquet("t", missing.to_string_lossy()))
            .unwrap_err();
        match err {
            DbError::AttachFile { source_name, reason, .. } => {
                assert_eq!(source_name, "t");
                assert_eq!(reason, "file not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_name_collision_surfaces_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_parquet(dir.path(), "a.parquet", &[1]);
        let mut engine = Engine::open_in_memory().unwrap();
        engine.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        let err = SourceRegistrar::new(&mut engine)
            .attach(&SourceSpec::parquet("t", a).with_load_mode(ParquetLoadMode::Eager))
            .unwrap_err();
        assert!(matches!(err, DbError::AttachFile { .. }), "{err}");
    }

    #[test]
    fn test_attach_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_parquet(dir.path(), "good.parquet", &[1]);
        let mut engine = Engine::open_in_memory().unwrap();

        let result = SourceRegistrar::new(&mut engine).attach_all(&[
            SourceSpec::parquet("first", good.clone()),
            SourceSpec::parquet("second", dir.path().join("nope.parquet").to_string_lossy()),
            SourceSpec::parquet("third", good),
        ]);
        assert!(result.is_err());

        // The first source stays attached; the third was never attempted.
        assert!(engine
            .query_batch("SELECT * FROM first", &[], &MaterializeOptions::default())
            .is_ok());
        assert!(engine
            .query_batch("SELECT * FROM third", &[], &MaterializeOptions::default())
            .is_err());
    }

    #[test]
    fn test_missing_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::open_in_memory().unwrap();
        let err = SourceRegistrar::new(&mut engine)
            .attach(&SourceSpec::sqlite("lite", dir.path().join("x.db").to_string_lossy()))
            .unwrap_err();
        assert!(matches!(err, DbError::AttachRemote { .. }));
        // No extension work happens before the file check.
        assert!(!engine.has_extension("sqlite"));
    }

    #[test]
    fn test_invalid_spec_rejected_before_engine_work() {
        let mut engine = Engine::open_in_memory().unwrap();
        let err = SourceRegistrar::new(&mut engine)
            .attach(&SourceSpec::postgres("bad name", "host=localhost"))
            .unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
        assert!(!engine.has_extension("postgres"));
    }

    /// Requires network access for the extension and a server in
    /// `ARROWLAKE_TEST_PG`.
    #[test]
    #[ignore = "needs a live PostgreSQL server"]
    fn test_attach_live_postgres() {
        let Ok(conn_str) = std::env::var("ARROWLAKE_TEST_PG") else {
            return;
        };
        let mut engine = Engine::open_in_memory().unwrap();
        let mut registrar = SourceRegistrar::new(&mut engine);
        let first = registrar
            .attach(&SourceSpec::postgres("pg", conn_str.clone()).with_table("public.people"))
            .unwrap();
        assert_eq!(first.relation, "pg.public.people");
        registrar
            .attach(&SourceSpec::postgres("pg2", conn_str))
            .unwrap();
        assert!(engine.has_extension("postgres"));
    }
}
