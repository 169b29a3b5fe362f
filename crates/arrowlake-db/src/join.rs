//! Federated join orchestration.
//!
//! ```text
//! Active(Idle)
//!   └── attach sources         -> Active(SourcesReady)
//!         └── compose SQL      -> Active(QueryComposed)
//!               └── execute    -> Active(Executed)
//!                     └── materialize -> Active(Done)
//! ```
//!
//! A failure at any step moves the orchestrator to `Failed(<last phase
//! reached>)`. Nothing is retried or rolled back.

use std::collections::HashMap;

use arrow_array::RecordBatch;
use arrowlake_connectors::{LogicalSchema, RowCursor, RowMaterializer};

use crate::config::{FederationConfig, JoinCondition, JoinSpec};
use crate::engine::Engine;
use crate::error::DbError;
use crate::registrar::{RegisteredSource, SourceRegistrar};

/// Placeholder replaced by the comma-joined select list.
pub const SELECT_COLUMNS_PLACEHOLDER: &str = "{select_columns}";

/// Progress of a join run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPhase {
    /// Nothing has run yet.
    Idle,
    /// Every source is attached.
    SourcesReady,
    /// The SQL statement is built.
    QueryComposed,
    /// The statement has produced a cursor.
    Executed,
    /// The result is materialized.
    Done,
}

/// Orchestrator state: the phase reached and whether the run failed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Running or finished successfully.
    Active(JoinPhase),
    /// Failed after reaching the given phase.
    Failed(JoinPhase),
}

impl JoinState {
    /// Phase reached, regardless of outcome.
    #[must_use]
    pub fn phase(self) -> JoinPhase {
        match self {
            Self::Active(phase) | Self::Failed(phase) => phase,
        }
    }

    /// Returns `true` for [`JoinState::Failed`].
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Runs one federated join on a borrowed engine.
#[derive(Debug)]
pub struct JoinOrchestrator<'a> {
    engine: &'a mut Engine,
    state: JoinState,
    sql: Option<String>,
    skipped_rows: u64,
}

impl<'a> JoinOrchestrator<'a> {
    /// Creates an idle orchestrator.
    pub fn new(engine: &'a mut Engine) -> Self {
        Self {
            engine,
            state: JoinState::Active(JoinPhase::Idle),
            sql: None,
            skipped_rows: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JoinState {
        self.state
    }

    /// Statement executed (or about to be), once composed.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Rows dropped by a skip policy during the run.
    #[must_use]
    pub fn skipped_rows(&self) -> u64 {
        self.skipped_rows
    }

    /// Attaches the sources, runs the join and materializes the result.
    ///
    /// An orchestrator runs once; a second call is a configuration error.
    pub fn run(&mut self, config: &FederationConfig) -> Result<RecordBatch, DbError> {
        if self.state != JoinState::Active(JoinPhase::Idle) {
            return Err(DbError::Config(format!(
                "join orchestrator already ran (state {:?})",
                self.state
            )));
        }
        match self.run_phases(config) {
            Ok(batch) => Ok(batch),
            Err(err) => {
                self.state = JoinState::Failed(self.state.phase());
                tracing::debug!(state = ?self.state, error = %err, "join failed");
                Err(err)
            }
        }
    }

    fn run_phases(&mut self, config: &FederationConfig) -> Result<RecordBatch, DbError> {
        config.validate()?;
        let sources = SourceRegistrar::new(self.engine).attach_all(&config.sources)?;
        self.advance(JoinPhase::SourcesReady);

        let sql = compose_query(&config.query, &sources)?;
        tracing::debug!(sql = %sql, "composed join query");
        self.sql = Some(sql.clone());
        self.advance(JoinPhase::QueryComposed);

        let state = &mut self.state;
        let materializer = RowMaterializer::with_options(config.materialize.clone());
        let batch = self.engine.query_cursor(&sql, &[], |cursor| {
            *state = JoinState::Active(JoinPhase::Executed);
            tracing::debug!(phase = ?JoinPhase::Executed, "join state");
            let schema = LogicalSchema::infer(cursor.columns())?;
            Ok(materializer.materialize(cursor, &schema)?)
        })?;
        self.skipped_rows = materializer.skipped_rows();
        self.advance(JoinPhase::Done);

        tracing::info!(
            sources = sources.len(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            skipped = self.skipped_rows,
            "federated join complete"
        );
        Ok(batch)
    }

    fn advance(&mut self, phase: JoinPhase) {
        self.state = JoinState::Active(phase);
        tracing::debug!(phase = ?phase, "join state");
    }
}

/// Builds the SQL statement for `spec` over the attached sources.
///
/// With a template, `{select_columns}` and the `{source.column}`
/// placeholders of every join-condition column are substituted; other
/// braces are left untouched. Without one, a join chain is synthesized in
/// source declaration order.
pub fn compose_query(spec: &JoinSpec, sources: &[RegisteredSource]) -> Result<String, DbError> {
    let select = select_list(&spec.select_columns);
    match &spec.sql {
        Some(template) => Ok(render_template(template, &select, &spec.conditions)),
        None => synthesize(spec, &select, sources),
    }
}

fn select_list(columns: &[String]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    }
}

fn render_template(template: &str, select: &str, conditions: &[JoinCondition]) -> String {
    let mut sql = template.replace(SELECT_COLUMNS_PLACEHOLDER, select);
    for col in conditions.iter().flat_map(|c| [&c.left, &c.right]) {
        let reference = col.to_string();
        sql = sql.replace(&format!("{{{reference}}}"), &reference);
    }
    sql
}

fn synthesize(
    spec: &JoinSpec,
    select: &str,
    sources: &[RegisteredSource],
) -> Result<String, DbError> {
    let Some(first) = sources.first() else {
        return Err(DbError::Config("no sources to query".into()));
    };
    for source in sources {
        if source.catalog {
            return Err(DbError::Config(format!(
                "source '{}' is an attached database; set a table or use a query template",
                source.name
            )));
        }
    }

    let index: HashMap<String, usize> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.to_ascii_lowercase(), i))
        .collect();
    let position = |name: &str| {
        index
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| {
                DbError::Config(format!("join condition references undeclared source '{name}'"))
            })
    };

    // Each condition belongs to the join step of its later-declared source.
    let mut steps: Vec<Vec<&JoinCondition>> = vec![Vec::new(); sources.len()];
    for condition in &spec.conditions {
        let left = position(&condition.left.source)?;
        let right = position(&condition.right.source)?;
        if left == right {
            return Err(DbError::Config(format!(
                "join condition '{} = {}' compares a source with itself",
                condition.left, condition.right
            )));
        }
        steps[left.max(right)].push(condition);
    }

    let mut sql = format!("SELECT {select} FROM {} AS {}", first.relation, first.name);
    for (source, conditions) in sources.iter().zip(&steps).skip(1) {
        if conditions.is_empty() {
            return Err(DbError::Config(format!(
                "source '{}' has no join condition with an earlier source",
                source.name
            )));
        }
        let on = conditions
            .iter()
            .map(|c| format!("{} = {}", c.left, c.right))
            .collect::<Vec<_>>()
            .join(" AND ");
        sql.push_str(&format!(
            " {} {} AS {} ON {on}",
            spec.join_type.keyword(),
            source.relation,
            source.name
        ));
    }
    Ok(sql)
}
