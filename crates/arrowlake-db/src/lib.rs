//! # `ArrowLake` DB
//!
//! Federated joins across Parquet files, `PostgreSQL` and `SQLite` databases
//! on an embedded DuckDB engine, materialized into Arrow record batches.
//!
//! ```rust,no_run
//! use arrowlake_db::{
//!     ColumnRef, Engine, FederationConfig, JoinCondition, JoinOrchestrator, JoinSpec, SourceSpec,
//! };
//!
//! # fn main() -> Result<(), arrowlake_db::DbError> {
//! let mut engine = Engine::open_in_memory()?;
//! let config = FederationConfig::new(
//!     vec![
//!         SourceSpec::parquet("orders", "/data/orders.parquet"),
//!         SourceSpec::postgres("crm", "host=localhost dbname=crm").with_table("public.customers"),
//!     ],
//!     JoinSpec {
//!         conditions: vec![JoinCondition::new(
//!             ColumnRef::new("orders", "customer_id"),
//!             ColumnRef::new("crm", "id"),
//!         )],
//!         select_columns: vec!["orders.id".into(), "crm.name".into()],
//!         ..JoinSpec::default()
//!     },
//! );
//! let batch = JoinOrchestrator::new(&mut engine).run(&config)?;
//! println!("{} rows", batch.num_rows());
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod config;
mod engine;
mod error;
mod join;
mod registrar;
mod timeout;

pub use config::{
    ColumnRef, EngineConfig, FederationConfig, JoinCondition, JoinSpec, JoinType,
    ParquetLoadMode, SourceKind, SourceSpec,
};
pub use engine::{DuckDbCursor, Engine};
pub use error::DbError;
pub use join::{compose_query, JoinOrchestrator, JoinPhase, JoinState, SELECT_COLUMNS_PLACEHOLDER};
pub use registrar::{RegisteredSource, SourceRegistrar};
pub use timeout::run_with_timeout;

pub use arrowlake_connectors::{MaterializeOptions, RowErrorPolicy};
