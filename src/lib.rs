#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::pedantic,
        missing_debug_implementations,
        trivial_casts,
        trivial_numeric_casts,
        unreachable_pub,
        variant_size_differences,
        missing_docs,
        rust_2018_idioms
    )
)]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::module_name_repetitions))]

//! Random SQL query generation and workload execution for stress-testing
//! PostgreSQL-family databases.

pub mod context;
pub mod ddl;
pub mod element;
pub mod error;
pub mod exec;
pub mod grammar;
pub mod helpers;
pub mod introspect;
pub mod schema;
pub mod shape;
pub mod stats;
pub mod types;
pub mod value;

pub use crate::{
    context::Context,
    ddl::{DdlGenerator, DdlRatios, Dialect, Profile},
    element::Element,
    error::Error,
    exec::WorkloadExecutor,
    grammar::{Grammar, Registry},
    introspect::SchemaProvider,
    schema::{Column, Index, Table, TableConstraint},
    shape::query_shape,
    stats::{ExecutionStats, Outcome, Symbol},
};
