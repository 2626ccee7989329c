//! # branchtrack
//!
//! Distributes assignments to a fixed directory of branches and tracks
//! per-branch completion.
//!
//! An assignment names its target branches ("ALL" or an explicit list).
//! Creating it fans out one pending progress record per resolved branch.
//! Records move between pending and completed, and an aggregator keeps
//! dashboard statistics current from the store's change stream.
//! Persistence is behind the [`store::Store`] trait, with in-memory and
//! Postgres implementations.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod fanout;
pub mod model;
pub mod notify;
pub mod store;
pub mod telemetry;
pub mod view;
