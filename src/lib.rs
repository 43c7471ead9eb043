//! promcheck core library.
//!
//! Finds PromQL alerting and recording rules whose selectors currently
//! return no data, by probing each selector against a Prometheus-compatible
//! server.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Config file discovery and effective configuration resolution.
//! - `selectors`: PromQL parsing and selector extraction.
//! - `ignore`: Group and selector ignore patterns.
//! - `probe`: Live selector probes over the HTTP query API.
//! - `check`: Concurrent rule checking and classification.
//! - `sources`: Rule files, the server's rule listing and inline expressions.
//! - `report`: Report aggregation and tree/JSON/YAML/metrics rendering.
//! - `metrics`: Gauges and the Prometheus registry behind the exporter.
//! - `app`: One check cycle from source to report.
//! - `exporter`: HTTP server and periodic checks.
//! - `models`: Rule, group and result types plus wire formats.
//! - `utils`: Supporting helpers.
pub mod app;
pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod ignore;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod report;
pub mod selectors;
pub mod sources;
pub mod utils;
