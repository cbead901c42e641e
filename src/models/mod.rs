//! Core data models for the upload gateway.
//!
//! Deployments describe the physical installations field media comes from;
//! the upload types describe one submission's shape and its per-file outcome.
//! Records serialize naturally as JSON via `serde` and map onto the flat
//! registry file via `csv`.

pub mod deployment;
pub mod upload;
