//! Serverless worker library.
//!
//! The binary in `main.rs` is a thin shell around [`handler::run_job`],
//! which drives one job end to end: validate, stage inputs, submit,
//! poll to completion, process outputs, aggregate.

pub mod handler;
