//! Core types for the synopsis summarization pipeline.
//!
//! Provides the request-scoped data model ([`schema`]), TOML/env configuration
//! ([`config`]), the content profiler that derives acceptance thresholds
//! ([`profile`]), and the read-only tag canonicalization table ([`tags`]).

pub mod config;
pub mod profile;
pub mod schema;
pub mod tags;
