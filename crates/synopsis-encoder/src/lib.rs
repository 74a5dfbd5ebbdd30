//! Summary encoding stages: prompt composition, response parsing, and quality evaluation.
//!
//! The composer and the evaluator read the same [`ContentProfile`] so what the
//! model is asked for and what the pipeline later checks cannot drift apart.
//!
//! [`ContentProfile`]: synopsis_core::schema::ContentProfile

pub mod lexicon;
pub mod parser;
pub mod prompt;
pub mod quality;
