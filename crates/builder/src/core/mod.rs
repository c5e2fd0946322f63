//! Evaluation context and the evaluator state machine

pub mod context;
pub mod evaluator;
