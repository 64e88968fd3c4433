//! Automatic model selection on a chronological holdout.

mod selector;

pub use selector::{
    rank_candidates, CandidateOutcome, CandidateReport, ModelSelector, SelectionResult,
    SelectorConfig,
};
