pub mod runner;

pub use runner::{
    Evaluator, Phase, PhaseFailure, QueryOutcome, QueryReport, RunAborted, RunSettings, RunSummary,
    Side,
};
