pub mod config;
pub mod corpus;
pub mod db;
pub mod energy;
pub mod engine;
pub mod equivalence;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod on_error;
pub mod providers;
pub mod report;
pub mod retry;
pub mod rewrite;
pub mod stats;
pub mod storage;
