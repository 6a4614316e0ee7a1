pub mod aggregator;
pub mod cohort;
pub mod config;
pub mod control;
pub mod domain;
pub mod error;
pub mod filters;
pub mod format;
pub mod gdc;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod ranker;
pub mod rate_limit;
pub mod report;
pub mod response;
pub mod store;
