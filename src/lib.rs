pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod query;
pub mod record;
pub mod report;
pub mod scanner;
pub mod service;
pub mod store;
pub mod utils;
