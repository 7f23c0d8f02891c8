//! Business logic services

pub mod archive;
pub mod assets;
pub mod cancellation;
pub mod columns;
pub mod job_history;
pub mod job_processor;
pub mod orchestrator;
pub mod render;
pub mod sheet;
pub mod store;
pub mod store_http;
pub mod upsert;
pub mod validate;
