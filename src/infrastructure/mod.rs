pub mod config;
pub mod error;
pub mod json_sources;
pub mod plan_repository;
pub mod sources;
