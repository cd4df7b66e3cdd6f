pub mod aggregation;
pub mod bootstrap;
pub mod commands;
pub mod normalizer;
pub mod plan_store;
pub mod selection;
pub mod sync;
pub mod timeline;
