pub mod dates;
pub mod models;
