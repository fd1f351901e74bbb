pub mod api_connection;
pub mod cli;
pub mod config;
pub mod errors;
pub mod index;
pub mod nutrition;
pub mod substitution;
pub mod transform;
