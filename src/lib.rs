// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod derive;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod resolve;
pub mod store;
