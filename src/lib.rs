pub mod config;
pub mod driver;
pub mod error;
pub mod fixture_source;
pub mod http_client;
pub mod logging;
pub mod mapper;
pub mod provider;
pub mod records;
pub mod repair;
pub mod schema;
pub mod store;
