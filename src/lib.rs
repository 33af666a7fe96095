pub mod backend;
pub mod config;
pub mod demo_backend;
pub mod error;
pub mod extractor;
pub mod fixture_fetch;
pub mod fixtures;
pub mod http_client;
pub mod logging;
pub mod orchestrator;
pub mod persist;
pub mod quota;
pub mod state;
pub mod store;
pub mod tips;
pub mod translate;
pub mod worker;
