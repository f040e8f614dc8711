pub mod api;
pub mod app;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod output;
pub mod paginate;
pub mod resolve;
pub mod schema;
