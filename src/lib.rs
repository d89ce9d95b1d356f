//! Pharmora: the REST backend behind the Pharmora pharmacy storefront.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod utils;
pub mod workflow;

pub use routes::{create_app, AppState};
