pub mod analysis;
pub mod auth;
pub mod config;
pub mod db;
pub mod drive;
pub mod email;
pub mod error;
pub mod extract;
pub mod models;
pub mod oauth;
pub mod repo;
pub mod routes;
pub mod rules;
pub mod schema;
pub mod state;
pub mod storage;

pub use routes::create_router;
pub use state::{AppState, Integrations};
