// Public API for integration tests and the server binary

pub mod abuse;
pub mod api;
pub mod auth;
pub mod config;
pub mod game;
pub mod pages;
pub mod protocol;
pub mod questions;
pub mod routes;
pub mod state;
pub mod store;
pub mod tasks;
pub mod types;
pub mod ws;
