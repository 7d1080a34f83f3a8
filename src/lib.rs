// Library exports for SportsIn
// Integration tests and the binary both build on these modules

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mirror;
pub mod routes;
pub mod state;
