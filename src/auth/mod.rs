//! # Auth Module
//!
//! Account registration, credential and OAuth login, bearer tokens and the
//! password reset lifecycle.

pub mod extractors;
pub mod handlers;
pub mod linker;
pub mod models;
pub mod password;
pub mod reset;
pub mod routes;
pub mod service;
pub mod store;
pub mod tokens;


pub use routes::auth_routes;
