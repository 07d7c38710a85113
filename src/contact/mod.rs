// src/contact/mod.rs
//! Public contact form

pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;

#[cfg(test)]
mod tests;

pub use routes::contact_routes;
