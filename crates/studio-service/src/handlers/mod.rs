//! HTTP request handlers.

pub mod generations;
pub mod health;
pub mod tickets;
