//! Route handlers for the Larder API.

pub mod auth;
pub mod health;
