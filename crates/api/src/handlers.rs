//! HTTP handlers, one router per path prefix.

pub mod auth;
pub mod health;
pub mod status;
pub mod views;
