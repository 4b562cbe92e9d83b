//! Ephemeral-state consistency layer of the ongil civic-service backend.
//!
//! View counters, the token denylist and the presence set live in Redis
//! behind [`ephemeral::EphemeralStore`]; the [`reconcile`] task moves pending
//! view deltas into PostgreSQL.

pub mod config;
pub mod ephemeral;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod reconcile;
pub mod repos;
pub mod routes;
pub mod services;
pub mod state;
pub mod stores;
#[cfg(test)]
mod test_utils;
