pub mod activity;
pub mod alerts;
pub mod autorestart;
pub mod commands;
pub mod error;
pub mod health;
pub mod logging;
pub mod models;
pub mod notify;
pub mod router;
pub mod schedule;
pub mod state;
pub mod status;
pub mod store;
#[cfg(test)]
pub mod testkit;
pub mod transport;
pub mod wizard;
pub mod workers;
