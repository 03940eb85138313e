//! Postgres data-access layer for clients and their phone numbers.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{ClientRepository, connect};
pub use error::{ClientError, Result};
pub use models::{Client, ClientUpdate, DeleteOutcome, PhoneNumber, UpdateOutcome};
