use std::str::FromStr;

use dotenvy::dotenv;
use log::LevelFilter;
use serde::Deserialize;
use sqlx::ConnectOptions;
use sqlx::postgres::PgConnectOptions;

use crate::error::{ClientError, Result};

/// Configuration for the client store connection
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Full database connection URL, takes precedence over the discrete parts
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_host")]
    pub db_host: String,
    #[serde(default = "default_port")]
    pub db_port: u16,
    #[serde(default = "default_name")]
    pub db_name: String,
    #[serde(default = "default_user")]
    pub db_user: String,
    #[serde(default)]
    pub db_password: Option<String>,
    /// Level the driver logs executed statements at
    #[serde(default = "default_log_statements")]
    pub db_log_statements: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_name() -> String {
    "clientdb".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_log_statements() -> String {
    "debug".to_string()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables from a `.env` file are loaded first if the file exists.
    pub fn load() -> Result<Self> {
        dotenv().ok();

        envy::from_env::<Config>().map_err(|err| ClientError::Config(err.to_string()))
    }

    /// Parse the statement logging level
    pub fn statement_log_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.db_log_statements).map_err(|_| {
            ClientError::Config(format!(
                "invalid DB_LOG_STATEMENTS value: {}",
                self.db_log_statements
            ))
        })
    }

    /// Build driver connect options from either the URL or the discrete parts
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let options = match &self.database_url {
            Some(url) => PgConnectOptions::from_str(url)
                .map_err(|err| ClientError::Config(format!("invalid DATABASE_URL: {err}")))?,
            None => {
                let options = PgConnectOptions::new()
                    .host(&self.db_host)
                    .port(self.db_port)
                    .database(&self.db_name)
                    .username(&self.db_user);

                match &self.db_password {
                    Some(password) => options.password(password),
                    None => options,
                }
            }
        };

        Ok(options.log_statements(self.statement_log_level()?))
    }
}

/// Initialize environment variables and load configuration
pub fn init() -> Result<Config> {
    Config::load()
}
