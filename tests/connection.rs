use client_manager::{ClientError, Config, connect};

fn config_for(url: &str) -> Config {
    Config {
        database_url: Some(url.to_string()),
        db_host: "localhost".to_string(),
        db_port: 5432,
        db_name: "clientdb".to_string(),
        db_user: "postgres".to_string(),
        db_password: None,
        db_log_statements: "off".to_string(),
    }
}

#[tokio::test]
async fn unreachable_server_is_connection_failure() {
    // Nothing listens on port 1
    let config = config_for("postgres://postgres@127.0.0.1:1/clientdb");

    let err = connect(&config).await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionFailure(_)));
}

#[tokio::test]
async fn malformed_url_fails_before_connecting() {
    let config = config_for("definitely not a url");

    let err = connect(&config).await.unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
}
