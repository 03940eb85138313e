use sqlx::{Connection, PgConnection};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ClientError, Result, on_unique_violation};
use crate::models::{Client, ClientUpdate, DeleteOutcome, PhoneNumber, UpdateOutcome};

const CREATE_CLIENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS clients (
        id SERIAL PRIMARY KEY,
        first_name VARCHAR(50) NOT NULL,
        last_name VARCHAR(50) NOT NULL,
        email VARCHAR(100) UNIQUE NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const CREATE_PHONES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS client_phones (
        id SERIAL PRIMARY KEY,
        client_id INTEGER NOT NULL,
        phone_number VARCHAR(20) NOT NULL,
        FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE,
        CONSTRAINT unique_client_phone UNIQUE (client_id, phone_number)
    )
"#;

/// Open the single connection the repository works on
pub async fn connect(config: &Config) -> Result<PgConnection> {
    let options = config.connect_options()?;

    let conn = PgConnection::connect_with(&options).await.map_err(|err| {
        error!(%err, "cannot connect to database");
        ClientError::ConnectionFailure(err)
    })?;

    info!("database connection established");
    Ok(conn)
}

/// Client and phone number operations over a borrowed connection.
///
/// Every operation runs in its own transaction, committed on success and
/// rolled back when dropped on an error path. If the connection is already
/// inside a transaction, each operation runs in a savepoint instead.
pub struct ClientRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ClientRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Create the clients and client_phones tables if they are missing
    pub async fn initialize_schema(&mut self) -> Result<()> {
        let mut tx = self.conn.begin().await?;

        sqlx::query(CREATE_CLIENTS_TABLE).execute(&mut *tx).await?;
        sqlx::query(CREATE_PHONES_TABLE).execute(&mut *tx).await?;

        tx.commit().await?;
        info!("client schema ready");
        Ok(())
    }

    /// Insert a client, returning the generated id
    pub async fn add_client(&mut self, first_name: &str, last_name: &str, email: &str) -> Result<i32> {
        let mut tx = self.conn.begin().await?;

        let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM clients WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            warn!(email, "client email already exists");
            return Err(ClientError::DuplicateEmail(email.to_string()));
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO clients (first_name, last_name, email)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| on_unique_violation(err, || ClientError::DuplicateEmail(email.to_string())))?;

        tx.commit().await?;
        info!(client_id = id, "client added");
        Ok(id)
    }

    /// Attach a phone number to a client, returning the new phone id
    pub async fn add_phone(&mut self, client_id: i32, number: &str) -> Result<i32> {
        let mut tx = self.conn.begin().await?;

        if !client_row_exists(&mut *tx, client_id).await? {
            warn!(client_id, "cannot add phone to missing client");
            return Err(ClientError::ClientNotFound(client_id));
        }

        let duplicate = || ClientError::DuplicatePhone {
            client_id,
            number: number.to_string(),
        };

        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM client_phones WHERE client_id = $1 AND phone_number = $2",
        )
        .bind(client_id)
        .bind(number)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            warn!(client_id, number, "client already has this phone number");
            return Err(duplicate());
        }

        let phone_id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO client_phones (client_id, phone_number) VALUES ($1, $2) RETURNING id",
        )
        .bind(client_id)
        .bind(number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| on_unique_violation(err, duplicate))?;

        tx.commit().await?;
        info!(client_id, phone_id, "phone number added");
        Ok(phone_id)
    }

    /// Apply the supplied fields of `update` to a client in one statement
    pub async fn update_client(&mut self, client_id: i32, update: &ClientUpdate) -> Result<UpdateOutcome> {
        let mut tx = self.conn.begin().await?;

        let current = sqlx::query_as::<_, Client>(
            "SELECT id, first_name, last_name, email, created_at FROM clients WHERE id = $1 FOR UPDATE",
        )
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            warn!(client_id, "cannot update missing client");
            return Err(ClientError::ClientNotFound(client_id));
        };

        let effective = update.without_unchanged(&current);

        if let Some(email) = &effective.email {
            if email_held_by_other(&mut *tx, email, client_id).await? {
                warn!(client_id, email = email.as_str(), "email held by another client");
                return Err(ClientError::EmailInUse(email.clone()));
            }
        }

        let Some(mut query) = effective.update_query(client_id) else {
            info!(client_id, "client data is the same, nothing to update");
            return Ok(UpdateOutcome::Unchanged);
        };

        query.build().execute(&mut *tx).await.map_err(|err| {
            on_unique_violation(err, || {
                ClientError::EmailInUse(effective.email.clone().unwrap_or_default())
            })
        })?;

        tx.commit().await?;
        info!(client_id, "client updated");
        Ok(UpdateOutcome::Updated)
    }

    /// Delete a phone number; a missing id is reported, not an error
    pub async fn delete_phone(&mut self, phone_id: i32) -> Result<DeleteOutcome> {
        let mut tx = self.conn.begin().await?;

        let deleted = sqlx::query("DELETE FROM client_phones WHERE id = $1")
            .bind(phone_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!(phone_id, "phone removed");
            Ok(DeleteOutcome::Deleted)
        } else {
            warn!(phone_id, "phone does not exist");
            Ok(DeleteOutcome::NotFound)
        }
    }

    /// Delete a client; its phone numbers go with it through the cascade
    pub async fn delete_client(&mut self, client_id: i32) -> Result<()> {
        let mut tx = self.conn.begin().await?;

        let deleted = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            warn!(client_id, "cannot delete missing client");
            return Err(ClientError::ClientNotFound(client_id));
        }

        tx.commit().await?;
        info!(client_id, "client and their phones removed");
        Ok(())
    }

    /// Case-insensitive substring search over names, email and phone numbers
    pub async fn find_clients(&mut self, term: &str) -> Result<Vec<Client>> {
        let pattern = like_pattern(term);

        let mut tx = self.conn.begin().await.map_err(|err| read_failed("find clients", err))?;
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT DISTINCT c.id, c.first_name, c.last_name, c.email, c.created_at
            FROM clients c
            LEFT JOIN client_phones cp ON c.id = cp.client_id
            WHERE c.first_name ILIKE $1
               OR c.last_name ILIKE $1
               OR c.email ILIKE $1
               OR cp.phone_number ILIKE $1
            ORDER BY c.id
            "#,
        )
        .bind(pattern)
        .fetch_all(&mut *tx)
        .await
        .map_err(|err| read_failed("find clients", err))?;

        let clients = with_phones(&mut *tx, clients)
            .await
            .map_err(|err| read_failed("find clients", err))?;
        tx.commit().await.map_err(|err| read_failed("find clients", err))?;
        Ok(clients)
    }

    /// Load one client with their phones, `None` if there is no such id
    pub async fn get_client_by_id(&mut self, client_id: i32) -> Result<Option<Client>> {
        let mut tx = self.conn.begin().await.map_err(|err| read_failed("get client", err))?;
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, first_name, last_name, email, created_at FROM clients WHERE id = $1",
        )
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| read_failed("get client", err))?;

        let Some(mut client) = client else {
            return Ok(None);
        };
        client.phones = fetch_phones(&mut *tx, client.id)
            .await
            .map_err(|err| read_failed("get client", err))?;

        tx.commit().await.map_err(|err| read_failed("get client", err))?;
        Ok(Some(client))
    }

    /// All clients ordered by id, each with their phones
    pub async fn get_all_clients(&mut self) -> Result<Vec<Client>> {
        let mut tx = self.conn.begin().await.map_err(|err| read_failed("list clients", err))?;
        let clients = sqlx::query_as::<_, Client>(
            "SELECT id, first_name, last_name, email, created_at FROM clients ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|err| read_failed("list clients", err))?;

        let clients = with_phones(&mut *tx, clients)
            .await
            .map_err(|err| read_failed("list clients", err))?;
        tx.commit().await.map_err(|err| read_failed("list clients", err))?;
        Ok(clients)
    }

    /// Phone numbers of a client, ordered by phone id
    pub async fn client_phones(&mut self, client_id: i32) -> Result<Vec<PhoneNumber>> {
        let mut tx = self.conn.begin().await.map_err(|err| read_failed("get client phones", err))?;
        let phones = fetch_phones(&mut *tx, client_id)
            .await
            .map_err(|err| read_failed("get client phones", err))?;
        tx.commit().await.map_err(|err| read_failed("get client phones", err))?;
        Ok(phones)
    }

    /// Existence check; an access failure is logged and reads as absent
    pub async fn client_exists(&mut self, client_id: i32) -> bool {
        let checked = async {
            let mut tx = self.conn.begin().await?;
            let exists = client_row_exists(&mut *tx, client_id).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(exists)
        };

        match checked.await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(client_id, %err, "client existence check failed");
                false
            }
        }
    }
}

fn read_failed(operation: &'static str, err: sqlx::Error) -> ClientError {
    error!(operation, %err, "read failed");
    ClientError::Database(err)
}

/// `ILIKE` pattern matching `term` as a literal substring.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

async fn client_row_exists(conn: &mut PgConnection, client_id: i32) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1)")
        .bind(client_id)
        .fetch_one(conn)
        .await
}

async fn email_held_by_other(conn: &mut PgConnection, email: &str, client_id: i32) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM clients WHERE email = $1 AND id <> $2)",
    )
    .bind(email)
    .bind(client_id)
    .fetch_one(conn)
    .await
}

async fn fetch_phones(conn: &mut PgConnection, client_id: i32) -> sqlx::Result<Vec<PhoneNumber>> {
    sqlx::query_as::<_, PhoneNumber>(
        "SELECT id, client_id, phone_number FROM client_phones WHERE client_id = $1 ORDER BY id",
    )
    .bind(client_id)
    .fetch_all(conn)
    .await
}

// One phone lookup per client row
async fn with_phones(conn: &mut PgConnection, mut clients: Vec<Client>) -> sqlx::Result<Vec<Client>> {
    for client in &mut clients {
        client.phones = fetch_phones(&mut *conn, client.id).await?;
    }
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn own_email_is_not_held_by_another_client() {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let mut conn = PgConnection::connect(&url).await.unwrap();
        let mut tx = conn.begin().await.unwrap();
        sqlx::query(CREATE_CLIENTS_TABLE).execute(&mut *tx).await.unwrap();

        let mut repo = ClientRepository::new(&mut *tx);
        let owner = repo.add_client("Self", "Check", "self-check@test.invalid").await.unwrap();
        let other = repo.add_client("Other", "Check", "other-check@test.invalid").await.unwrap();

        assert!(!email_held_by_other(&mut *tx, "self-check@test.invalid", owner).await.unwrap());
        assert!(email_held_by_other(&mut *tx, "self-check@test.invalid", other).await.unwrap());
        assert!(!email_held_by_other(&mut *tx, "nobody@test.invalid", other).await.unwrap());
    }

    #[test]
    fn plain_term_is_wrapped_in_wildcards() {
        assert_eq!(like_pattern("ivan"), "%ivan%");
    }

    #[test]
    fn empty_term_matches_everything() {
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn wildcards_in_term_are_literal() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
