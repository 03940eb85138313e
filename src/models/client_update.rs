use sqlx::{Postgres, QueryBuilder};

use super::Client;

/// Set of client fields to change in a partial update.
///
/// An absent field, or one given as an empty string, leaves the stored value
/// as it is. Clauses are always emitted in the order first name, last name,
/// email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() { None } else { Some(value) }
}

impl ClientUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = non_empty(value);
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = non_empty(value);
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = non_empty(value);
        self
    }

    /// Build from optional values, as handed over by a CLI or form.
    pub fn from_parts(
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            first_name: first_name.and_then(non_empty),
            last_name: last_name.and_then(non_empty),
            email: email.and_then(non_empty),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }

    /// Drop fields whose new value equals what `current` already holds.
    pub fn without_unchanged(&self, current: &Client) -> Self {
        fn keep(new: &Option<String>, old: &str) -> Option<String> {
            new.as_ref().filter(|value| value.as_str() != old).cloned()
        }

        Self {
            first_name: keep(&self.first_name, &current.first_name),
            last_name: keep(&self.last_name, &current.last_name),
            email: keep(&self.email, &current.email),
        }
    }

    /// Build the `UPDATE` statement, one placeholder per supplied field
    /// followed by the row id predicate. `None` if there is nothing to set.
    pub fn update_query(&self, client_id: i32) -> Option<QueryBuilder<'static, Postgres>> {
        if self.is_empty() {
            return None;
        }

        let mut builder = QueryBuilder::new("UPDATE clients SET ");
        {
            let mut fields = builder.separated(", ");
            let columns = [
                ("first_name = ", &self.first_name),
                ("last_name = ", &self.last_name),
                ("email = ", &self.email),
            ];
            for (column, value) in columns {
                if let Some(value) = value {
                    fields.push(column);
                    fields.push_bind_unseparated(value.clone());
                }
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(client_id);

        Some(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Client {
        Client {
            id: 1,
            first_name: "Ivan".to_string(),
            last_name: "Petrov".to_string(),
            email: "ivan@example.com".to_string(),
            created_at: None,
            phones: Vec::new(),
        }
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let update = ClientUpdate::new().first_name("").last_name("").email("");
        assert!(update.is_empty());
        assert!(update.update_query(1).is_none());
    }

    #[test]
    fn single_field_gets_first_placeholder() {
        let update = ClientUpdate::new().last_name("Sidorov");
        let builder = update.update_query(5).unwrap();
        assert_eq!(builder.sql(), "UPDATE clients SET last_name = $1 WHERE id = $2");
    }

    #[test]
    fn fields_follow_fixed_order() {
        // Setter order must not affect clause order
        let update = ClientUpdate::new()
            .email("new@example.com")
            .first_name("Anna");
        let builder = update.update_query(9).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE clients SET first_name = $1, email = $2 WHERE id = $3"
        );
    }

    #[test]
    fn all_fields() {
        let update = ClientUpdate::from_parts(
            Some("Anna".to_string()),
            Some("Ivanova".to_string()),
            Some("anna@example.com".to_string()),
        );
        let builder = update.update_query(2).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE clients SET first_name = $1, last_name = $2, email = $3 WHERE id = $4"
        );
    }

    #[test]
    fn from_parts_filters_empty_values() {
        let update = ClientUpdate::from_parts(Some(String::new()), None, Some("x@y.z".to_string()));
        assert_eq!(update, ClientUpdate::new().email("x@y.z"));
    }

    #[test]
    fn values_equal_to_stored_ones_are_dropped() {
        let update = ClientUpdate::new()
            .first_name("Ivan")
            .last_name("Smirnov")
            .email("ivan@example.com");

        let effective = update.without_unchanged(&stored());
        assert_eq!(effective, ClientUpdate::new().last_name("Smirnov"));
    }

    #[test]
    fn resubmitting_stored_values_is_empty() {
        let update = ClientUpdate::new()
            .first_name("Ivan")
            .last_name("Petrov")
            .email("ivan@example.com");
        assert!(update.without_unchanged(&stored()).is_empty());
    }
}
