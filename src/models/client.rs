use chrono::NaiveDateTime;

use super::PhoneNumber;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Client {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: Option<NaiveDateTime>,
    // Loaded on demand by the repository
    #[sqlx(skip)]
    pub phones: Vec<PhoneNumber>,
}
