#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub id: i32,
    pub client_id: i32,
    #[sqlx(rename = "phone_number")]
    pub number: String,
}
