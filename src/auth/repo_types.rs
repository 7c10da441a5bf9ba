use serde::Serialize;
use sqlx::FromRow;

/// Admin account row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string
}
