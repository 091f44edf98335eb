use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StateEntry {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}
