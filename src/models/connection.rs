use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A registered storage cluster connection that rules can be scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Default database on this connection
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateConnection {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    #[validate(length(min = 1, max = 255))]
    #[serde(default = "default_database")]
    pub database: String,

    #[validate(length(max = 1024))]
    #[serde(default)]
    pub description: Option<String>,

    /// Marking a connection as default clears the flag on all others.
    #[serde(default)]
    pub is_default: bool,
}

fn default_port() -> u16 {
    8123
}

fn default_database() -> String {
    "default".to_string()
}
