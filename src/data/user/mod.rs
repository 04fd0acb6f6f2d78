use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::role::Role;

pub mod db;

/// A registered gym user. The password digest never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: u64,
    pub nombre: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub tipo: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// User fields before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub nombre: String,
    pub email: String,
    pub password_hash: String,
    pub tipo: Role,
}

impl NewUser {
    pub fn into_user(self, id: u64, now: DateTime<Utc>) -> User {
        User {
            id,
            nombre: self.nombre,
            email: self.email,
            password_hash: self.password_hash,
            tipo: self.tipo,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
