use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{NewUser, User};
use crate::config::AdminSeed;
use crate::data::password::{hash_password, verify_password};
use crate::error::{GymError, StoreError};
use crate::role::Role;
use crate::store::GymStore;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Deserialize, ToSchema)]
pub struct RegisterData {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    #[schema(format = "email")]
    pub email: String,
    #[serde(default)]
    #[schema(format = "password")]
    pub password: String,
    /// "socio" or "administrador"; anything else registers a member.
    #[serde(default)]
    pub tipo: Option<String>,
}

impl std::fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegisterData:{}", self.email)
    }
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl RegisterData {
    pub fn validate(&self) -> Result<(), GymError> {
        if self.nombre.trim().is_empty() {
            return Err(GymError::Validation(String::from("El nombre es obligatorio")));
        }

        if !is_email(&self.email) {
            return Err(GymError::Validation(String::from(
                "El email no es una dirección válida",
            )));
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(GymError::Validation(format!(
                "La contraseña debe tener al menos {} caracteres",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(())
    }

    pub fn role(&self) -> Role {
        self.tipo.as_deref().map(Role::coerce).unwrap_or_default()
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginData {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.email)
    }
}

impl LoginData {
    pub fn validate(&self) -> Result<(), GymError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(GymError::Validation(String::from(
                "Email y contraseña son obligatorios",
            )));
        }
        Ok(())
    }
}

/// Body returned by login and registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Creates a member or administrator account.
pub async fn register(store: &dyn GymStore, data: RegisterData) -> Result<User, GymError> {
    data.validate()?;

    // Checked up front for the common case; the store's unique email
    // constraint catches concurrent registrations.
    if store.find_user_by_email(&data.email).await?.is_some() {
        return Err(GymError::EmailTaken);
    }

    let user = NewUser {
        tipo: data.role(),
        password_hash: hash_password(&data.password),
        nombre: data.nombre,
        email: data.email,
    };

    match store.insert_user(user).await {
        Ok(user) => {
            tracing::info!("Registered user {} as {}", user.id, user.tipo);
            Ok(user)
        }
        Err(StoreError::Duplicate(_)) => Err(GymError::EmailTaken),
        Err(e) => Err(e.into()),
    }
}

pub async fn authenticate(store: &dyn GymStore, login: &LoginData) -> Result<User, GymError> {
    login.validate()?;

    let user = store
        .find_user_by_email(&login.email)
        .await?
        .ok_or(GymError::InvalidCredentials)?;

    match verify_password(&login.password, &user.password_hash) {
        Some(algorithm) => {
            tracing::debug!("user {} authenticated with {:?} digest", user.id, algorithm);
            Ok(user)
        }
        None => Err(GymError::InvalidCredentials),
    }
}

/// Creates the configured administrator when no administrator exists yet.
/// Returns the created account.
pub async fn seed_admin(store: &dyn GymStore, seed: &AdminSeed) -> Result<Option<User>, GymError> {
    if store.count_users_with_role(Role::Admin).await? > 0 {
        tracing::debug!("administrator already present, skipping seed");
        return Ok(None);
    }

    let admin = NewUser {
        nombre: seed.name.clone(),
        email: seed.email.clone(),
        password_hash: hash_password(&seed.password),
        tipo: Role::Admin,
    };

    match store.insert_user(admin).await {
        Ok(user) => {
            tracing::info!("Created administrator account: {}", user.email);
            Ok(Some(user))
        }
        Err(StoreError::Duplicate(_)) => {
            tracing::warn!(
                "Unable to seed administrator: '{}' is already registered.",
                seed.email
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
