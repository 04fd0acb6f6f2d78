use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::class::Class;
use crate::data::user::User;
use crate::error::GymError;

pub mod db;

/// A user's place in a class ("inscripción").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    pub id: u64,
    pub usuario_id: u64,
    pub actividad_id: u64,
    pub fecha_inscripcion: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usuario: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actividad: Option<Class>,
}

impl Enrollment {
    pub fn new(id: u64, usuario_id: u64, actividad_id: u64, at: DateTime<Utc>) -> Enrollment {
        Enrollment {
            id,
            usuario_id,
            actividad_id,
            fecha_inscripcion: at,
            created_at: at,
            updated_at: at,
            deleted_at: None,
            usuario: None,
            actividad: None,
        }
    }
}

/// Result of the store's guarded insert.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted(Enrollment),
    AlreadyEnrolled,
    Full,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EnrollmentRequest {
    #[serde(default)]
    pub usuario_id: u64,
    #[serde(default)]
    pub actividad_id: u64,
}

impl EnrollmentRequest {
    pub fn validate(&self) -> Result<(), GymError> {
        if self.usuario_id == 0 {
            return Err(GymError::Validation(String::from(
                "Datos inválidos: usuario_id es obligatorio",
            )));
        }
        if self.actividad_id == 0 {
            return Err(GymError::Validation(String::from(
                "Datos inválidos: actividad_id es obligatorio",
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WithdrawConfirmation {
    pub message: String,
}
