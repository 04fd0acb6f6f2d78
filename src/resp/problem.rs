use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::error::{GymError, StoreError};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
///
/// The rendered body also carries an `error` member holding the
/// human-readable message, which is what clients display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert<V: Into<Value>>(&mut self, key: impl ToString, value: V) -> &mut Problem {
        self.body.insert(key.to_string(), value.into());
        self
    }

    /// Message shown to users: the detail when present, else the title.
    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.title)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = self.body.clone();

        // Following are required by rfc7807
        body.insert(String::from("type"), Value::from(self.type_uri.as_str()));
        body.insert(String::from("title"), Value::from(self.title.as_str()));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = &self.detail {
            body.insert(String::from("detail"), Value::from(detail.as_str()));
        }
        body.insert(String::from("status"), Value::from(self.status.code));

        body.insert(String::from("error"), Value::from(self.message()));
        body
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body_string = Value::Object(self.to_json()).to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "es")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn parse_problem() -> Problem {
        Problem::new_untyped(
            Status::BadRequest,
            "There was a problem parsing part of the request.",
        )
    }

    #[inline]
    pub fn bad_id(detail: impl ToString) -> Problem {
        parse_problem().detail(detail).to_owned()
    }

    #[inline]
    pub fn unauthorized(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn forbidden() -> Problem {
        Problem::new_untyped(Status::Forbidden, "Insufficient permissions.")
            .detail("Permisos insuficientes")
            .to_owned()
    }

    #[inline]
    pub fn not_found(title: &str, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::NotFound, title)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn conflict(title: &str, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::Conflict, title)
            .detail(detail)
            .to_owned()
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        use mongodb::error::ErrorKind;

        tracing::error!("store failure: {}", e);

        fn store_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "Storage failed while processing request.",
            )
        }

        fn access_problem() -> Problem {
            Problem::new_untyped(
                Status::InternalServerError,
                "Server was unable to access storage.",
            )
        }

        let problem = match &e {
            StoreError::Database(db) => match db.kind.as_ref() {
                ErrorKind::Authentication { .. } => access_problem(),
                ErrorKind::DnsResolve { .. } => access_problem(),
                ErrorKind::ServerSelection { .. } => access_problem(),
                ErrorKind::InvalidTlsConfig { .. } => access_problem(),
                ErrorKind::IncompatibleServer { .. } => access_problem(),
                _ => store_problem(),
            },
            _ => store_problem(),
        };

        problem
            .to_owned()
            .detail("Error interno del servidor")
            .to_owned()
    }
}

impl From<GymError> for Problem {
    fn from(e: GymError) -> Self {
        match e {
            GymError::Validation(message) => problems::parse_problem().detail(message).to_owned(),
            GymError::EmailTaken => {
                problems::conflict("Email already registered.", "El email ya está registrado")
            }
            GymError::InvalidCredentials => problems::unauthorized("Credenciales inválidas"),
            GymError::UserNotFound(id) => problems::not_found(
                "User doesn't exist.",
                format!("Usuario con ID {} no encontrado", id),
            )
            .insert("id", id)
            .to_owned(),
            GymError::ClassNotFound(id) => problems::not_found(
                "Class doesn't exist.",
                format!("Actividad con ID {} no encontrada", id),
            )
            .insert("id", id)
            .to_owned(),
            GymError::EnrollmentNotFound(id) => {
                problems::not_found("Enrollment doesn't exist.", "Inscripción no encontrada")
                    .insert("id", id)
                    .to_owned()
            }
            GymError::AlreadyEnrolled => problems::conflict(
                "Already enrolled.",
                "Ya estás inscrito en esta actividad",
            ),
            GymError::ClassFull => problems::conflict(
                "Class is full.",
                "No hay cupo disponible para esta actividad",
            ),
            GymError::Store(e) => Problem::from(e),
        }
    }
}

/// Describes a body error without the raw body, which may hold credentials.
pub fn body_error_summary(e: &rocket::serde::json::Error<'_>) -> String {
    use rocket::serde::json::Error;

    match e {
        Error::Io(io) => format!("io: {}", io),
        Error::Parse(_, parse) => format!("parse: {}", parse),
    }
}

impl From<rocket::serde::json::Error<'_>> for Problem {
    fn from(e: rocket::serde::json::Error<'_>) -> Self {
        tracing::debug!("unable to parse request body: {}", body_error_summary(&e));
        problems::parse_problem().detail("Datos inválidos").to_owned()
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => problems::unauthorized("Token expirado"),
            _ => problems::unauthorized("Token inválido"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_and_not_found_map_to_status() {
        assert_eq!(Problem::from(GymError::EmailTaken).status, Status::Conflict);
        assert_eq!(Problem::from(GymError::AlreadyEnrolled).status, Status::Conflict);
        assert_eq!(Problem::from(GymError::ClassFull).status, Status::Conflict);
        assert_eq!(Problem::from(GymError::ClassNotFound(3)).status, Status::NotFound);
        assert_eq!(Problem::from(GymError::UserNotFound(3)).status, Status::NotFound);
        assert_eq!(
            Problem::from(GymError::EnrollmentNotFound(3)).status,
            Status::NotFound
        );
        assert_eq!(
            Problem::from(GymError::InvalidCredentials).status,
            Status::Unauthorized
        );
        assert_eq!(
            Problem::from(GymError::Validation(String::from("x"))).status,
            Status::BadRequest
        );
    }

    #[test]
    fn store_failures_are_generic() {
        let problem = Problem::from(GymError::Store(StoreError::Malformed {
            collection: "actividades",
            reason: String::from("secret internals"),
        }));

        assert_eq!(problem.status, Status::InternalServerError);
        let rendered = Value::Object(problem.to_json()).to_string();
        assert!(!rendered.contains("secret internals"));
        assert!(rendered.contains("Error interno del servidor"));
    }

    #[test]
    fn body_errors_never_echo_the_body() {
        use rocket::serde::json::Error;

        let raw = r#"{"email":"ana@example.com","password":"hunter22","#;
        let parse = serde_json::from_str::<Value>(raw).unwrap_err();
        let e = Error::Parse(raw, parse);

        let summary = body_error_summary(&e);
        assert!(summary.starts_with("parse: "));
        assert!(!summary.contains("hunter22"));

        let problem = Problem::from(e);
        assert_eq!(problem.status, Status::BadRequest);
        assert!(!Value::Object(problem.to_json()).to_string().contains("hunter22"));
    }

    #[test]
    fn json_carries_error_message() {
        let json = Problem::from(GymError::ClassFull).to_json();

        assert_eq!(json["error"], "No hay cupo disponible para esta actividad");
        assert_eq!(json["status"], 409);
        assert_eq!(json["type"], "about:blank");
        assert_eq!(json["title"], "Class is full.");
    }
}
