use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};

use crate::data::user::User;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::security::{KeySet, Security};
use crate::util::date_time_as_unix_seconds;

pub static AUTH_HEADER_NAME: &str = "Authorization";
const BEARER_PREFIX: &str = "Bearer ";

/// Session lifetime, counted from issuance.
pub fn session_length() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    pub user_id: u64,
    pub email: String,
    pub tipo: Role,
    #[serde(with = "date_time_as_unix_seconds")]
    pub iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    pub exp: DateTime<Utc>,
}

impl SessionToken {
    pub fn issue(user: &User) -> SessionToken {
        let now = Utc::now();
        SessionToken {
            user_id: user.id,
            email: user.email.clone(),
            tipo: user.tipo,
            iat: now,
            exp: now + session_length(),
        }
    }

    pub fn encode_jwt(&self, keys: &KeySet) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), &self, &keys.encoding)
    }

    /// Checks signature and expiry, returning the embedded claims.
    pub fn validate(token: &str, keys: &KeySet) -> Result<SessionToken, jsonwebtoken::errors::Error> {
        decode::<SessionToken>(token, &keys.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }
}

pub fn bearer_token(header: Option<&str>) -> Result<&str, Problem> {
    let value = match header {
        Some(it) if !it.is_empty() => it,
        _ => return Err(problems::unauthorized("Token de autorización requerido")),
    };

    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(problems::unauthorized("Token inválido")),
    }
}

pub fn extract_claims(header: Option<&str>, keys: &KeySet) -> Result<SessionToken, Problem> {
    let token = bearer_token(header)?;
    tracing::debug!("extracted bearer token from header");

    match SessionToken::validate(token, keys) {
        Ok(it) => {
            tracing::debug!("decoded session token for user: {}", it.user_id);
            Ok(it)
        }
        Err(e) => {
            tracing::debug!("rejected session token: {}", e);
            Err(Problem::from(e))
        }
    }
}

fn server_problem() -> Problem {
    Problem::new_untyped(Status::InternalServerError, "Token keys aren't configured.")
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => return Outcome::Error((Status::InternalServerError, server_problem())),
        };

        tracing::trace!("extracting session token from request headers");
        match extract_claims(req.headers().get_one(AUTH_HEADER_NAME), &security.jwt_keys) {
            Ok(claims) => Outcome::Success(claims),
            Err(e) => Outcome::Error((Status::Unauthorized, e)),
        }
    }
}

/// Session of an administrator; members are turned away with 403.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminToken(pub SessionToken);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let session = match SessionToken::from_request(req).await {
            Outcome::Success(it) => it,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(status) => return Outcome::Forward(status),
        };

        if !session.tipo.is_admin() {
            tracing::debug!("user {} isn't an administrator", session.user_id);
            return Outcome::Error((Status::Forbidden, problems::forbidden()));
        }

        Outcome::Success(AdminToken(session))
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> SecurityScheme {
            let mut http = Http::new(HttpAuthScheme::Bearer);
            http.bearer_format = Some("JWT".to_string());
            SecurityScheme::Http(http)
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}
