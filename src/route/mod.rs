use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket, Route};

pub mod class;
pub mod enrollment;
pub mod users;

use class::*;
use enrollment::*;
use users::*;

use utoipa::OpenApi;

use crate::{
    data::{
        class::{Class, ClassData, ClassPatch},
        enrollment::{Enrollment, EnrollmentRequest, WithdrawConfirmation},
        user::db::{AuthResponse, LoginData, RegisterData},
        user::User,
    },
    resp::{
        jwt::doc::JWTAuth,
        problem::{problems, Problem},
    },
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login_submit,
        register_submit,
        class_list,
        class_info,
        admin_class_list,
        admin_class_create,
        admin_class_update,
        admin_class_delete,
        enrollment_create,
        user_enrollments,
        enrollment_delete
    ),
    components(schemas(
        Role,
        User,
        Class,
        ClassData,
        ClassPatch,
        Enrollment,
        EnrollmentRequest,
        WithdrawConfirmation,
        ClassDeletedResponse,
        AuthResponse,
        LoginData,
        RegisterData,
        Problem
    )),
    modifiers(&JWTAuth, &API_PREFIX)
)]
pub struct ApiDoc;

pub struct PathPrefix(pub &'static str);
static API_PREFIX: PathPrefix = PathPrefix("/api");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

/// Reads a numeric path id, answering 400 with `message` otherwise.
pub fn parse_id(value: &str, message: &str) -> Result<u64, Problem> {
    value.parse().map_err(|_| problems::bad_id(message))
}

#[get("/openapi.json")]
pub fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[catch(default)]
pub fn default_catcher(status: Status, req: &Request) -> Problem {
    tracing::debug!("{} {} caught with {}", req.method(), req.uri(), status);

    let title = status.reason().unwrap_or("Unknown error.");
    let mut problem = Problem::new_untyped(status, title);
    if status == Status::NotFound {
        problem.detail("Recurso no encontrado");
    }
    problem
}

pub fn api() -> Vec<Route> {
    routes![
        login_submit,
        register_submit,
        class_list,
        class_info,
        admin_class_list,
        admin_class_create,
        admin_class_update,
        admin_class_delete,
        enrollment_create,
        user_enrollments,
        enrollment_delete,
        openapi_document
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api())
        .register("/", catchers![default_catcher])
}


#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::Value;

    use super::testing::client;

    #[rocket::async_test]
    async fn unknown_route_is_a_problem() {
        let client = client().await;
        let response = client.get("/api/nada").dispatch().await;

        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", "problem+json"))
        );
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["status"], 404);
        assert!(body["error"].is_string());
    }

    #[rocket::async_test]
    async fn openapi_document_lists_api_paths() {
        let client = client().await;
        let response = client.get("/api/openapi.json").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert!(body["paths"]["/api/login"].is_object());
        assert!(body["paths"]["/api/admin/actividades"].is_object());
    }
}
