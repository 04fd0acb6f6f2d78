use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::State;

use super::parse_id;
use crate::data::enrollment::db::{enroll, list_for_user, withdraw};
use crate::data::enrollment::{Enrollment, EnrollmentRequest, WithdrawConfirmation};
use crate::resp::problem::Problem;
use crate::store::Store;

/// Enroll a user in a class
#[utoipa::path(
    request_body = EnrollmentRequest,
    responses(
        (status = 201, description = "Enrollment with its user and class", body = Enrollment),
        (status = 400, description = "Missing ids", body = Problem),
        (status = 404, description = "User or class doesn't exist", body = Problem),
        (status = 409, description = "Already enrolled or no seats left", body = Problem),
    )
)]
#[post("/inscripciones", data = "<request>")]
#[tracing::instrument(skip(store))]
pub async fn enrollment_create<'r>(
    request: Result<Json<EnrollmentRequest>, json::Error<'r>>,
    store: &State<Store>,
) -> Result<status::Custom<Json<Enrollment>>, Problem> {
    let request = request?.into_inner();
    request.validate()?;

    let enrollment = enroll(
        store.inner().as_ref(),
        request.usuario_id,
        request.actividad_id,
    )
    .await?;

    Ok(status::Custom(Status::Created, Json(enrollment)))
}

/// List a user's enrollments
#[utoipa::path(
    params(
        ("id", description = "user ID")
    ),
    responses(
        (status = 200, description = "Enrollments, each with its class when it still exists", body = Vec<Enrollment>),
        (status = 400, description = "Non-numeric id", body = Problem),
    )
)]
#[get("/usuarios/<id>/inscripciones")]
#[tracing::instrument(skip(store))]
pub async fn user_enrollments(
    id: &str,
    store: &State<Store>,
) -> Result<Json<Vec<Enrollment>>, Problem> {
    let id = parse_id(id, "ID de usuario inválido")?;
    Ok(Json(list_for_user(store.inner().as_ref(), id).await?))
}

/// Withdraw from a class
#[utoipa::path(
    params(
        ("id", description = "enrollment ID")
    ),
    responses(
        (status = 200, description = "Confirmation naming the class", body = WithdrawConfirmation),
        (status = 400, description = "Non-numeric id", body = Problem),
        (status = 404, description = "Enrollment doesn't exist", body = Problem),
    )
)]
#[delete("/inscripciones/<id>")]
#[tracing::instrument(skip(store))]
pub async fn enrollment_delete(
    id: &str,
    store: &State<Store>,
) -> Result<Json<WithdrawConfirmation>, Problem> {
    let id = parse_id(id, "ID de inscripción inválido")?;
    Ok(Json(withdraw(store.inner().as_ref(), id).await?))
}

///////////////////////
//       TESTS
///////////////////////
