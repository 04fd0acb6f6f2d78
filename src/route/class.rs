use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::parse_id;
use crate::data::class::db::{
    create_class, delete_class, get_class, list_classes, list_classes_by_schedule, update_class,
};
use crate::data::class::{Class, ClassData, ClassFilter, ClassPatch};
use crate::resp::jwt::AdminToken;
use crate::resp::problem::Problem;
use crate::store::Store;

const BAD_CLASS_ID: &str = "ID inválido";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassDeletedResponse {
    pub message: String,
}

/// List classes
///
/// Every field filter is optional; `search` matches title, description or
/// instructor.
#[utoipa::path(
    params(
        ("search", description = "Case-insensitive text in title, description or instructor"),
        ("categoria", description = "Exact category"),
        ("horario", description = "Exact time slot"),
    ),
    responses(
        (status = 200, description = "Classes with available seats, by id", body = Vec<Class>),
    )
)]
#[get("/actividades?<search>&<categoria>&<horario>")]
#[tracing::instrument(skip(store))]
pub async fn class_list(
    search: Option<&str>,
    categoria: Option<&str>,
    horario: Option<&str>,
    store: &State<Store>,
) -> Result<Json<Vec<Class>>, Problem> {
    let filter = ClassFilter::public(search, categoria, horario);
    Ok(Json(list_classes(store.inner().as_ref(), &filter).await?))
}

/// Get a class
#[utoipa::path(
    params(
        ("id", description = "class ID")
    ),
    responses(
        (status = 200, description = "The class with its available seats", body = Class),
        (status = 400, description = "Non-numeric id", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    )
)]
#[get("/actividades/<id>")]
#[tracing::instrument(skip(store))]
pub async fn class_info(id: &str, store: &State<Store>) -> Result<Json<Class>, Problem> {
    let id = parse_id(id, BAD_CLASS_ID)?;
    Ok(Json(get_class(store.inner().as_ref(), id).await?))
}

/// List classes for the admin panel
///
/// Ordered by weekday (Lunes to Domingo, then "Horario Libre") and time.
#[utoipa::path(
    params(
        ("search", description = "Case-insensitive text in title, description or instructor"),
        ("categoria", description = "Exact category"),
        ("dia", description = "Exact day"),
    ),
    responses(
        (status = 200, description = "Classes in schedule order", body = Vec<Class>),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an administrator", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/actividades?<search>&<categoria>&<dia>")]
#[tracing::instrument(skip(store))]
pub async fn admin_class_list(
    search: Option<&str>,
    categoria: Option<&str>,
    dia: Option<&str>,
    auth: Result<AdminToken, Problem>,
    store: &State<Store>,
) -> Result<Json<Vec<Class>>, Problem> {
    auth?;

    let filter = ClassFilter::admin(search, categoria, dia);
    Ok(Json(
        list_classes_by_schedule(store.inner().as_ref(), &filter).await?,
    ))
}

/// Create a class
#[utoipa::path(
    request_body = ClassData,
    responses(
        (status = 201, description = "The created class", body = Class),
        (status = 400, description = "Invalid class data", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an administrator", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/admin/actividades", data = "<class>")]
#[tracing::instrument(skip(store))]
pub async fn admin_class_create<'r>(
    class: Result<Json<ClassData>, json::Error<'r>>,
    auth: Result<AdminToken, Problem>,
    store: &State<Store>,
) -> Result<status::Custom<Json<Class>>, Problem> {
    let admin = auth?;
    let class = class?.into_inner();

    let created = create_class(store.inner().as_ref(), class).await?;
    tracing::debug!("class {} created by user {}", created.id, admin.0.user_id);

    Ok(status::Custom(Status::Created, Json(created)))
}

/// Update a class
///
/// Only the fields present in the body are changed.
#[utoipa::path(
    params(
        ("id", description = "class ID")
    ),
    request_body = ClassPatch,
    responses(
        (status = 200, description = "The updated class", body = Class),
        (status = 400, description = "Invalid id or class data", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an administrator", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/admin/actividades/<id>", data = "<patch>")]
#[tracing::instrument(skip(store))]
pub async fn admin_class_update<'r>(
    id: &str,
    patch: Result<Json<ClassPatch>, json::Error<'r>>,
    auth: Result<AdminToken, Problem>,
    store: &State<Store>,
) -> Result<Json<Class>, Problem> {
    auth?;
    let id = parse_id(id, BAD_CLASS_ID)?;
    let patch = patch?.into_inner();

    Ok(Json(update_class(store.inner().as_ref(), id, patch).await?))
}

/// Delete a class
#[utoipa::path(
    params(
        ("id", description = "class ID")
    ),
    responses(
        (status = 200, description = "Class removed", body = ClassDeletedResponse),
        (status = 400, description = "Non-numeric id", body = Problem),
        (status = 401, description = "Missing or invalid token", body = Problem),
        (status = 403, description = "Not an administrator", body = Problem),
        (status = 404, description = "Class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/admin/actividades/<id>")]
#[tracing::instrument(skip(store))]
pub async fn admin_class_delete(
    id: &str,
    auth: Result<AdminToken, Problem>,
    store: &State<Store>,
) -> Result<Json<ClassDeletedResponse>, Problem> {
    auth?;
    let id = parse_id(id, BAD_CLASS_ID)?;

    delete_class(store.inner().as_ref(), id).await?;

    Ok(Json(ClassDeletedResponse {
        message: String::from("Actividad eliminada correctamente"),
    }))
}

///////////////////////
//       TESTS
///////////////////////
