use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::State;

use crate::data::user::db::{authenticate, register, AuthResponse, LoginData, RegisterData};
use crate::data::user::User;
use crate::resp::jwt::SessionToken;
use crate::resp::problem::Problem;
use crate::security::Security;
use crate::store::Store;

fn auth_response(user: User, security: &Security) -> Result<AuthResponse, Problem> {
    let token = SessionToken::issue(&user)
        .encode_jwt(&security.jwt_keys)
        .map_err(|e| {
            tracing::error!("unable to sign session token: {}", e);
            Problem::new_untyped(Status::InternalServerError, "Unable to issue session token.")
                .detail("Error al generar token")
                .to_owned()
        })?;

    Ok(AuthResponse { token, user })
}

/// Exchange credentials for a session token
#[utoipa::path(
    request_body = LoginData,
    responses(
        (status = 200, description = "Session token and user", body = AuthResponse),
        (status = 400, description = "Missing email or password", body = Problem),
        (status = 401, description = "Unknown email or wrong password", body = Problem),
    )
)]
#[post("/login", data = "<login_user>")]
#[tracing::instrument(skip(login_user, store, security))]
pub async fn login_submit<'r>(
    login_user: Result<Json<LoginData>, json::Error<'r>>,
    store: &State<Store>,
    security: &State<Security>,
) -> Result<Json<AuthResponse>, Problem> {
    let login_user = login_user?.into_inner();

    let user = authenticate(store.inner().as_ref(), &login_user).await?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(auth_response(user, security)?))
}

/// Create an account
///
/// Accounts are members unless `tipo` is exactly "administrador".
#[utoipa::path(
    request_body = RegisterData,
    responses(
        (status = 201, description = "Session token and the created user", body = AuthResponse),
        (status = 400, description = "Invalid registration data", body = Problem),
        (status = 409, description = "Email already registered", body = Problem),
    )
)]
#[post("/register", data = "<create_user>")]
#[tracing::instrument(skip(create_user, store, security))]
pub async fn register_submit<'r>(
    create_user: Result<Json<RegisterData>, json::Error<'r>>,
    store: &State<Store>,
    security: &State<Security>,
) -> Result<status::Custom<Json<AuthResponse>>, Problem> {
    let create_user = create_user?.into_inner();

    let user = register(store.inner().as_ref(), create_user).await?;

    Ok(status::Custom(
        Status::Created,
        Json(auth_response(user, security)?),
    ))
}

///////////////////////
//       TESTS
///////////////////////

#[cfg(test)]
mod user_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::data::password::DigestAlgorithm;
    use crate::data::user::NewUser;
    use crate::resp::jwt::SessionToken;
    use crate::role::Role;
    use crate::route::testing::{client, post_json, test_config, ADMIN_EMAIL, ADMIN_PASSWORD};
    use crate::security::Security;
    use crate::store::Store;

    #[rocket::async_test]
    async fn register_returns_verifiable_token() {
        let client = client().await;
        let (status, body) = post_json(
            &client,
            "/api/register",
            json!({ "nombre": "Ana", "email": "ana@example.com", "password": "secreto" }),
        )
        .await;

        assert_eq!(status, Status::Created);
        assert_eq!(body["user"]["email"], "ana@example.com");
        assert_eq!(body["user"]["tipo"], "socio");
        assert!(body["user"].get("password_hash").is_none());

        let security = Security::load(&test_config());
        let claims = SessionToken::validate(body["token"].as_str().unwrap(), &security.jwt_keys)
            .expect("token should verify");
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.tipo, Role::Member);
        assert_eq!(Some(claims.user_id), body["user"]["id"].as_u64());
        assert_eq!((claims.exp - claims.iat).num_hours(), 24);
    }

    #[rocket::async_test]
    async fn register_taken_email_conflicts() {
        let client = client().await;
        let body = json!({ "nombre": "Ana", "email": "ana@example.com", "password": "secreto" });

        let (first, _) = post_json(&client, "/api/register", body.clone()).await;
        assert_eq!(first, Status::Created);

        let (second, problem) = post_json(&client, "/api/register", body).await;
        assert_eq!(second, Status::Conflict);
        assert_eq!(problem["error"], "El email ya está registrado");
    }

    #[rocket::async_test]
    async fn register_unknown_role_is_member() {
        let client = client().await;
        let (status, body) = post_json(
            &client,
            "/api/register",
            json!({ "nombre": "Beto", "email": "beto@example.com", "password": "secreto", "tipo": "jefe" }),
        )
        .await;

        assert_eq!(status, Status::Created);
        assert_eq!(body["user"]["tipo"], "socio");
    }

    #[rocket::async_test]
    async fn register_validates_input() {
        let client = client().await;

        let (short, _) = post_json(
            &client,
            "/api/register",
            json!({ "nombre": "Ana", "email": "ana@example.com", "password": "123" }),
        )
        .await;
        assert_eq!(short, Status::BadRequest);

        let response = client
            .post("/api/register")
            .header(ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn login_accepts_both_digests() {
        let client = client().await;
        let store: &Store = client.rocket().state().expect("store not managed");

        for (email, algorithm) in [
            ("sha@example.com", DigestAlgorithm::Sha256),
            ("md5@example.com", DigestAlgorithm::Md5),
        ] {
            store
                .insert_user(NewUser {
                    nombre: String::from("Legacy"),
                    email: email.to_string(),
                    password_hash: algorithm.hex_digest("clave123"),
                    tipo: Role::Member,
                })
                .await
                .expect("unable to create test user");

            let (ok, body) = post_json(
                &client,
                "/api/login",
                json!({ "email": email, "password": "clave123" }),
            )
            .await;
            assert_eq!(ok, Status::Ok);
            assert_eq!(body["user"]["email"], email);
            assert!(body["token"].is_string());

            let (wrong, problem) = post_json(
                &client,
                "/api/login",
                json!({ "email": email, "password": "clave999" }),
            )
            .await;
            assert_eq!(wrong, Status::Unauthorized);
            assert_eq!(problem["error"], "Credenciales inválidas");
        }
    }

    #[rocket::async_test]
    async fn login_unknown_email_is_unauthorized() {
        let client = client().await;
        let (status, _) = post_json(
            &client,
            "/api/login",
            json!({ "email": "nadie@example.com", "password": "clave123" }),
        )
        .await;
        assert_eq!(status, Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn seeded_admin_can_login() {
        let client = client().await;
        let (status, body) = post_json(
            &client,
            "/api/login",
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        )
        .await;

        assert_eq!(status, Status::Ok);
        assert_eq!(body["user"]["tipo"], "administrador");
    }
}
