use crate::{
    auth::{
        auth::AuthUser,
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    db::{
        is_foreign_key_violation, is_unique_violation,
        rows::{USER_COLUMNS, UserRow},
    },
    model::{role::Role, user::User},
    models::{LoginReqDto, TokenType, UserReq},
    workflow::access::{Actor, Operation},
};
use actix_web::{HttpRequest, HttpResponse, Responder, get, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Inserts a new user; a taken username maps to 409.
async fn insert_user(
    username: &str,
    password: &str,
    role: Role,
    employee_id: Option<u64>,
    pool: &MySqlPool,
) -> Result<u64, HttpResponse> {
    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        HttpResponse::InternalServerError().finish()
    })?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role, employee_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(hashed)
    .bind(role.as_ref())
    .bind(employee_id)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_id()),
        Err(e) if is_unique_violation(&e) => Err(HttpResponse::Conflict().json(json!({
            "error": "Username already exists or the employee already has an account"
        }))),
        Err(e) if is_foreign_key_violation(&e) => Err(HttpResponse::BadRequest().json(json!({
            "error": "Unknown employee_id"
        }))),
        Err(e) => {
            error!(error = %e, "Failed to register user");
            Err(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            })))
        }
    }
}

/// Role and employee link a registration may claim. Anyone gets an
/// unlinked `employee` account; linking a login to an employee record is
/// reserved to HR and admins, other roles to admins.
fn registration_grant(
    caller: Option<&Actor>,
    role: Option<Role>,
    employee_id: Option<u64>,
) -> Result<(Role, Option<u64>), &'static str> {
    let role = role.unwrap_or(Role::Employee);
    if role != Role::Employee && !caller.is_some_and(|c| c.role == Role::Admin) {
        return Err("Only an admin can create accounts with this role");
    }
    if employee_id.is_some() && !caller.is_some_and(|c| c.can(Operation::ManageEmployees)) {
        return Err("Only HR or an admin can link an account to an employee");
    }
    Ok((role, employee_id))
}

/// User registration. Anyone may create an unlinked `employee` account;
/// other roles and employee links need a privileged access token.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully",
            "user_id": 12
        })),
        (status = 400, description = "Empty username or password"),
        (status = 403, description = "Privileged role or employee link requested without the right token"),
        (status = 409, description = "Username taken or employee already has an account")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all, fields(username = %user.username))]
pub async fn register(
    caller: Option<AuthUser>,
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    let username = user.username.trim().to_lowercase();

    if username.is_empty() || user.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Username and password must not be empty"
        }));
    }

    let caller = caller.map(|c| c.actor());
    let (role, employee_id) = match registration_grant(caller.as_ref(), user.role, user.employee_id) {
        Ok(grant) => grant,
        Err(reason) => {
            info!(requested_role = ?user.role, linked = user.employee_id.is_some(), "Registration refused");
            return HttpResponse::Forbidden().json(json!({ "error": reason }));
        }
    };

    match insert_user(&username, &user.password, role, employee_id, pool.get_ref()).await {
        Ok(user_id) => {
            info!(user_id, %role, "User registered");
            HttpResponse::Created().json(json!({
                "message": "User registered successfully",
                "user_id": user_id
            }))
        }
        Err(err_resp) => err_resp,
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

async fn store_refresh_token(
    pool: &MySqlPool,
    user_id: u64,
    jti: &str,
    exp: usize,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

fn issue_tokens(subject: &Subject<'_>, config: &Config) -> Result<(String, String, crate::models::Claims), HttpResponse> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl);
    let refresh = generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl);
    match (access_token, refresh) {
        (Ok(access), Ok((refresh, claims))) => Ok((access, refresh, claims)),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "Failed to sign token");
            Err(HttpResponse::InternalServerError().finish())
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let username = user.username.trim().to_lowercase();
    debug!("Fetching user from database");

    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let db_user = match sqlx::query_as::<_, UserRow>(&sql)
        .bind(&username)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(row)) => match User::try_from(row) {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "Stored user is malformed");
                return HttpResponse::InternalServerError().finish();
            }
        },
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    let subject = Subject {
        user_id: db_user.id,
        username: &db_user.username,
        role: db_user.role,
        employee_id: db_user.employee_id,
    };
    let (access_token, refresh_token, refresh_claims) = match issue_tokens(&subject, &config) {
        Ok(tokens) => tokens,
        Err(resp) => return resp,
    };

    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    if let Err(e) =
        store_refresh_token(pool.get_ref(), db_user.id, &refresh_claims.jti, refresh_claims.exp).await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, role = %db_user.role, "Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    })
}

/// The identity resolved from the access token.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current user", body = AuthUser),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[get("/me")]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(auth)
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::Unauthorized().body("No token");
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!(error = %e, "Failed to open transaction");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await;

    let (record_id, user_id) = match record {
        Ok(Some((id, user_id, false))) => (id, user_id),
        Ok(_) => {
            info!(jti = %claims.jti, "Refresh token unknown or revoked");
            return HttpResponse::Unauthorized().finish();
        }
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // role and employee link may have changed since the token was issued
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let user = match sqlx::query_as::<_, UserRow>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
    {
        Ok(Some(row)) => match User::try_from(row) {
            Ok(user) if user.is_active => user,
            _ => return HttpResponse::Unauthorized().finish(),
        },
        Ok(None) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to load user for refresh");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let subject = Subject {
        user_id: user.id,
        username: &user.username,
        role: user.role,
        employee_id: user.employee_id,
    };
    let (access_token, new_refresh_token, new_claims) = match issue_tokens(&subject, &config) {
        Ok(tokens) => tokens,
        Err(resp) => return resp,
    };

    let rotated = async {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, FROM_UNIXTIME(?))
            "#,
        )
        .bind(user.id)
        .bind(&new_claims.jti)
        .bind(new_claims.exp as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await
    }
    .await;

    if let Err(e) = rotated {
        error!(error = %e, "Failed to rotate refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token: new_refresh_token,
    })
}

/// Revokes the presented refresh token. Always 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}
