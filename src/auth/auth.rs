use crate::config::Config;
use crate::models::TokenType;
use crate::{
    auth::jwt::verify_token,
    model::role::Role,
    workflow::{
        access::{Actor, Operation},
        error::WorkflowError,
    },
};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data,
};
use futures::future::{Ready, ready};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) if c.token_type == TokenType::Access => c,
            _ => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
            employee_id: claims.employee_id,
        }))
    }
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
            employee_id: self.employee_id,
        }
    }

    pub fn require(&self, op: Operation) -> Result<Actor, WorkflowError> {
        let actor = self.actor();
        actor.require(op)?;
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 20,
            username: "hr".into(),
            role,
            employee_id: Some(2),
        }
    }

    #[test]
    fn require_returns_actor_for_permitted_role() {
        let actor = user(Role::Hr).require(Operation::ManagePolicies).unwrap();
        assert_eq!(actor.employee_id, Some(2));
    }

    #[test]
    fn require_refuses_employee_for_policy_management() {
        let err = user(Role::Employee).require(Operation::ManagePolicies).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }
}
