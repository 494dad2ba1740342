use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

use crate::workflow::error::WorkflowError;

impl ResponseError for WorkflowError {
    fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            e if e.is_conflict() => StatusCode::CONFLICT,
            WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            WorkflowError::Validation(violation) => json!({
                "error": violation.kind(),
                "message": violation.to_string(),
                "details": violation,
            }),
            WorkflowError::Configuration(_) | WorkflowError::Persistence(_) => {
                tracing::error!(error = %self, kind = self.kind(), "Request failed");
                json!({
                    "error": self.kind(),
                    "message": "Something went wrong, Contact with system admin",
                })
            }
            _ => json!({
                "error": self.kind(),
                "message": self.to_string(),
            }),
        };
        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::LeaveType;
    use crate::workflow::error::Violation;

    #[test]
    fn maps_taxonomy_to_http_status() {
        let cases = [
            (WorkflowError::Validation(Violation::NoWorkingDays), StatusCode::BAD_REQUEST),
            (WorkflowError::AlreadyDecided { step_order: 1 }, StatusCode::CONFLICT),
            (
                WorkflowError::PolicyConflict { leave_type: LeaveType::Sick },
                StatusCode::CONFLICT,
            ),
            (WorkflowError::not_found("leave request", 9), StatusCode::NOT_FOUND),
            (WorkflowError::forbidden("no"), StatusCode::FORBIDDEN),
            (
                WorkflowError::Persistence("lost connection".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }

    #[test]
    fn hides_persistence_details_from_clients() {
        let resp = WorkflowError::Persistence("password=hunter2".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
