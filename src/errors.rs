use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let AppError::Domain(domain) = self else {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }));
        };

        match domain {
            DomainError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": domain.to_string()
            })),
            // Generic body: not-found details stay out of responses on
            // externally reachable paths such as the webhook.
            DomainError::NotFound { kind, .. } => {
                HttpResponse::NotFound().json(serde_json::json!({
                    "error": format!("{kind} not found")
                }))
            }
            // Includes the remaining count so the client can retry with a
            // reduced quantity.
            DomainError::InsufficientStock { .. } | DomainError::NoInventory { .. } => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": domain.to_string()
                }))
            }
            DomainError::InvalidTransition { .. } | DomainError::Conflict(_) => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": domain.to_string()
                }))
            }
            DomainError::InvalidSignature => {
                HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized"
                }))
            }
            DomainError::Internal(_) => HttpResponse::InternalServerError().json(
                serde_json::json!({
                    "error": "Internal server error"
                }),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    use super::*;

    fn status_of(e: DomainError) -> StatusCode {
        AppError::Domain(e).error_response().status()
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status_of(DomainError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(
            status_of(DomainError::not_found("order", "1")),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn stock_shortfall_maps_to_409() {
        assert_eq!(
            status_of(DomainError::InsufficientStock {
                product_id: 1,
                requested: 2,
                available: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::NoInventory {
                store_id: 1,
                product_id: 1
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invalid_transition_maps_to_409() {
        assert_eq!(
            status_of(DomainError::InvalidTransition {
                from: "SHIPPED".into(),
                trigger: "CANCEL_BY_ADMIN".into()
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invalid_signature_maps_to_401_with_a_generic_body() {
        let resp = AppError::Domain(DomainError::InvalidSignature).error_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_errors_map_to_500() {
        assert_eq!(
            status_of(DomainError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("boom".into()).error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
