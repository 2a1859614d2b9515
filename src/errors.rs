use actix_web::HttpResponse;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    StockExhausted {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

// Infrastructure failures all surface as opaque 500s.

impl From<diesel::result::Error> for AppError {
    fn from(e: diesel::result::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = |msg: String| serde_json::json!({ "message": msg });
        match self {
            AppError::Validation(_) => HttpResponse::BadRequest().json(body(self.to_string())),
            AppError::NotFound(_) => HttpResponse::NotFound().json(body(self.to_string())),
            AppError::Forbidden(_) => HttpResponse::Forbidden().json(body(self.to_string())),
            AppError::StockExhausted { .. } => {
                HttpResponse::Conflict().json(body(self.to_string()))
            }
            AppError::Internal(_) => {
                HttpResponse::InternalServerError().json(body("Internal server error".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    #[test]
    fn validation_returns_400() {
        let resp = AppError::Validation("cart is empty".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound("Address").error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn forbidden_returns_403() {
        let resp = AppError::Forbidden("not your order".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn stock_exhausted_returns_409() {
        let err = AppError::StockExhausted {
            product_id: Uuid::new_v4(),
            requested: 3,
            available: 1,
        };
        assert_eq!(err.error_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_display() {
        assert_eq!(AppError::NotFound("Address").to_string(), "Address not found");
    }

    #[test]
    fn stock_exhausted_display_names_quantities() {
        let err = AppError::StockExhausted {
            product_id: Uuid::nil(),
            requested: 5,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 5"));
        assert!(msg.contains("available 2"));
    }
}
