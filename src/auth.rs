use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use uuid::Uuid;

use crate::errors::AppError;

/// Authentication lives in an upstream issuer; by the time a request reaches
/// this service the gateway has already verified the session and asserts the
/// caller's identity through these headers.
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin-gated endpoints call this before touching any state.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

fn identity_from_request(req: &HttpRequest) -> Result<Identity, AppError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| AppError::Forbidden("Missing or invalid caller identity".to_string()))?;

    let role = match req
        .headers()
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some("admin") => Role::Admin,
        _ => Role::Customer,
    };

    Ok(Identity { user_id, role })
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(identity_from_request(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn extracts_customer_identity() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();

        let identity = identity_from_request(&req).expect("identity");
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.role, Role::Customer);
        assert!(identity.require_admin().is_err());
    }

    #[test]
    fn extracts_admin_role() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
            .insert_header((USER_ROLE_HEADER, "admin"))
            .to_http_request();

        let identity = identity_from_request(&req).expect("identity");
        assert!(identity.is_admin());
        assert!(identity.require_admin().is_ok());
    }

    #[test]
    fn unknown_role_defaults_to_customer() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, Uuid::new_v4().to_string()))
            .insert_header((USER_ROLE_HEADER, "superuser"))
            .to_http_request();

        assert_eq!(identity_from_request(&req).expect("identity").role, Role::Customer);
    }

    #[test]
    fn missing_user_id_is_forbidden() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            identity_from_request(&req),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn malformed_user_id_is_forbidden() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(matches!(
            identity_from_request(&req),
            Err(AppError::Forbidden(_))
        ));
    }
}
