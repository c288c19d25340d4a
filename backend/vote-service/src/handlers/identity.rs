/// Voter identity extraction from request headers
use crate::domain::models::Identity;
use crate::error::{VoteError, VoteResult};
use actix_web::http::header::HeaderMap;
use actix_web::{FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Identity of the caller; a signed-in user takes precedence over the session
#[derive(Debug, Clone)]
pub struct Voter(pub Identity);

impl Voter {
    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

pub fn identity_from_headers(headers: &HeaderMap) -> VoteResult<Identity> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(raw) = header(USER_ID_HEADER) {
        let user_id = Uuid::parse_str(raw).map_err(|_| {
            VoteError::InvalidArgument(format!("{} must be a UUID", USER_ID_HEADER))
        })?;
        return Ok(Identity::User(user_id));
    }

    if let Some(session_id) = header(SESSION_ID_HEADER) {
        return Ok(Identity::Session(session_id.to_string()));
    }

    Err(VoteError::InvalidArgument(format!(
        "missing {} or {} header",
        USER_ID_HEADER, SESSION_ID_HEADER
    )))
}

impl FromRequest for Voter {
    type Error = VoteError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(identity_from_headers(req.headers()).map(Voter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_user_header_wins_over_session() {
        let user = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, user.to_string()))
            .insert_header((SESSION_ID_HEADER, "abc"))
            .to_http_request();

        let identity = identity_from_headers(req.headers()).unwrap();
        assert_eq!(identity, Identity::User(user));
    }

    #[test]
    fn test_session_header() {
        let req = TestRequest::default()
            .insert_header((SESSION_ID_HEADER, "anon-42"))
            .to_http_request();

        let identity = identity_from_headers(req.headers()).unwrap();
        assert_eq!(identity, Identity::Session("anon-42".to_string()));
    }

    #[test]
    fn test_malformed_user_id_is_rejected() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();

        assert!(matches!(
            identity_from_headers(req.headers()),
            Err(VoteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let req = TestRequest::default()
            .insert_header((SESSION_ID_HEADER, "   "))
            .to_http_request();

        assert!(identity_from_headers(req.headers()).is_err());
    }
}
