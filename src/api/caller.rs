//! Acting-user extractor.
//!
//! Authentication happens upstream; the gateway trusts the `x-user-id`
//! header set by the edge proxy.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::MeetupError;

/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = MeetupError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| MeetupError::InvalidRequest(format!("missing {USER_ID_HEADER} header")))?;
        let id = value
            .to_str()
            .map_err(|_| MeetupError::InvalidRequest(format!("{USER_ID_HEADER} is not valid text")))?
            .trim();
        if id.is_empty() {
            return Err(MeetupError::InvalidRequest(format!(
                "{USER_ID_HEADER} must not be empty"
            )));
        }
        Ok(Self(UserId::new(id)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<Caller, MeetupError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let Ok(request) = builder.body(()) else {
            panic!("request build failed");
        };
        let (mut parts, ()) = request.into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_trimmed_user_id() {
        let Ok(Caller(user)) = extract(Some(" uidA ")).await else {
            panic!("expected caller");
        };
        assert_eq!(user.as_str(), "uidA");
    }

    #[tokio::test]
    async fn missing_or_blank_header_is_rejected() {
        assert!(matches!(extract(None).await, Err(MeetupError::InvalidRequest(_))));
        assert!(matches!(extract(Some("  ")).await, Err(MeetupError::InvalidRequest(_))));
    }
}
