use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;
use crate::gateway::SshCredentials;

pub const CERT_LOCATION_HEADER: &str = "x-cert-location";
pub const SSH_USER_HEADER: &str = "x-ssh-user";
pub const SSH_PASSWORD_HEADER: &str = "x-ssh-password";

const MISSING_CREDENTIALS: &str = "Certificate location, SSH user, and SSH password are required";

/// Pulls SSH credentials out of the request headers. All three must be present
/// and non-empty; otherwise the request is rejected with 400 before any
/// session is opened.
#[async_trait]
impl<S> FromRequestParts<S> for SshCredentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| String::from_utf8(value.as_bytes().to_vec()).ok())
                .filter(|value| !value.is_empty())
        };

        match (
            header(CERT_LOCATION_HEADER),
            header(SSH_USER_HEADER),
            header(SSH_PASSWORD_HEADER),
        ) {
            (Some(cert_location), Some(ssh_user), Some(ssh_password)) => Ok(SshCredentials {
                cert_location,
                ssh_user,
                ssh_password,
            }),
            _ => Err(ApiError::bad_request(MISSING_CREDENTIALS)),
        }
    }
}
