//! Shared-secret authentication for the write path.

use async_trait::async_trait;
use axum::response::IntoResponse;
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;
use crate::http::pipeline::{Flow, RequestContext, Stage};
use crate::http::response::ApiError;

/// Compares a request header against the one configured secret.
pub struct KeyAuthenticator {
    header_name: String,
    secret_digest: [u8; 32],
}

impl KeyAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            header_name: config.header_name.to_ascii_lowercase(),
            secret_digest: digest(config.api_key.as_bytes()),
        }
    }

    /// True only for an exact, full-length match.
    pub fn verify(&self, presented: Option<&[u8]>) -> bool {
        match presented {
            Some(key) if !key.is_empty() => {
                // Comparing fixed-size digests keeps the loop length independent
                // of the presented key.
                let presented = digest(key);
                let diff = presented
                    .iter()
                    .zip(self.secret_digest.iter())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b));
                diff == 0
            }
            _ => false,
        }
    }
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

#[async_trait]
impl Stage for KeyAuthenticator {
    fn name(&self) -> &'static str {
        "key_auth"
    }

    async fn process(&self, ctx: &mut RequestContext) -> Flow {
        let presented = ctx.headers.get(&self.header_name).map(|v| v.as_bytes());
        if self.verify(presented) {
            Flow::Continue
        } else {
            tracing::warn!(
                peer = ?ctx.peer,
                present = presented.is_some(),
                "Rejected API key"
            );
            Flow::Respond(ApiError::Forbidden.into_response())
        }
    }
}
