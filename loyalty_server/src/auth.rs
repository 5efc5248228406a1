//! Cookie-based access tokens.
//!
//! On a successful registration or login the server mints an HS256 JWT and sets it as the `AccessToken` cookie.
//! Authenticated handlers simply take a [`JwtClaims`] argument; the extractor reads the cookie, validates the
//! signature and expiry, and rejects the request with 401 otherwise. The signing key is the deployment secret's
//! token-domain key, so the secret can never be recovered from it and the password hasher (which derives under
//! its own domain) does not share key material with the signer.

use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lgw_common::Secret;
use log::*;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

pub const ACCESS_TOKEN_COOKIE: &str = "AccessToken";

const TOKEN_KEY_DOMAIN: &str = "loyalty-gateway/access-token-key/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The authenticated user's id.
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &Secret, ttl: Duration) -> Self {
        let key = secret.derive_key(TOKEN_KEY_DOMAIN);
        Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            ttl,
        }
    }

    pub fn issue_token(&self, user_id: i64) -> Result<String, ServerError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServerError::BackendError(format!("Could not sign an access token: {e}")))
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, ServerError> {
        let validation = Validation::default();
        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("💻️ Access token rejected: {e}");
                ServerError::Unauthorized
            })
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match (req.cookie(ACCESS_TOKEN_COOKIE), req.app_data::<web::Data<TokenIssuer>>()) {
            (Some(cookie), Some(issuer)) => issuer.validate(cookie.value()),
            (None, _) => {
                trace!("💻️ Request without an {ACCESS_TOKEN_COOKIE} cookie");
                Err(ServerError::Unauthorized)
            },
            (_, None) => Err(ServerError::BackendError("Token issuer is not configured".to_string())),
        };
        Box::pin(async move { result })
    }
}
