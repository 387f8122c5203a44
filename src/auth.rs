use std::sync::Arc;

use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::AuthConfig;
use crate::models::{Id, User};
use crate::repo::{RepoError, UserRepo};

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Deliberately opaque: callers never learn which check failed.
    #[error("unauthorized")]
    Unauthorized,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("data unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub typ: TokenKind,
    /// Display name, access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Claims {
    /// Numeric user id carried in `sub`.
    pub fn user_id(&self) -> Result<Id, AuthError> {
        self.sub.parse().map_err(|_| AuthError::Unauthorized)
    }
}

/// Identity embedded into a freshly issued pair.
#[derive(Debug, Clone)]
pub struct JwtUser {
    pub id: Id,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for JwtUser {
    fn from(u: &User) -> Self {
        Self { id: u.id, first_name: u.first_name.clone(), last_name: u.last_name.clone() }
    }
}

/// Access + refresh token. Only the access token is ever serialized; the
/// refresh token travels in the cookie.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPairs {
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
}

/// Issues and validates HS256 token pairs and builds the refresh cookie.
#[derive(Clone)]
pub struct TokenService {
    cfg: Arc<AuthConfig>,
}

impl TokenService {
    pub fn new(cfg: AuthConfig) -> Self {
        Self { cfg: Arc::new(cfg) }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.cfg
    }

    pub fn issue_pair(&self, user: &JwtUser) -> Result<TokenPairs, AuthError> {
        self.issue_pair_at(user, Utc::now())
    }

    /// Issue a pair as if the clock read `now`.
    pub fn issue_pair_at(
        &self,
        user: &JwtUser,
        now: DateTime<Utc>,
    ) -> Result<TokenPairs, AuthError> {
        let access = self.claims(user, now, self.cfg.token_expiry, TokenKind::Access);
        let refresh = self.claims(user, now, self.cfg.refresh_expiry, TokenKind::Refresh);
        Ok(TokenPairs { access_token: self.sign(&access)?, refresh_token: self.sign(&refresh)? })
    }

    fn claims(
        &self,
        user: &JwtUser,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
        typ: TokenKind,
    ) -> Claims {
        Claims {
            sub: user.id.to_string(),
            aud: self.cfg.audience.clone(),
            iss: self.cfg.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ,
            name: (typ == TokenKind::Access)
                .then(|| format!("{} {}", user.first_name, user.last_name)),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.cfg.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify signature, expiry, issuer, audience and token kind.
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[&self.cfg.issuer]);
        validation.set_audience(&[&self.cfg.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iss", "aud"]);

        let key = DecodingKey::from_secret(self.cfg.secret.as_bytes());
        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                    other => tracing::debug!(reason = ?other, "rejected token"),
                }
                AuthError::Unauthorized
            })?;
        if data.claims.typ != kind {
            tracing::debug!(expected = ?kind, got = ?data.claims.typ, "rejected token of wrong kind");
            return Err(AuthError::Unauthorized);
        }
        Ok(data.claims)
    }

    /// Exchange a refresh cookie value for a new pair and a rotated cookie.
    ///
    /// There is no revocation list: a superseded but unexpired refresh token
    /// keeps working until its own `exp`.
    pub async fn refresh<R>(
        &self,
        users: &R,
        cookie_value: &str,
    ) -> Result<(TokenPairs, Cookie<'static>), AuthError>
    where
        R: UserRepo + ?Sized,
    {
        let claims = self.validate(cookie_value, TokenKind::Refresh)?;
        let user = users.get_user_by_id(claims.user_id()?).await.map_err(|e| match e {
            RepoError::NotFound => AuthError::Unauthorized,
            RepoError::Unavailable(msg) => AuthError::Unavailable(msg),
        })?;
        let pair = self.issue_pair(&JwtUser::from(&user))?;
        let cookie = self.refresh_cookie(&pair.refresh_token);
        Ok((pair, cookie))
    }

    pub fn refresh_cookie(&self, refresh_token: &str) -> Cookie<'static> {
        self.cookie(refresh_token.to_owned())
            .max_age(CookieDuration::seconds(self.cfg.refresh_expiry.num_seconds()))
            .finish()
    }

    /// Same shape as the refresh cookie, emptied and already expired.
    pub fn expired_cookie(&self) -> Cookie<'static> {
        self.cookie(String::new())
            .max_age(CookieDuration::seconds(-1))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .finish()
    }

    fn cookie(&self, value: String) -> actix_web::cookie::CookieBuilder<'static> {
        Cookie::build(self.cfg.cookie_name.clone(), value)
            .path(self.cfg.cookie_path.clone())
            .domain(self.cfg.cookie_domain.clone())
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
    }
}
