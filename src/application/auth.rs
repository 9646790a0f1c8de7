//! Session tokens and identity resolution.
//!
//! Tokens look like `cs_<prefix>_<secret>`. Only the SHA-256 of the secret is
//! stored; the prefix is the lookup key.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::application::page::AuthSnapshot;
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::{SessionRecord, UserProfile, UserRecord};
use crate::domain::error::DomainError;

const TOKEN_TAG: &str = "cs";
const MIN_SECRET_LEN: usize = 32;
const MAX_USERNAME_LEN: usize = 32;
const USERNAME_FIELD: &str = "username";
const IMAGE_URL_FIELD: &str = "profile_image_url";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid session token")]
    Invalid,
    #[error("session expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub session: SessionRecord,
    pub user: UserProfile,
    pub token: String,
}

#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    resolve_timeout: Duration,
    default_ttl_hours: u32,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        resolve_timeout: Duration,
        default_ttl_hours: u32,
    ) -> Self {
        Self {
            users,
            sessions,
            resolve_timeout,
            default_ttl_hours,
        }
    }

    pub async fn create_user(
        &self,
        username: &str,
        profile_image_url: &str,
    ) -> Result<UserRecord, IdentityError> {
        let username = validate_username(username)?;
        let image = Url::parse(profile_image_url)
            .map_err(|err| DomainError::field(IMAGE_URL_FIELD, err.to_string()))?;
        if !matches!(image.scheme(), "http" | "https") {
            return Err(DomainError::field(
                IMAGE_URL_FIELD,
                format!("unsupported scheme `{}`", image.scheme()),
            )
            .into());
        }

        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                profile_image_url: image.to_string(),
            })
            .await?;
        Ok(user)
    }

    /// Issue a session for `username`; `ttl_hours = 0` never expires.
    pub async fn issue_session(
        &self,
        username: &str,
        ttl_hours: Option<u32>,
    ) -> Result<SessionIssued, IdentityError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(DomainError::not_found("user"))?;

        let ttl_hours = ttl_hours.unwrap_or(self.default_ttl_hours);
        let expires_at = (ttl_hours > 0)
            .then(|| OffsetDateTime::now_utc() + time::Duration::hours(i64::from(ttl_hours)));

        let prefix = generate_prefix();
        let secret = generate_secret();
        let session = self
            .sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix: prefix.clone(),
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(SessionIssued {
            session,
            user: user.profile(),
            token: format!("{TOKEN_TAG}_{prefix}_{secret}"),
        })
    }

    pub async fn authenticate(&self, token: &str) -> Result<UserProfile, IdentityError> {
        let parsed = parse_token(token).ok_or(IdentityError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(parsed.prefix)
            .await?
            .ok_or(IdentityError::Invalid)?;

        let now = OffsetDateTime::now_utc();
        if let Some(revoked_at) = session.revoked_at
            && revoked_at <= now
        {
            return Err(IdentityError::Revoked);
        }
        if let Some(expires_at) = session.expires_at
            && expires_at <= now
        {
            return Err(IdentityError::Expired);
        }

        let hashed_input = hash_secret(parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(IdentityError::Invalid);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(IdentityError::Invalid)?;
        Ok(user.profile())
    }

    /// Revoke the session behind `token`. The secret must match; revoking an
    /// already revoked session is a no-op.
    pub async fn revoke(&self, token: &str) -> Result<SessionRecord, IdentityError> {
        let parsed = parse_token(token).ok_or(IdentityError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(parsed.prefix)
            .await?
            .ok_or(IdentityError::Invalid)?;
        if session.hashed_secret.ct_eq(&hash_secret(parsed.secret)).unwrap_u8() == 0 {
            return Err(IdentityError::Invalid);
        }
        if session.revoked_at.is_some() {
            return Ok(session);
        }

        let revoked_at = OffsetDateTime::now_utc();
        self.sessions.revoke_session(session.id, revoked_at).await?;
        Ok(SessionRecord {
            revoked_at: Some(revoked_at),
            ..session
        })
    }

    /// Resolve `token` within the configured timeout. Bad credentials read as
    /// signed out; a failed or slow lookup leaves the snapshot unloaded.
    pub async fn snapshot(&self, token: Option<&str>) -> AuthSnapshot {
        let Some(token) = token else {
            return AuthSnapshot::signed_out();
        };

        match tokio::time::timeout(self.resolve_timeout, self.authenticate(token)).await {
            Ok(Ok(user)) => AuthSnapshot::signed_in(user),
            Ok(Err(IdentityError::Repo(err))) => {
                warn!(target = "chirp::auth", error = %err, "identity lookup failed");
                AuthSnapshot::pending(true)
            }
            Ok(Err(err)) => {
                debug!(target = "chirp::auth", error = %err, "session rejected");
                AuthSnapshot::signed_out()
            }
            Err(_) => {
                warn!(
                    target = "chirp::auth",
                    timeout_ms = self.resolve_timeout.as_millis() as u64,
                    "identity lookup timed out"
                );
                AuthSnapshot::pending(true)
            }
        }
    }

    /// User id for procedure calls; any failure means anonymous.
    pub async fn user_id(&self, token: Option<&str>) -> Option<Uuid> {
        self.snapshot(token).await.user.map(|user| user.id)
    }
}

struct ParsedToken<'a> {
    prefix: &'a str,
    secret: &'a str,
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.trim().splitn(3, '_');
    if parts.next()? != TOKEN_TAG {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken { prefix, secret })
}

fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::field(USERNAME_FIELD, "must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::field(
            USERNAME_FIELD,
            format!("at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(DomainError::field(
            USERNAME_FIELD,
            "only letters, digits, `_` and `-` are allowed",
        ));
    }
    Ok(username.to_string())
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
