//! Session verification for bearer tokens issued by the hosted auth provider.

use chrono::Utc;
use db::models::profile::{CreateProfile, Profile, Role};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session signing secret is not configured")]
    MissingSecret,
    #[error("missing session token")]
    MissingToken,
    #[error("session expired")]
    Expired,
    #[error("invalid session token: {0}")]
    InvalidToken(String),
    #[error("account is disabled")]
    Inactive,
    #[error("email {0} is linked to another account")]
    EmailInUse(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub aud: Option<String>,
}

impl SessionClaims {
    pub fn new(sub: Uuid, email: &str, ttl_secs: i64, audience: &str) -> Self {
        Self {
            sub,
            email: Some(email.to_string()),
            name: None,
            role: Some("authenticated".into()),
            exp: Utc::now().timestamp() + ttl_secs,
            aud: Some(audience.to_string()),
        }
    }
}

/// The profile behind a verified session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AuthUser {
    pub profile: Profile,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn can_write(&self) -> bool {
        self.profile.role.can_write()
    }

    pub fn is_admin(&self) -> bool {
        self.profile.role.is_admin()
    }
}

struct Keys {
    decoding: DecodingKey,
    encoding: EncodingKey,
}

#[derive(Clone)]
pub struct AuthService {
    keys: Option<std::sync::Arc<Keys>>,
    audience: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("configured", &self.keys.is_some())
            .field("audience", &self.audience)
            .finish()
    }
}

impl AuthService {
    /// Without a secret every token is rejected.
    pub fn new(secret: Option<&SecretString>, audience: impl Into<String>) -> Self {
        let keys = secret.map(|s| {
            let bytes = s.expose_secret().as_bytes();
            std::sync::Arc::new(Keys {
                decoding: DecodingKey::from_secret(bytes),
                encoding: EncodingKey::from_secret(bytes),
            })
        });
        Self {
            keys,
            audience: audience.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.leeway = 30;
        validation
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::MissingSecret)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        decode::<SessionClaims>(token, &keys.decoding, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    /// Signs claims with the configured secret; used by local tooling and tests.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::MissingSecret)?;
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Loads the profile for `claims`, provisioning a viewer profile on first sign-in.
    pub async fn resolve(
        &self,
        pool: &SqlitePool,
        claims: &SessionClaims,
    ) -> Result<AuthUser, AuthError> {
        let profile = match Profile::find_by_id(pool, claims.sub).await? {
            Some(profile) => profile,
            None => {
                let email = claims
                    .email
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| AuthError::InvalidToken("token has no email".into()))?;
                let full_name = claims
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());
                let data = CreateProfile {
                    email: email.to_string(),
                    full_name,
                    role: Some(Role::Viewer),
                    phone: None,
                };
                let profile = Profile::provision(pool, &data, claims.sub)
                    .await?
                    .ok_or_else(|| AuthError::EmailInUse(email.to_string()))?;
                info!(profile_id = %profile.id, role = %profile.role, "Provisioned profile on first sign-in");
                profile
            }
        };

        if !profile.active {
            return Err(AuthError::Inactive);
        }
        Ok(AuthUser { profile })
    }

    pub async fn authenticate(&self, pool: &SqlitePool, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.verify(token)?;
        self.resolve(pool, &claims).await
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    fn service() -> AuthService {
        AuthService::new(Some(&SecretString::from("test-secret")), "authenticated")
    }

    #[test]
    fn issued_tokens_verify() {
        let auth = service();
        let sub = Uuid::new_v4();
        let token = auth
            .issue(&SessionClaims::new(sub, "ana@obra.mx", 3600, "authenticated"))
            .unwrap();
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.email.as_deref(), Some("ana@obra.mx"));
    }

    #[test]
    fn rejects_expired_wrong_audience_and_wrong_secret() {
        let auth = service();
        let sub = Uuid::new_v4();

        let expired = auth
            .issue(&SessionClaims::new(sub, "a@obra.mx", -3600, "authenticated"))
            .unwrap();
        assert!(matches!(auth.verify(&expired), Err(AuthError::Expired)));

        let other_aud = auth
            .issue(&SessionClaims::new(sub, "a@obra.mx", 3600, "anon"))
            .unwrap();
        assert!(matches!(auth.verify(&other_aud), Err(AuthError::InvalidToken(_))));

        let foreign = AuthService::new(Some(&SecretString::from("another")), "authenticated")
            .issue(&SessionClaims::new(sub, "a@obra.mx", 3600, "authenticated"))
            .unwrap();
        assert!(matches!(auth.verify(&foreign), Err(AuthError::InvalidToken(_))));

        assert!(matches!(auth.verify("not-a-jwt"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(auth.verify(" "), Err(AuthError::MissingToken)));
    }

    #[test]
    fn unconfigured_service_rejects_everything() {
        let auth = AuthService::new(None, "authenticated");
        assert!(!auth.is_configured());
        assert!(matches!(auth.verify("x.y.z"), Err(AuthError::MissingSecret)));
    }

    #[tokio::test]
    async fn first_sign_in_provisions_profiles() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let auth = service();

        let first = SessionClaims::new(Uuid::new_v4(), "dueno@obra.mx", 3600, "authenticated");
        let owner = auth.resolve(&pool, &first).await.unwrap();
        assert_eq!(owner.role(), Role::Admin);
        assert_eq!(owner.profile.full_name, "dueno");

        let second = SessionClaims::new(Uuid::new_v4(), "residente@obra.mx", 3600, "authenticated");
        let viewer = auth.resolve(&pool, &second).await.unwrap();
        assert_eq!(viewer.role(), Role::Viewer);
        assert!(!viewer.can_write());

        let again = auth.resolve(&pool, &second).await.unwrap();
        assert_eq!(again.id(), viewer.id());
    }

    #[tokio::test]
    async fn concurrent_first_sign_ins_share_one_profile() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let auth = service();
        let claims = SessionClaims::new(Uuid::new_v4(), "doble@obra.mx", 3600, "authenticated");

        let (a, b) = tokio::join!(auth.resolve(&pool, &claims), auth.resolve(&pool, &claims));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.id(), claims.sub);
        assert_eq!(a.id(), b.id());
        assert_eq!(Profile::find_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_held_by_another_subject_is_reported() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let auth = service();
        let owner = SessionClaims::new(Uuid::new_v4(), "ana@obra.mx", 3600, "authenticated");
        auth.resolve(&pool, &owner).await.unwrap();

        let other = SessionClaims::new(Uuid::new_v4(), "ana@obra.mx", 3600, "authenticated");
        assert!(matches!(
            auth.resolve(&pool, &other).await,
            Err(AuthError::EmailInUse(_))
        ));
    }

    #[tokio::test]
    async fn inactive_profiles_are_rejected() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let auth = service();
        let claims = SessionClaims::new(Uuid::new_v4(), "baja@obra.mx", 3600, "authenticated");
        let user = auth.resolve(&pool, &claims).await.unwrap();
        Profile::set_active(&pool, user.id(), false).await.unwrap();

        let token = auth.issue(&claims).unwrap();
        assert!(matches!(
            auth.authenticate(&pool, &token).await,
            Err(AuthError::Inactive)
        ));
    }
}
