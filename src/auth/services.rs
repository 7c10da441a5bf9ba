use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use sqlx::SqlitePool;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::applications::repo_types::Application;
use crate::applications::services::{normalize_application_id, normalize_email};
use crate::auth::dto::{
    AdminLoginRequest, AuthResponse, Claims, JwtKeys, Role, Session, StudentLoginRequest,
    TokenKind,
};
use crate::auth::repo::{is_token_revoked, purge_expired_revocations, revoke_token};
use crate::auth::repo_types::Admin;
use crate::config::{AdminSeed, JwtConfig};
use crate::error::AppError;
use crate::state::AppState;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(1) as u64) * 60),
        }
    }

    fn sign_with_kind(&self, subject: &str, role: Role, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: subject.to_string(),
            role,
            kind,
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%subject, ?role, ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, subject: &str, role: Role) -> anyhow::Result<String> {
        self.sign_with_kind(subject, role, TokenKind::Access)
    }

    pub fn sign_refresh(&self, subject: &str, role: Role) -> anyhow::Result<String> {
        self.sign_with_kind(subject, role, TokenKind::Refresh)
    }

    pub fn issue(&self, subject: &str, role: Role) -> anyhow::Result<AuthResponse> {
        Ok(AuthResponse {
            access_token: self.sign_access(subject, role)?,
            refresh_token: self.sign_refresh(subject, role)?,
            role,
            subject: subject.to_string(),
        })
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(sub = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

/// Checks an access token against role and revocation list.
pub async fn session_from_token(
    state: &AppState,
    token: &str,
    role: Role,
) -> Result<Session, AppError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::unauthorized("Invalid or expired token")
    })?;

    if claims.kind != TokenKind::Access {
        return Err(AppError::unauthorized("Access token required"));
    }
    if claims.role != role {
        warn!(sub = %claims.sub, ?role, "token presented to the wrong portal");
        return Err(AppError::unauthorized("Not permitted for this session"));
    }
    if is_token_revoked(&state.db, claims.jti).await? {
        return Err(AppError::unauthorized("Session has been logged out"));
    }

    Ok(Session {
        subject: claims.sub,
        token_id: claims.jti,
        expires_at: claims.exp as i64,
    })
}

pub async fn student_login(
    state: &AppState,
    req: StudentLoginRequest,
) -> Result<AuthResponse, AppError> {
    let application_id = normalize_application_id(&req.application_id);
    let email = normalize_email(&req.email);

    let Some(application) =
        Application::find_by_application_id_and_email(&state.db, &application_id, &email).await?
    else {
        warn!(%application_id, "student login rejected");
        return Err(AppError::unauthorized("Invalid Application ID or Email!"));
    };

    let response = JwtKeys::from_ref(state).issue(&application.application_id, Role::Student)?;
    info!(application_id = %application.application_id, "student logged in");
    Ok(response)
}

pub async fn admin_login(state: &AppState, req: AdminLoginRequest) -> Result<AuthResponse, AppError> {
    let username = req.username.trim();

    let Some(admin) = Admin::find_by_username(&state.db, username).await? else {
        warn!(%username, "admin login unknown username");
        return Err(AppError::unauthorized("Invalid credentials!"));
    };
    if !verify_password(&req.password, &admin.password_hash)? {
        warn!(%username, "admin login invalid password");
        return Err(AppError::unauthorized("Invalid credentials!"));
    }

    let response = JwtKeys::from_ref(state).issue(&admin.username, Role::Admin)?;
    info!(username = %admin.username, "admin logged in");
    Ok(response)
}

/// Swaps a valid refresh token for a new pair; the old refresh token is revoked.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::unauthorized(e.to_string()))?;
    if is_token_revoked(&state.db, claims.jti).await? {
        return Err(AppError::unauthorized("Session has been logged out"));
    }

    let exists = match claims.role {
        Role::Student => Application::find_by_application_id(&state.db, &claims.sub)
            .await?
            .is_some(),
        Role::Admin => Admin::find_by_username(&state.db, &claims.sub).await?.is_some(),
    };
    if !exists {
        return Err(AppError::unauthorized("Account not found"));
    }

    revoke_token(&state.db, claims.jti, claims.exp as i64).await?;
    Ok(keys.issue(&claims.sub, claims.role)?)
}

/// Ends a session: the presented access token and, when it belongs to the same
/// subject, the supplied refresh token stop working.
pub async fn logout(
    state: &AppState,
    session: &Session,
    role: Role,
    refresh_token: Option<&str>,
) -> Result<(), AppError> {
    revoke_token(&state.db, session.token_id, session.expires_at).await?;

    if let Some(token) = refresh_token {
        match JwtKeys::from_ref(state).verify_refresh(token) {
            Ok(claims) if claims.sub == session.subject && claims.role == role => {
                revoke_token(&state.db, claims.jti, claims.exp as i64).await?;
            }
            _ => warn!(subject = %session.subject, "ignoring unusable refresh token on logout"),
        }
    }

    let purged = purge_expired_revocations(&state.db, OffsetDateTime::now_utc().unix_timestamp()).await?;
    info!(subject = %session.subject, ?role, purged, "logged out");
    Ok(())
}

/// Creates the configured admin account on first start.
pub async fn seed_default_admin(db: &SqlitePool, seed: &AdminSeed) -> anyhow::Result<bool> {
    if Admin::find_by_username(db, &seed.username).await?.is_some() {
        return Ok(false);
    }
    let hash = hash_password(&seed.password)?;
    let created = Admin::create_if_missing(db, &seed.username, &hash).await?;
    if created {
        info!(username = %seed.username, "default admin created");
    }
    Ok(created)
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("admin123").expect("hashing should succeed");
        assert!(!verify_password("admin321", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;
    use crate::state::test_support::test_config;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&test_config().jwt)
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let token = keys.sign_access("ADM20251006001", Role::Student).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "ADM20251006001");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn verify_refresh_rejects_access_token() {
        let keys = make_keys();
        let token = keys.sign_access("admin", Role::Admin).expect("sign access");
        let err = keys.verify_refresh(&token).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[test]
    fn verify_rejects_wrong_issuer() {
        let good = make_keys();
        let mut cfg = test_config().jwt;
        cfg.issuer = "someone-else".into();
        let bad = JwtKeys::from_config(&cfg);

        let token = good.sign_access("admin", Role::Admin).expect("sign access");
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn every_token_gets_its_own_id() {
        let keys = make_keys();
        let a = keys.verify(&keys.sign_access("admin", Role::Admin).unwrap()).unwrap();
        let b = keys.verify(&keys.sign_access("admin", Role::Admin).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use crate::applications::dto::ApplicationForm;
    use crate::applications::services::submit_application;
    use crate::state::test_support::test_context;

    fn form() -> ApplicationForm {
        ApplicationForm {
            name: "Asha".into(),
            dob: "2005-04-01".into(),
            gender: "Female".into(),
            email: "a@x.com".into(),
            phone: "555".into(),
            address: "Road".into(),
            course: "Physics".into(),
            previous_education: "HS".into(),
        }
    }

    #[tokio::test]
    async fn seeded_admin_can_log_in_once_seeded() {
        let ctx = test_context().await;
        let seed = ctx.state.config.admin.clone();
        assert!(seed_default_admin(&ctx.state.db, &seed).await.unwrap());
        assert!(!seed_default_admin(&ctx.state.db, &seed).await.unwrap());

        let ok = admin_login(
            &ctx.state,
            AdminLoginRequest { username: "admin".into(), password: "admin123".into() },
        )
        .await
        .unwrap();
        assert_eq!(ok.role, Role::Admin);

        let bad = admin_login(
            &ctx.state,
            AdminLoginRequest { username: "admin".into(), password: "nope".into() },
        )
        .await
        .unwrap_err();
        assert!(matches!(bad, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn student_login_needs_matching_id_and_email() {
        let ctx = test_context().await;
        let receipt = submit_application(&ctx.state, form(), None).await.unwrap();

        let ok = student_login(
            &ctx.state,
            StudentLoginRequest {
                application_id: receipt.application_id.to_lowercase(),
                email: " A@X.COM ".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(ok.subject, receipt.application_id);

        let session = session_from_token(&ctx.state, &ok.access_token, Role::Student)
            .await
            .unwrap();
        assert_eq!(session.subject, receipt.application_id);

        assert!(matches!(
            session_from_token(&ctx.state, &ok.access_token, Role::Admin).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            session_from_token(&ctx.state, &ok.refresh_token, Role::Student).await,
            Err(AppError::Unauthorized(_))
        ));

        let wrong = student_login(
            &ctx.state,
            StudentLoginRequest {
                application_id: receipt.application_id.clone(),
                email: "b@x.com".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(wrong, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn logout_revokes_access_and_refresh_tokens() {
        let ctx = test_context().await;
        seed_default_admin(&ctx.state.db, &ctx.state.config.admin).await.unwrap();
        let tokens = admin_login(
            &ctx.state,
            AdminLoginRequest { username: "admin".into(), password: "admin123".into() },
        )
        .await
        .unwrap();

        let session = session_from_token(&ctx.state, &tokens.access_token, Role::Admin)
            .await
            .unwrap();
        logout(&ctx.state, &session, Role::Admin, Some(&tokens.refresh_token))
            .await
            .unwrap();

        assert!(session_from_token(&ctx.state, &tokens.access_token, Role::Admin)
            .await
            .is_err());
        assert!(refresh(&ctx.state, &tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn refresh_rotates_the_pair() {
        let ctx = test_context().await;
        seed_default_admin(&ctx.state.db, &ctx.state.config.admin).await.unwrap();
        let first = admin_login(
            &ctx.state,
            AdminLoginRequest { username: "admin".into(), password: "admin123".into() },
        )
        .await
        .unwrap();

        let second = refresh(&ctx.state, &first.refresh_token).await.unwrap();
        assert_eq!(second.subject, "admin");
        assert!(session_from_token(&ctx.state, &second.access_token, Role::Admin)
            .await
            .is_ok());
        assert!(refresh(&ctx.state, &first.refresh_token).await.is_err());
        assert!(refresh(&ctx.state, &first.access_token).await.is_err());
    }
}
