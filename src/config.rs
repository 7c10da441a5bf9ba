use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket used instead of the local upload directory.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub logo_path: PathBuf,
}

/// Account created at startup when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub uploads: UploadConfig,
    pub smtp: Option<SmtpConfig>,
    pub admin: AdminSeed,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = var("DATABASE_URL", "sqlite://admission_system.db");

        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: var("JWT_ISSUER", "admissions"),
            audience: var("JWT_AUDIENCE", "admissions-portal"),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: parse_or(&lookup, "JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };

        let s3 = match (
            lookup("S3_ENDPOINT"),
            lookup("S3_BUCKET"),
            lookup("S3_ACCESS_KEY"),
            lookup("S3_SECRET_KEY"),
        ) {
            (Some(endpoint), Some(bucket), Some(access_key), Some(secret_key)) => Some(S3Config {
                endpoint,
                bucket,
                access_key,
                secret_key,
                region: var("S3_REGION", "us-east-1"),
            }),
            _ => None,
        };

        let uploads = UploadConfig {
            dir: PathBuf::from(var("UPLOAD_DIR", "uploads")),
            max_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            s3,
        };

        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 587)?,
                username: var("SMTP_USERNAME", ""),
                password: var("SMTP_PASSWORD", ""),
                from: lookup("SMTP_FROM")
                    .or_else(|| lookup("SMTP_USERNAME"))
                    .context("SMTP_FROM or SMTP_USERNAME must be set when SMTP_HOST is")?,
                logo_path: PathBuf::from(var("EMAIL_LOGO_PATH", "static/logo.png")),
            }),
            None => None,
        };

        let admin = AdminSeed {
            username: var("ADMIN_USERNAME", "admin"),
            password: var("ADMIN_PASSWORD", "admin123"),
        };

        Ok(Self {
            database_url,
            jwt,
            uploads,
            smtp,
            admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(cfg.database_url, "sqlite://admission_system.db");
        assert_eq!(cfg.jwt.issuer, "admissions");
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert_eq!(cfg.uploads.dir, PathBuf::from("uploads"));
        assert_eq!(cfg.uploads.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(cfg.uploads.s3.is_none());
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.admin.username, "admin");
        assert_eq!(cfg.admin.password, "admin123");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn unparseable_number_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "x"),
            ("MAX_UPLOAD_BYTES", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn smtp_and_s3_are_enabled_by_their_keys() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "x"),
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_USERNAME", "admissions@example.org"),
            ("SMTP_PORT", "2525"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("S3_BUCKET", "documents"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
        ]))
        .unwrap();

        let smtp = cfg.smtp.expect("smtp configured");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.from, "admissions@example.org");

        let s3 = cfg.uploads.s3.expect("s3 configured");
        assert_eq!(s3.bucket, "documents");
        assert_eq!(s3.region, "us-east-1");
    }
}
