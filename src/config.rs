use anyhow::Context;

/// Longest accepted session lifetime (ten years).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Attributes of the `jwt` session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

/// Administrator inserted at startup when the email is still free.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub admin_seed: Option<AdminSeed>,
}

fn parse_ttl_minutes(raw: Option<String>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(60 * 24 * 30);
    };
    let minutes: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("JWT_TTL_MINUTES is not a number: {raw}"))?;
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
    );
    Ok(minutes)
}

/// Both email and password must be given, or neither.
fn admin_seed_from(
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
) -> anyhow::Result<Option<AdminSeed>> {
    match (email, password) {
        (Some(email), Some(password)) => Ok(Some(AdminSeed {
            name: name.unwrap_or_else(|| "Admin".into()),
            email,
            password,
        })),
        (None, None) => Ok(None),
        _ => anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together"),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "storefront-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok())?,
        };
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "production".into());
        let cookie = CookieConfig {
            name: "jwt".into(),
            path: std::env::var("COOKIE_PATH").unwrap_or_else(|_| "/api".into()),
            secure: app_env != "development",
        };
        let admin_seed = admin_seed_from(
            std::env::var("ADMIN_EMAIL").ok(),
            std::env::var("ADMIN_PASSWORD").ok(),
            std::env::var("ADMIN_NAME").ok(),
        )?;
        Ok(Self {
            database_url,
            jwt,
            cookie,
            admin_seed,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            cookie: CookieConfig {
                name: "jwt".into(),
                path: "/api".into(),
                secure: false,
            },
            admin_seed: None,
        }
    }
}
