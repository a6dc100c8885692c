use anyhow::{anyhow, bail, Context, Error};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub temporary: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
            temporary: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cinelist.db")
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_bcrypt_cost() -> u32 {
    DEFAULT_BCRYPT_COST
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, Error> {
        let parsed: Self = toml::from_str(contents)?;
        if parsed.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        Ok(parsed)
    }

    /// Reads `CINELIST_DB`, `JWT_SECRET`, `JWT_EXPIRES_IN`, `BCRYPT_COST`, `ADMIN_EMAIL`,
    /// `ADMIN_PASSWORD` and `ADMIN_NAME`. Only `JWT_SECRET` is required.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = var("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET is not set"))?;
        let token_ttl_secs = match var("JWT_EXPIRES_IN") {
            Some(ttl) => parse_ttl(&ttl)?,
            None => DEFAULT_TOKEN_TTL_SECS,
        };
        let bcrypt_cost = match var("BCRYPT_COST") {
            Some(cost) => cost
                .parse()
                .with_context(|| format!("invalid BCRYPT_COST {:?}", cost))?,
            None => DEFAULT_BCRYPT_COST,
        };
        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminConfig {
                email,
                password,
                name: var("ADMIN_NAME"),
            }),
            _ => None,
        };
        Ok(Config {
            database: DatabaseConfig {
                path: var("CINELIST_DB")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_db_path),
                temporary: false,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_secs,
                bcrypt_cost,
            },
            admin,
        })
    }

    pub fn open_database(&self) -> sled::Result<sled::Db> {
        sled::Config::new()
            .path(&self.database.path)
            .temporary(self.database.temporary)
            .open()
    }
}

/// Parses `3600`, `45s`, `30m`, `12h` or `7d` into seconds.
fn parse_ttl(value: &str) -> Result<u64, Error> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], c),
        _ => (value, 's'),
    };
    let amount: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {:?}", value))?;
    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        other => bail!("unknown duration unit {:?} in {:?}", other, value),
    };
    Ok(amount * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_minimal_config() -> Result<(), Error> {
        let loaded = Config::parse(
            r#"
            [auth]
            jwt_secret = "s3cret"
            "#,
        )?;
        let expected = Config {
            database: DatabaseConfig::default(),
            auth: AuthConfig {
                jwt_secret: "s3cret".to_owned(),
                token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
                bcrypt_cost: DEFAULT_BCRYPT_COST,
            },
            admin: None,
        };
        assert_eq!(expected, loaded);
        Ok(())
    }

    #[test]
    fn load_full_config() -> Result<(), Error> {
        let loaded = Config::parse(
            r#"
            [database]
            path = "/var/lib/cinelist"
            temporary = true

            [auth]
            jwt_secret = "s3cret"
            token_ttl_secs = 60
            bcrypt_cost = 4

            [admin]
            email = "admin@example.com"
            password = "admin123"
            name = "Administrator"
            "#,
        )?;
        assert_eq!(loaded.database.path, PathBuf::from("/var/lib/cinelist"));
        assert!(loaded.database.temporary);
        assert_eq!(loaded.auth.token_ttl_secs, 60);
        assert_eq!(loaded.auth.bcrypt_cost, 4);
        assert_eq!(
            loaded.admin.unwrap().name.as_deref(),
            Some("Administrator")
        );
        Ok(())
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(Config::parse("[auth]\njwt_secret = \"\"\n").is_err());
    }

    #[test]
    fn env_requires_secret() {
        assert!(Config::from_vars(|_| None).is_err());
    }

    #[test]
    fn env_overrides() -> Result<(), Error> {
        let vars: HashMap<&str, &str> = vec![
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRES_IN", "2h"),
            ("CINELIST_DB", "/tmp/movies"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "admin123"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_vars(|key| vars.get(key).map(|v| v.to_string()))?;
        assert_eq!(config.auth.token_ttl_secs, 2 * 60 * 60);
        assert_eq!(config.database.path, PathBuf::from("/tmp/movies"));
        assert_eq!(config.admin.unwrap().email, "admin@example.com");
        Ok(())
    }

    #[test]
    fn env_file_reaches_from_env() -> Result<(), Error> {
        let path = std::env::temp_dir().join(format!("cinelist-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "JWT_SECRET=from-dotenv\nJWT_EXPIRES_IN=15m\n",
        )?;
        let loaded = dotenv::from_path(&path);
        std::fs::remove_file(&path)?;
        loaded?;

        let config = Config::from_env()?;
        assert_eq!(config.auth.jwt_secret, "from-dotenv");
        assert_eq!(config.auth.token_ttl_secs, 15 * 60);
        Ok(())
    }

    #[test]
    fn ttl_forms() {
        assert_eq!(parse_ttl("3600").unwrap(), 3600);
        assert_eq!(parse_ttl("7d").unwrap(), 7 * 24 * 60 * 60);
        assert_eq!(parse_ttl("30m").unwrap(), 1800);
        assert!(parse_ttl("7w").is_err());
        assert!(parse_ttl("soon").is_err());
    }
}
