use serde::Deserialize;
use std::{env, error::Error, fs};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
    pub database_url: String,
    pub database_name: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendConfig {
    pub server_address: String,
    pub log_level: String,
    pub cors_origin: String,
    pub uploads_dir: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub frontend_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    pub backend: BackendConfig,
    pub email: EmailConfig,
    pub razorpay: RazorpayConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let contents = fs::read_to_string(config_path)?;
        let mut config: Config = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// Secrets never live in the committed YAML file; the environment wins
    /// over whatever placeholder the file carries.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(uri) = env::var("MONGODB_URI") {
            self.common.database_url = uri;
        }
        if let Ok(secret) = env::var("JWT_SECRET") {
            self.backend.jwt_secret = secret;
        }
        if let Ok(pass) = env::var("EMAIL_PASS") {
            self.email.password = pass;
        }
        if let Ok(key) = env::var("RAZORPAY_KEY_ID") {
            self.razorpay.key_id = key;
        }
        if let Ok(secret) = env::var("RAZORPAY_KEY_SECRET") {
            self.razorpay.key_secret = secret;
        }
    }
}
