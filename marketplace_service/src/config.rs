use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

/// Configuración completa del servicio, cargada del entorno.
/// Toda variable requerida ausente aborta el arranque.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: String,
    pub db_dsn: String,
    pub cache_dsn: String,
    pub jwt_secret: String,
    pub mailer: MailerConfig,
    pub cloudinary_url: String,
    pub razorpay_id: String,
    pub razorpay_secret: String,
    pub razorpay_webhook_secret: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: required("PORT")?,
            db_dsn: required("GOOSE_DBSTRING")?,
            cache_dsn: required("CACHE_DSN")?,
            jwt_secret: required("JWT_SECRET")?,
            mailer: MailerConfig {
                host: required("MAILER_HOST")?,
                port: required("MAILER_PORT")?
                    .parse()
                    .context("MAILER_PORT must be a port number")?,
                username: required("MAILER_USERNAME")?,
                password: required("MAILER_PASSWORD")?,
                sender: required("MAILER_SENDER")?,
            },
            cloudinary_url: required("CLOUDINARY_URL")?,
            razorpay_id: required("RAZORPAY_ID")?,
            razorpay_secret: required("RAZORPAY_SECRET")?,
            razorpay_webhook_secret: required("RAZORPAY_WEBHOOK_SECRET")?,
        })
    }
}

fn required(name: &'static str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}
