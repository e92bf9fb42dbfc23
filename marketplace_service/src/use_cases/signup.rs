use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::domain::entities::User;
use crate::domain::error::{Error, ErrorKind};
use crate::domain::gateways::{Cache, MailJob};
use crate::domain::passwords;
use crate::domain::tokens::{self, VERIFICATION_TOKEN_TTL};
use crate::infrastructure::persistence::{user_store, wallet_store};

pub const WELCOME_TEMPLATE: &str = "user_welcome.tmpl";

#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

/// Alta de usuario: usuario + billetera nacen en la misma transacción de
/// base de datos. El correo de verificación se encola DESPUÉS del commit,
/// best-effort: su fallo se loguea y nunca deshace el alta.
#[derive(Clone)]
pub struct SignupUseCase {
    pool: PgPool,
    cache: Arc<dyn Cache>,
}

impl SignupUseCase {
    pub fn new(pool: PgPool, cache: Arc<dyn Cache>) -> Self {
        Self { pool, cache }
    }

    #[tracing::instrument(name = "SignupUseCase::execute", skip_all, fields(email = %input.email))]
    pub async fn execute(&self, input: SignupInput) -> Result<User, Error> {
        const OP: &str = "users.signup";

        validate_signup(&input)?;

        let password_hash = passwords::hash_password(&input.password)?;

        let mut tx = self.pool.begin().await.map_err(|e| Error::internal(OP, e))?;
        let user =
            user_store::create_user(&mut tx, &input.name, &input.email, &password_hash).await?;
        wallet_store::create_wallet(&mut tx, user.id).await?;
        tx.commit().await.map_err(|e| Error::internal(OP, e))?;

        info!(user_id = user.id, "user and wallet created");

        if let Err(e) = self.enqueue_verification_email(&user).await {
            warn!(user_id = user.id, error = %e, "failed to enqueue verification email");
        }

        Ok(user)
    }

    /// Código de verificación en cache + job en la cola de correos. Una
    /// colisión del hash se reintenta una vez con un código fresco.
    async fn enqueue_verification_email(&self, user: &User) -> Result<(), Error> {
        const OP: &str = "users.enqueue_verification_email";

        let mut attempts = 0;
        let token = loop {
            attempts += 1;
            let token = tokens::generate_verification_token(user.id);
            let hash_hex = hex::encode(&token.hash);

            match self
                .cache
                .set_verification_token(&hash_hex, user.id, VERIFICATION_TOKEN_TTL)
                .await
            {
                Ok(()) => break token,
                Err(e) if e.is_kind(ErrorKind::Collision) && attempts < 2 => {
                    warn!(user_id = user.id, "verification token collision, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        let job = MailJob {
            recipient: user.email.clone(),
            template_file: WELCOME_TEMPLATE.to_string(),
            template_data: json!({
                "name": user.name,
                "verification_token": token.plaintext,
            }),
        };
        let payload = serde_json::to_string(&job).map_err(|e| Error::internal(OP, e))?;
        self.cache.enqueue_email(payload).await
    }
}

/// Validación de entrada con mensajes por campo, al estilo del resto de los
/// chequeos de dominio: sin dependencias, reglas explícitas.
fn validate_signup(input: &SignupInput) -> Result<(), Error> {
    const OP: &str = "users.validate_signup";

    let mut problems = Vec::new();

    if input.name.trim().is_empty() {
        problems.push("name: must be provided");
    }
    if !is_plausible_email(&input.email) {
        problems.push("email: invalid email format");
    }
    if input.password.len() < 8 {
        problems.push("password: must be at least 8 bytes");
    }
    if input.password.len() > 50 {
        problems.push("password: must be at most 50 bytes");
    }
    if !is_plausible_phone(&input.phone) {
        problems.push("phone: add a valid phone number");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid(OP, problems.join("; ")))
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn is_plausible_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    !digits.is_empty() && digits.len() >= 8 && digits.len() <= 15
        && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SignupInput {
        SignupInput {
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            password: "s3cret-password".to_string(),
            phone: "+919876543210".to_string(),
        }
    }

    #[test]
    fn test_valid_signup_passes() {
        assert!(validate_signup(&input()).is_ok());
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut bad = input();
        bad.name = "   ".to_string();
        let err = validate_signup(&bad).unwrap_err();
        assert!(err.message.contains("name"));
    }

    #[test]
    fn test_rejects_malformed_emails() {
        for email in ["", "no-at-sign", "@missing.local", "user@", "user@nodot", "a b@x.com"] {
            let mut bad = input();
            bad.email = email.to_string();
            assert!(validate_signup(&bad).is_err(), "accepted: {email}");
        }
    }

    #[test]
    fn test_rejects_short_and_long_passwords() {
        let mut bad = input();
        bad.password = "short".to_string();
        assert!(validate_signup(&bad).is_err());

        bad.password = "x".repeat(51);
        assert!(validate_signup(&bad).is_err());
    }

    #[test]
    fn test_rejects_bad_phones() {
        for phone in ["", "12345", "not-a-phone", "+12 34 56"] {
            let mut bad = input();
            bad.phone = phone.to_string();
            assert!(validate_signup(&bad).is_err(), "accepted: {phone}");
        }
    }

    #[test]
    fn test_collects_multiple_field_errors() {
        let bad = SignupInput {
            name: String::new(),
            email: "bad".to_string(),
            password: "x".to_string(),
            phone: String::new(),
        };
        let err = validate_signup(&bad).unwrap_err();

        assert!(err.message.contains("name"));
        assert!(err.message.contains("email"));
        assert!(err.message.contains("password"));
        assert!(err.message.contains("phone"));
    }
}
