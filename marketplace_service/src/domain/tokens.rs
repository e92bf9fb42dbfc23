use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::entities::TokenScope;
use crate::domain::error::{Error, ErrorKind};

pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const VERIFICATION_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Token opaco (refresh o verificación) con su material en claro.
///
/// El `plaintext` viaja al cliente exactamente una vez; el sistema solo
/// persiste el `hash` SHA-256.
#[derive(Debug, Clone)]
pub struct Token {
    pub plaintext: String,
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

/// Claims del access token firmado (JWT HS256). Nunca se persiste.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: i64,
    pub scope: TokenScope,
    pub iat: i64,
    pub exp: i64,
}

/// Hash SHA-256 del material en claro de un token opaco.
pub fn token_hash(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Genera un refresh token: 32 bytes aleatorios en base64-url, TTL 7 días.
pub fn generate_refresh_token(user_id: i64) -> Token {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let plaintext = URL_SAFE.encode(bytes);
    let hash = token_hash(&plaintext);

    Token {
        plaintext,
        hash,
        user_id,
        expiry: Utc::now() + REFRESH_TOKEN_TTL,
        scope: TokenScope::Refresh,
    }
}

/// Genera un token de verificación: decimal de 6 dígitos en
/// `[100000, 999999]`, con cero a la izquierda imposible por el rango.
pub fn generate_verification_token(user_id: i64) -> Token {
    let value: u32 = OsRng.gen_range(100_000..=999_999);
    let plaintext = format!("{value:06}");
    let hash = token_hash(&plaintext);

    Token {
        plaintext,
        hash,
        user_id,
        expiry: Utc::now() + VERIFICATION_TOKEN_TTL,
        scope: TokenScope::Activation,
    }
}

/// Valida la forma del token de verificación antes de tocar el cache.
pub fn validate_verification_token_format(plaintext: &str) -> Result<(), Error> {
    const OP: &str = "tokens.validate_verification";

    if plaintext.len() != 6 {
        return Err(Error::invalid(OP, "token must be 6 digits long"));
    }
    let value: u32 = plaintext
        .parse()
        .map_err(|_| Error::invalid(OP, "token must be a number"))?;
    if !(100_000..=999_999).contains(&value) {
        return Err(Error::invalid(OP, "token out of range"));
    }
    Ok(())
}

/// Firma un access token de corta vida con alcance `authentication`.
pub fn mint_access_token(user_id: i64, secret: &[u8]) -> Result<String, Error> {
    const OP: &str = "tokens.mint_access";

    let now = Utc::now();
    let claims = AccessTokenClaims {
        sub: user_id,
        scope: TokenScope::Authentication,
        iat: now.timestamp(),
        exp: (now + ACCESS_TOKEN_TTL).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| Error::internal(OP, e))
}

/// Verifica firma, expiración y alcance de un access token.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<AccessTokenClaims, Error> {
    const OP: &str = "tokens.verify_access";

    let data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map_err(|e| Error::new(ErrorKind::Unauthorized, OP, "invalid or expired access token").with_source(e))?;

    if data.claims.scope != TokenScope::Authentication {
        return Err(Error::unauthorized(OP, "token scope is not authentication"));
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-jwt-secret";

    #[test]
    fn test_refresh_token_material() {
        let token = generate_refresh_token(42);

        // 32 bytes en base64-url con padding: 44 caracteres
        assert_eq!(token.plaintext.len(), 44);
        assert_eq!(token.hash.len(), 32);
        assert_eq!(token.hash, token_hash(&token.plaintext));
        assert_eq!(token.scope, TokenScope::Refresh);
        assert!(token.expiry > Utc::now());
    }

    #[test]
    fn test_verification_token_is_six_digit_decimal() {
        for _ in 0..32 {
            let token = generate_verification_token(7);
            assert_eq!(token.plaintext.len(), 6);
            let value: u32 = token.plaintext.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
            assert!(validate_verification_token_format(&token.plaintext).is_ok());
        }
    }

    #[test]
    fn test_verification_token_format_rejections() {
        assert!(validate_verification_token_format("").is_err());
        assert!(validate_verification_token_format("12345").is_err());
        assert!(validate_verification_token_format("1234567").is_err());
        assert!(validate_verification_token_format("abcdef").is_err());
        assert!(validate_verification_token_format("099999").is_err());
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = mint_access_token(42, SECRET).unwrap();
        let claims = verify_access_token(&jwt, SECRET).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.scope, TokenScope::Authentication);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_access_token_wrong_secret_rejected() {
        let jwt = mint_access_token(42, SECRET).unwrap();
        let err = verify_access_token(&jwt, b"another-secret").unwrap_err();
        assert!(err.is_kind(ErrorKind::Unauthorized));
    }

    #[test]
    fn test_access_token_expired_rejected() {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: 42,
            scope: TokenScope::Authentication,
            iat: (now - Duration::from_secs(3600)).timestamp(),
            exp: (now - Duration::from_secs(1800)).timestamp(),
        };
        let jwt = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = verify_access_token(&jwt, SECRET).unwrap_err();
        assert!(err.is_kind(ErrorKind::Unauthorized));
    }

    #[test]
    fn test_access_token_wrong_scope_rejected() {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: 42,
            scope: TokenScope::Refresh,
            iat: now.timestamp(),
            exp: (now + ACCESS_TOKEN_TTL).timestamp(),
        };
        let jwt = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = verify_access_token(&jwt, SECRET).unwrap_err();
        assert!(err.is_kind(ErrorKind::Unauthorized));
    }
}
