use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{
    ActionClaims, JwtClaims, JwtHeader, User, TOKEN_USE_ACCESS, TOKEN_USE_ACTION,
};

type HmacSha256 = Hmac<Sha256>;

fn sign(signing_input: &str, jwt_secret: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

fn encode<C: Serialize>(claims: &C, jwt_secret: &str) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let header_json = serde_json::to_string(&header).map_err(|e| e.to_string())?;
    let claims_json = serde_json::to_string(claims).map_err(|e| e.to_string())?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(&signing_input, jwt_secret)?;

    Ok(format!("{}.{}", signing_input, signature))
}

fn decode<C: DeserializeOwned>(token: &str, jwt_secret: &str) -> Result<C, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signature_string = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signature_string.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| "Invalid claims encoding".to_string())?;

    serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })
}

fn check_expiry(exp: u64) -> Result<(), String> {
    let now = Utc::now().timestamp() as u64;
    if exp < now {
        debug!("Token expired at {} (now: {})", exp, now);
        return Err("Token expired".to_string());
    }
    Ok(())
}

/// Issues an access token for a signed-in account.
pub fn issue_token(
    user_id: &str,
    email: &str,
    role: &str,
    jwt_secret: &str,
    lifetime_hours: i64,
) -> Result<String, String> {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        token_use: TOKEN_USE_ACCESS.to_string(),
        exp: (now + Duration::hours(lifetime_hours)).timestamp() as u64,
        email: Some(email.to_string()),
        role: Some(role.to_string()),
        iat: Some(now.timestamp() as u64),
    };

    encode(&claims, jwt_secret)
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    let claims: JwtClaims = decode(token, jwt_secret)?;

    if claims.token_use != TOKEN_USE_ACCESS {
        debug!("Rejected {} token presented as access token", claims.token_use);
        return Err("Token is not an access token".to_string());
    }
    check_expiry(claims.exp)?;

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

/// Signs a one-purpose token embedded in email links (accept/reject a booking).
pub fn issue_action_token(
    user_id: &str,
    action: &str,
    booking_id: &str,
    jwt_secret: &str,
    lifetime_hours: i64,
) -> Result<String, String> {
    let claims = ActionClaims {
        sub: user_id.to_string(),
        token_use: TOKEN_USE_ACTION.to_string(),
        action: action.to_string(),
        booking_id: booking_id.to_string(),
        exp: (Utc::now() + Duration::hours(lifetime_hours)).timestamp() as u64,
    };

    encode(&claims, jwt_secret)
}

pub fn validate_action_token(token: &str, expected_action: &str, jwt_secret: &str) -> Result<ActionClaims, String> {
    let claims: ActionClaims = decode(token, jwt_secret)?;
    if claims.token_use != TOKEN_USE_ACTION {
        return Err("Token is not an action token".to_string());
    }
    check_expiry(claims.exp)?;

    if claims.action != expected_action {
        return Err("Token is not valid for this action".to_string());
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn issued_token_validates() {
        let token = issue_token("user-1", "a@b.com", "patient", SECRET, 48).unwrap();
        let user = validate_token(&token, SECRET).unwrap();

        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert!(user.is_patient());
        assert!(user.created_at.is_some());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = issue_token("user-1", "a@b.com", "patient", SECRET, 48).unwrap();
        assert_eq!(validate_token(&token, "other").unwrap_err(), "Invalid token signature");
    }

    #[test]
    fn rejects_expired() {
        let token = issue_token("user-1", "a@b.com", "patient", SECRET, -1).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Token expired");
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(issue_token("user-1", "a@b.com", "patient", "", 1).is_err());
        assert!(validate_token("a.b.c", "").is_err());
    }

    #[test]
    fn action_token_is_bound_to_action() {
        let token = issue_action_token("provider-1", "accept", "booking-9", SECRET, 72).unwrap();

        let claims = validate_action_token(&token, "accept", SECRET).unwrap();
        assert_eq!(claims.booking_id, "booking-9");
        assert_eq!(claims.sub, "provider-1");

        assert!(validate_action_token(&token, "reject", SECRET).is_err());
    }

    #[test]
    fn access_token_is_not_an_action_token() {
        let token = issue_token("user-1", "a@b.com", "patient", SECRET, 1).unwrap();
        assert_eq!(
            validate_action_token(&token, "accept", SECRET).unwrap_err(),
            "Invalid claims format"
        );
    }

    #[test]
    fn action_token_cannot_open_a_session() {
        let token = issue_action_token("provider-1", "accept", "booking-9", SECRET, 48).unwrap();
        assert_eq!(
            validate_token(&token, SECRET).unwrap_err(),
            "Token is not an access token"
        );
    }

    #[test]
    fn token_without_use_claim_is_refused() {
        let claims = serde_json::json!({
            "sub": "user-1",
            "email": "a@b.com",
            "role": "patient",
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        });
        let token = encode(&claims, SECRET).unwrap();

        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Invalid claims format");
    }
}
