use std::{
    collections::BTreeSet,
    time::{SystemTime, UNIX_EPOCH},
};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use readiq_backend::{
    models::Role,
    token::{TokenError, TokenService},
};
use serde_json::{Value, json};
use uuid::Uuid;

const SECRET: &str = "token-test-secret";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn sign(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Decodes the payload without interpreting it, to inspect the raw claim set.
fn raw_claims(token: &str) -> Value {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    decode::<Value>(token, &DecodingKey::from_secret(SECRET.as_bytes()), &validation)
        .unwrap()
        .claims
}

#[test]
fn test_round_trip_yields_exactly_identity_claims() {
    let tokens = TokenService::new(SECRET, None);
    let id = Uuid::new_v4();

    let token = tokens.issue("alice@x.com", Role::Student, id).unwrap();
    let claims = tokens.verify(&token).unwrap();

    assert_eq!(claims.sub, "alice@x.com");
    assert_eq!(claims.role, Role::Student);
    assert_eq!(claims.id, id);
    assert_eq!(claims.exp, None);

    let raw = raw_claims(&token);
    let keys: BTreeSet<&str> = raw.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, BTreeSet::from(["id", "role", "sub"]));
    assert_eq!(raw["role"], "student");
}

#[test]
fn test_expiring_tokens_carry_exp() {
    let tokens = TokenService::new(SECRET, Some(3600));
    assert!(tokens.expires());

    let token = tokens.issue("a@x.com", Role::Admin, Uuid::new_v4()).unwrap();
    let claims = tokens.verify(&token).unwrap();

    let exp = claims.exp.unwrap();
    assert!(exp > now() && exp <= now() + 3600);
}

#[test]
fn test_wrong_secret_is_invalid_signature() {
    let token = TokenService::new("other-secret", None)
        .issue("a@x.com", Role::Admin, Uuid::new_v4())
        .unwrap();

    let err = TokenService::new(SECRET, None).verify(&token).unwrap_err();
    assert_eq!(err, TokenError::InvalidSignature);
}

#[test]
fn test_missing_role_is_malformed_claims() {
    let token = sign(&json!({ "sub": "a@x.com", "id": Uuid::new_v4() }));

    let err = TokenService::new(SECRET, None).verify(&token).unwrap_err();
    assert_eq!(err, TokenError::MalformedClaims);
}

#[test]
fn test_unknown_role_is_malformed_claims() {
    let token = sign(&json!({ "sub": "a@x.com", "role": "root", "id": Uuid::new_v4() }));

    let err = TokenService::new(SECRET, None).verify(&token).unwrap_err();
    assert_eq!(err, TokenError::MalformedClaims);
}

#[test]
fn test_expired_token_is_rejected() {
    let token = sign(&json!({
        "sub": "a@x.com",
        "role": "student",
        "id": Uuid::new_v4(),
        "exp": now() - 3600,
    }));

    // Checked whenever present, even when the service does not issue expiring tokens.
    let err = TokenService::new(SECRET, None).verify(&token).unwrap_err();
    assert_eq!(err, TokenError::Expired);
}

#[test]
fn test_exp_is_required_once_a_lifetime_is_configured() {
    let legacy = TokenService::new(SECRET, None)
        .issue("a@x.com", Role::Student, Uuid::new_v4())
        .unwrap();

    let err = TokenService::new(SECRET, Some(60)).verify(&legacy).unwrap_err();
    assert_eq!(err, TokenError::MalformedClaims);
}

#[test]
fn test_garbage_is_malformed() {
    let err = TokenService::new(SECRET, None)
        .verify("definitely.not.ajwt")
        .unwrap_err();
    assert_eq!(err, TokenError::Malformed);
}

#[test]
fn test_email_token_round_trip() {
    let tokens = TokenService::new(SECRET, None);
    let token = tokens.issue_email_token("bob@x.com").unwrap();

    assert_eq!(tokens.verify_email_token(&token).unwrap(), "bob@x.com");
    assert_eq!(raw_claims(&token)["purpose"], "verify_email");
}

#[test]
fn test_email_and_access_tokens_are_not_interchangeable() {
    let tokens = TokenService::new(SECRET, None);

    let access = tokens.issue("a@x.com", Role::Student, Uuid::new_v4()).unwrap();
    assert!(tokens.verify_email_token(&access).is_err());

    let email = tokens.issue_email_token("a@x.com").unwrap();
    assert_eq!(tokens.verify(&email).unwrap_err(), TokenError::MalformedClaims);

    let wrong_purpose = sign(&json!({ "sub": "a@x.com", "purpose": "reset_password" }));
    assert_eq!(
        tokens.verify_email_token(&wrong_purpose).unwrap_err(),
        TokenError::MalformedClaims
    );
}
