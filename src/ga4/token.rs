use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::ExposeSecret;

use super::key::{ANALYTICS_READONLY_SCOPE, ServiceAccountKey};
use crate::errors::Ga4Error;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(serde::Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Parse the key's PEM into signing material. Called at the validation
/// boundary so a broken key is a 400, not a mid-flight surprise.
pub fn signing_key(key: &ServiceAccountKey) -> Result<EncodingKey, jsonwebtoken::errors::Error> {
    EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
}

/// Build the RS256 assertion the token endpoint expects.
/// RSA signing is CPU work, so callers run this on the blocking pool.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: ANALYTICS_READONLY_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    encode(&header, &claims, encoding_key)
}

#[derive(serde::Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}

/// Trade the signed assertion for a short-lived bearer token.
///
/// The token never outlives the request that asked for it.
#[tracing::instrument(name = "Exchange assertion for access token", skip_all)]
pub async fn fetch_access_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    assertion: String,
) -> Result<AccessToken, Ga4Error> {
    let response = http
        .post(&key.token_uri)
        .form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::BAD_REQUEST
        || status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        // invalid_grant and friends: the key itself was not accepted
        let detail = response.text().await.unwrap_or_default();
        return Err(Ga4Error::unauthorized(format!(
            "token endpoint rejected the assertion ({status}): {detail}"
        )));
    }
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(Ga4Error::Report(format!(
            "token endpoint returned {status}: {detail}"
        )));
    }

    Ok(response.json::<AccessToken>().await?)
}
