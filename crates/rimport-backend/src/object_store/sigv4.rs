//! AWS Signature Version 4 for unsigned-payload GET requests.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Access keys used to sign a request
#[derive(Debug, Clone)]
pub struct SigningKeys<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
}

fn hmac(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Derive the per-day, per-region signing key
pub fn signing_key(secret_access_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret_access_key).as_bytes(), date_stamp);
    let k_region = hmac(&k_date, region);
    let k_service = hmac(&k_region, service);
    hmac(&k_service, "aws4_request")
}

/// Headers to add to a `GET` of `canonical_uri` on `host`.
///
/// `canonical_uri` must already be percent-encoded exactly as it is sent.
pub fn sign_get(
    host: &str,
    canonical_uri: &str,
    region: &str,
    now: DateTime<Utc>,
    keys: &SigningKeys<'_>,
) -> Vec<(&'static str, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(&'static str, String)> = vec![
        ("host", host.to_string()),
        ("x-amz-content-sha256", UNSIGNED_PAYLOAD.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = keys.session_token {
        headers.push(("x-amz-security-token", token.to_string()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "GET\n{}\n\n{}\n{}\n{}",
        canonical_uri, canonical_headers, signed_headers, UNSIGNED_PAYLOAD
    );

    let scope = format!("{}/{}/{}/aws4_request", date_stamp, region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(keys.secret_access_key, &date_stamp, region, SERVICE);
    let signature = hex::encode(hmac(&key, &string_to_sign));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, keys.access_key_id, scope, signed_headers, signature
    );

    // `host` is set by the HTTP client itself
    headers.retain(|(name, _)| *name != "host");
    headers.push(("authorization", authorization));
    headers
}
