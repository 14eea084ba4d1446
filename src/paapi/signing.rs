//! AWS Signature Version 4 for Product Advertising API requests.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const SERVICE: &str = "ProductAdvertisingAPI";
pub const CONTENT_ENCODING: &str = "amz-1.0";

/// Headers that take part in the signature, already in canonical order.
const SIGNED_HEADERS: &str = "content-encoding;host;x-amz-date;x-amz-target";

/// Everything needed to sign one request.
pub struct SigningInput<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub target: &'a str,
    pub payload: &'a str,
}

/// Header values to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
}

pub fn sign(input: &SigningInput<'_>, now: DateTime<Utc>) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let canonical_request = format!(
        "POST\n{path}\n\ncontent-encoding:{enc}\nhost:{host}\nx-amz-date:{amz_date}\nx-amz-target:{target}\n\n{signed}\n{payload_hash}",
        path = input.path,
        enc = CONTENT_ENCODING,
        host = input.host,
        amz_date = amz_date,
        target = input.target,
        signed = SIGNED_HEADERS,
        payload_hash = sha256_hex(input.payload.as_bytes()),
    );

    let scope = format!("{}/{}/{}/aws4_request", date, input.region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(input.secret_key, &date, input.region, SERVICE);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, input.access_key, scope, SIGNED_HEADERS, signature
        ),
        amz_date,
    }
}

pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
