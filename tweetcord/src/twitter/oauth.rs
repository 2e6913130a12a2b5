//! OAuth 1.0a request signing (HMAC-SHA1).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Application and user credentials.
#[derive(Clone, Default)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// Per-request values that must be unique.
#[derive(Debug, Clone)]
pub struct Nonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl Nonce {
    pub fn generate() -> Self {
        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// RFC 3986 percent-encoding, as OAuth requires.
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the `Authorization` header for a request.
///
/// `params` are the form body parameters; query parameters are taken from
/// `url`.
pub fn authorization_header(
    credentials: &OAuthCredentials,
    method: &str,
    url: &Url,
    params: &[(String, String)],
    nonce: &Nonce,
) -> Result<String, InvalidLength> {
    let timestamp = nonce.timestamp.to_string();
    let mut oauth_params = vec![
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce.nonce.as_str()),
        ("oauth_signature_method", SIGNATURE_METHOD),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.token.as_str()),
        ("oauth_version", OAUTH_VERSION),
    ];

    let signature = sign(credentials, method, url, params, &oauth_params)?;
    oauth_params.push(("oauth_signature", signature.as_str()));
    oauth_params.sort_by(|a, b| a.0.cmp(b.0));

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

fn sign(
    credentials: &OAuthCredentials,
    method: &str,
    url: &Url,
    params: &[(String, String)],
    oauth_params: &[(&str, &str)],
) -> Result<String, InvalidLength> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(params.iter().map(|(k, v)| (encode(k), encode(v))))
        .chain(oauth_params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();

    let parameter_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    let base_string = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(base_url.as_str()),
        encode(&parameter_string)
    );
    let signing_key = format!(
        "{}&{}",
        encode(&credentials.consumer_secret),
        encode(&credentials.token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
