//! The three signing schemes as pure functions.
//!
//! Each function returns the signature exactly as the platform writes it into the request
//! headers, so verification is a constant-time string comparison against the header value.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
// self
use crate::signature::canonical::canonicalize_v3_uri;

type HmacSha256 = Hmac<Sha256>;

/// v3: base64 HMAC-SHA256 keyed by the client secret over `method + uri + body + timestamp`.
///
/// `uri` is canonicalized with [`canonicalize_v3_uri`] before hashing.
pub fn sign_v3(secret: &str, method: &str, uri: &str, body: &[u8], timestamp: &str) -> String {
	// HMAC accepts keys of any length.
	let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
		return String::new();
	};

	mac.update(method.as_bytes());
	mac.update(canonicalize_v3_uri(uri).as_bytes());
	mac.update(body);
	mac.update(timestamp.as_bytes());

	STANDARD.encode(mac.finalize().into_bytes())
}

/// v2: lowercase hex SHA-256 of `secret + method + uri + body`.
pub fn sign_v2(secret: &str, method: &str, uri: &str, body: &[u8]) -> String {
	let mut hasher = Sha256::new();

	hasher.update(secret.as_bytes());
	hasher.update(method.as_bytes());
	hasher.update(uri.as_bytes());
	hasher.update(body);

	hex::encode(hasher.finalize())
}

/// v1: lowercase hex SHA-256 of `secret + body`.
pub fn sign_v1(secret: &str, body: &[u8]) -> String {
	let mut hasher = Sha256::new();

	hasher.update(secret.as_bytes());
	hasher.update(body);

	hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const SECRET: &str = "shhh-client-secret";
	const URI: &str = "https://portal.example.com/functions/v1/webhook?portal=555";
	const BODY: &[u8] = br#"{"objectId":42}"#;

	#[test]
	fn v3_matches_reference_vector() {
		assert_eq!(
			sign_v3(SECRET, "POST", URI, BODY, "1700000000000"),
			"zp/PbIFr7UU1Xe4QzUzVeFNeyBHiBpnlLaA0Taf3wFI="
		);
	}

	#[test]
	fn v3_hashes_the_canonical_uri() {
		let encoded = sign_v3(SECRET, "POST", "https://h/functions/v1/x?a%3Ab=1", BODY, "1700000000000");
		let decoded = sign_v3(SECRET, "POST", "https://h/functions/v1/x?a:b=1", BODY, "1700000000000");

		assert_eq!(encoded, decoded);
		assert_eq!(encoded, "dTuLGfboynCQedOXz47mLVWjGpudLjFt3K13n106ffk=");
	}

	#[test]
	fn v2_and_v1_match_reference_vectors() {
		assert_eq!(
			sign_v2(SECRET, "POST", URI, BODY),
			"e9db7c061830755cbd37241aa0ee29863af5dc65f45e13bfc0ec67efc956935b"
		);
		assert_eq!(
			sign_v1(SECRET, BODY),
			"5b902c4917c6ac0fed7e51419a3d5c4e565bf3a63368914ad37f8691294077c1"
		);
	}

	#[test]
	fn signing_is_deterministic() {
		assert_eq!(sign_v2(SECRET, "GET", URI, b""), sign_v2(SECRET, "GET", URI, b""));
		assert_ne!(sign_v1(SECRET, b"a"), sign_v1("other", b"a"));
	}
}
