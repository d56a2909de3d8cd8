//! Offline expiry checks for signed bearer tokens.
//!
//! The inspector reads the `exp` claim from the (unverified) payload segment of a
//! `header.payload.signature` token. It never contacts the server and never trusts an
//! undecodable token: any decoding failure answers "expired".

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::AccessToken};

/// Reasons a token's expiry claim could not be read.
#[derive(Debug, ThisError)]
pub enum TokenDecodeError {
	/// Token does not have the three dot-separated segments of a signed token.
	#[error("Token is not a signed token with three segments.")]
	Malformed,
	/// Payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// Payload segment is not a JSON claims object.
	#[error("Token payload is not a JSON claims object.")]
	Claims(#[from] serde_json::Error),
	/// Payload carries no `exp` claim.
	#[error("Token payload has no exp claim.")]
	MissingExpiry,
	/// The `exp` claim cannot be represented as an instant.
	#[error("Token exp claim is out of range.")]
	ExpiryOutOfRange,
}

#[derive(Deserialize)]
struct Claims {
	#[serde(default)]
	exp: Option<f64>,
}

/// Stateless, fail-closed expiry inspector.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenInspector;
impl TokenInspector {
	/// Decodes the expiry instant embedded in the token.
	pub fn decode_expiry(token: &AccessToken) -> Result<OffsetDateTime, TokenDecodeError> {
		let mut segments = token.expose().split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(TokenDecodeError::Malformed);
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let claims: Claims = serde_json::from_slice(&bytes)?;
		let exp = claims.exp.ok_or(TokenDecodeError::MissingExpiry)?;

		if !exp.is_finite() {
			return Err(TokenDecodeError::ExpiryOutOfRange);
		}

		let secs = exp.floor();
		let nanos = ((exp - secs) * 1_000_000_000.0).round() as i64;

		OffsetDateTime::from_unix_timestamp(secs as i64)
			.ok()
			.and_then(|instant| instant.checked_add(Duration::nanoseconds(nanos)))
			.ok_or(TokenDecodeError::ExpiryOutOfRange)
	}

	/// Returns `true` if the token is past its expiry, or if the expiry cannot be decoded.
	pub fn is_expired(token: &AccessToken) -> bool {
		Self::is_expired_at(token, OffsetDateTime::now_utc())
	}

	/// [`TokenInspector::is_expired`] evaluated at an explicit instant.
	pub fn is_expired_at(token: &AccessToken, now: OffsetDateTime) -> bool {
		match Self::decode_expiry(token) {
			Ok(expires_at) => expires_at < now,
			Err(_) => true,
		}
	}

	/// Returns `true` if less than `threshold` of the token's lifetime remains, or if the
	/// expiry cannot be decoded.
	pub fn expires_within(token: &AccessToken, threshold: Duration) -> bool {
		Self::expires_within_at(token, threshold, OffsetDateTime::now_utc())
	}

	/// [`TokenInspector::expires_within`] evaluated at an explicit instant.
	pub fn expires_within_at(token: &AccessToken, threshold: Duration, now: OffsetDateTime) -> bool {
		let Ok(expires_at) = Self::decode_expiry(token) else {
			return true;
		};

		match now.checked_add(threshold) {
			Some(horizon) => expires_at < horizon,
			None => true,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::engine::general_purpose::URL_SAFE;
	use time::macros;
	// self
	use super::*;

	fn signed(payload: &str) -> AccessToken {
		let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
		let body = URL_SAFE_NO_PAD.encode(payload);

		AccessToken::new(format!("{header}.{body}.c2lnbmF0dXJl"))
	}

	fn token_expiring_at(instant: OffsetDateTime) -> AccessToken {
		signed(&format!(r#"{{"sub":"alice","exp":{}}}"#, instant.unix_timestamp()))
	}

	#[test]
	fn undecodable_tokens_are_expired_and_expiring() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let cases = [
			AccessToken::new("abc"),
			AccessToken::new("a.b"),
			AccessToken::new("a.b.c.d"),
			AccessToken::new("header.%%%.sig"),
			signed("not json"),
			signed(r#"{"sub":"alice"}"#),
			signed(r#"{"exp":"tomorrow"}"#),
			signed(r#"{"exp":1e300}"#),
		];

		for token in cases {
			assert!(TokenInspector::is_expired_at(&token, now));
			assert!(TokenInspector::expires_within_at(&token, Duration::ZERO, now));
			assert!(TokenInspector::expires_within_at(&token, Duration::days(365), now));
		}
	}

	#[test]
	fn threshold_window_is_separate_from_expiry() {
		let issued = macros::datetime!(2025-06-01 12:00 UTC);
		let token = token_expiring_at(issued + Duration::seconds(900));
		let now = issued + Duration::seconds(700);

		assert!(!TokenInspector::is_expired_at(&token, now));
		assert!(TokenInspector::expires_within_at(&token, Duration::seconds(300), now));
		assert!(!TokenInspector::expires_within_at(&token, Duration::seconds(100), now));
	}

	#[test]
	fn expiry_compares_strictly() {
		let exp = macros::datetime!(2025-06-01 12:00 UTC);
		let token = token_expiring_at(exp);

		assert!(!TokenInspector::is_expired_at(&token, exp));
		assert!(TokenInspector::is_expired_at(&token, exp + Duration::seconds(1)));
	}

	#[test]
	fn decodes_padded_payloads_and_fractional_claims() {
		let header = URL_SAFE.encode("{}");
		let body = URL_SAFE.encode(r#"{"exp":1748779200.5}"#);
		let token = AccessToken::new(format!("{header}.{body}.sig"));
		let expires_at =
			TokenInspector::decode_expiry(&token).expect("Padded payload should decode.");

		assert_eq!(expires_at.unix_timestamp(), 1_748_779_200);
		assert_eq!(expires_at.millisecond(), 500);
	}

	#[test]
	fn decode_errors_are_typed() {
		assert!(matches!(
			TokenInspector::decode_expiry(&AccessToken::new("abc")),
			Err(TokenDecodeError::Malformed)
		));
		assert!(matches!(
			TokenInspector::decode_expiry(&signed(r#"{"sub":"alice"}"#)),
			Err(TokenDecodeError::MissingExpiry)
		));
	}
}
