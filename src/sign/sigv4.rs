//! Signature Version 4 over fully-buffered requests.
//!
//! The canonical path is used as-is (API Gateway style, no double escaping). Query pairs are
//! decoded, re-encoded with the strict unreserved set, and sorted; the request URI is rewritten to
//! that form so the query on the wire is the one that was signed. Every header except
//! `authorization`, `user-agent`, and `x-amzn-trace-id` is signed.

// crates.io
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::UtcOffset;
// self
use crate::{
	_prelude::*,
	auth::{DelegatedCredential, IamCredential},
	error::{ConfigError, CredentialError},
	http::{
		HttpRequest,
		header::HeaderValue,
		http::{Error as HttpError, Uri, uri::PathAndQuery},
	},
};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const UNSIGNED_HEADERS: [&str; 3] = ["authorization", "user-agent", "x-amzn-trace-id"];

/// Borrowed key material used for one signature.
#[derive(Clone, Copy)]
pub struct SigningKeys<'a> {
	/// Access key identifier.
	pub access_key_id: &'a str,
	/// Secret access key.
	pub secret_key: &'a str,
	/// Session token of temporary credentials.
	pub session_token: Option<&'a str>,
}
impl<'a> From<&'a DelegatedCredential> for SigningKeys<'a> {
	fn from(value: &'a DelegatedCredential) -> Self {
		Self {
			access_key_id: &value.access_key_id,
			secret_key: value.secret_key.expose(),
			session_token: value.session_token.as_ref().map(|token| token.expose()),
		}
	}
}
impl<'a> From<&'a IamCredential> for SigningKeys<'a> {
	fn from(value: &'a IamCredential) -> Self {
		Self {
			access_key_id: &value.access_key_id,
			secret_key: value.secret_key.expose(),
			session_token: None,
		}
	}
}
impl Debug for SigningKeys<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKeys")
			.field("access_key_id", &self.access_key_id)
			.field("secret_key", &"<redacted>")
			.field("session_token", &self.session_token.map(|_| "<redacted>"))
			.finish()
	}
}

/// Region and service forming the credential scope.
#[derive(Clone, Copy, Debug)]
pub struct SigningScope<'a> {
	/// Region name, e.g. `us-east-1`.
	pub region: &'a str,
	/// Service name, e.g. `execute-api`.
	pub service: &'a str,
}

/// Signs `request` in place at `now`.
///
/// Sets `host` (when absent), `x-amz-date`, `x-amz-security-token` (for temporary credentials)
/// and `authorization`, and rewrites the query into canonical form. The body is hashed where it
/// lies; it stays attached to the request.
pub fn sign_request(
	request: &mut HttpRequest,
	keys: SigningKeys<'_>,
	scope: SigningScope<'_>,
	now: OffsetDateTime,
) -> Result<()> {
	let (amz_date, date) = timestamps(now);

	request.headers_mut().remove("authorization");
	canonicalize_query(request)?;

	if !request.headers().contains_key("host") {
		let host = request.uri().authority().map(|authority| authority.as_str().to_owned()).unwrap_or_default();

		request.headers_mut().insert("host", header_value("host", &host)?);
	}

	request.headers_mut().insert("x-amz-date", header_value("x-amz-date", &amz_date)?);

	if let Some(token) = keys.session_token {
		request.headers_mut().insert("x-amz-security-token", header_value("x-amz-security-token", token)?);
	}

	let (canonical, signed_headers) = canonical_request(request);
	let credential_scope = format!("{date}/{}/{}/aws4_request", scope.region, scope.service);
	let string_to_sign =
		format!("{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}", hex::encode(Sha256::digest(canonical)));
	let key = signing_key(keys.secret_key, &date, scope)?;
	let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);
	let authorization = format!(
		"{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
		keys.access_key_id
	);
	let mut value = header_value("authorization", &authorization)?;

	value.set_sensitive(true);
	request.headers_mut().insert("authorization", value);

	Ok(())
}

/// Builds the canonical request and the signed header list.
pub fn canonical_request(request: &HttpRequest) -> (String, String) {
	let mut headers = BTreeMap::<String, Vec<String>>::new();

	for (name, value) in request.headers() {
		let name = name.as_str();

		if UNSIGNED_HEADERS.contains(&name) {
			continue;
		}

		let value = String::from_utf8_lossy(value.as_bytes());

		headers.entry(name.to_owned()).or_default().push(value.split_whitespace().collect::<Vec<_>>().join(" "));
	}

	let canonical_headers =
		headers.iter().map(|(name, values)| format!("{name}:{}\n", values.join(","))).collect::<String>();
	let signed_headers = headers.keys().map(String::as_str).collect::<Vec<_>>().join(";");
	let path = match request.uri().path() {
		"" => "/",
		path => path,
	};
	let canonical = format!(
		"{}\n{path}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
		request.method().as_str(),
		canonical_query(request.uri().query().unwrap_or_default()),
		hex::encode(Sha256::digest(request.body())),
	);

	(canonical, signed_headers)
}

/// Decodes a form-encoded query string and re-encodes it in canonical order.
pub fn canonical_query(query: &str) -> String {
	let mut pairs = url::form_urlencoded::parse(query.as_bytes())
		.map(|(key, value)| (uri_encode(&key), uri_encode(&value)))
		.collect::<Vec<_>>();

	pairs.sort();

	pairs.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&")
}

/// Percent-encodes everything outside `A-Z a-z 0-9 - _ . ~` with uppercase hex digits.
pub fn uri_encode(raw: &str) -> String {
	let mut encoded = String::with_capacity(raw.len());

	for byte in raw.bytes() {
		if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
			encoded.push(byte as char);
		} else {
			encoded.push_str(&format!("%{byte:02X}"));
		}
	}

	encoded
}

// Rewrites the URI query into the canonical form used for the signature.
fn canonicalize_query(request: &mut HttpRequest) -> Result<(), ConfigError> {
	let Some(query) = request.uri().query() else {
		return Ok(());
	};
	let canonical = canonical_query(query);

	if canonical == query {
		return Ok(());
	}

	let path_and_query = if canonical.is_empty() {
		request.uri().path().to_owned()
	} else {
		format!("{}?{canonical}", request.uri().path())
	};
	let mut parts = request.uri().clone().into_parts();

	parts.path_and_query =
		Some(PathAndQuery::try_from(path_and_query).map_err(|e| ConfigError::from(HttpError::from(e)))?);
	*request.uri_mut() = Uri::from_parts(parts).map_err(|e| ConfigError::from(HttpError::from(e)))?;

	Ok(())
}

fn timestamps(now: OffsetDateTime) -> (String, String) {
	let now = now.to_offset(UtcOffset::UTC);
	let date = format!("{:04}{:02}{:02}", now.year(), u8::from(now.month()), now.day());
	let amz_date = format!("{date}T{:02}{:02}{:02}Z", now.hour(), now.minute(), now.second());

	(amz_date, date)
}

fn signing_key(secret: &str, date: &str, scope: SigningScope<'_>) -> Result<Vec<u8>, CredentialError> {
	let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
	let k_region = hmac(&k_date, scope.region.as_bytes())?;
	let k_service = hmac(&k_region, scope.service.as_bytes())?;

	hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CredentialError> {
	let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CredentialError::InvalidSigningKey)?;

	mac.update(data);

	Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeaderValue { name })
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::http::Request;

	const KEYS: SigningKeys = SigningKeys {
		access_key_id: "AKIDEXAMPLE",
		secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
		session_token: None,
	};
	const SCOPE: SigningScope = SigningScope { region: "us-east-1", service: "service" };

	#[test]
	fn get_vanilla_matches_the_reference_signature() {
		let mut request = Request::builder()
			.method("GET")
			.uri("https://example.amazonaws.com/")
			.body(Vec::new())
			.expect("Request fixture should build.");

		sign_request(&mut request, KEYS, SCOPE, datetime!(2015-08-30 12:36:00 UTC)).expect("Signing should succeed.");

		assert_eq!(request.headers()["x-amz-date"], "20150830T123600Z");
		assert_eq!(
			request.headers()["authorization"],
			"AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
			 SignedHeaders=host;x-amz-date, \
			 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
		);
	}

	#[test]
	fn session_token_and_access_token_are_signed() {
		let mut request = Request::builder()
			.method("POST")
			.uri("https://sellingpartnerapi-na.amazon.com/reports/2021-06-30/reports")
			.header("x-amz-access-token", "Atza|token")
			.header("user-agent", "sp-api-client")
			.body(br#"{"reportType":"GET_FLAT_FILE_OPEN_LISTINGS_DATA"}"#.to_vec())
			.expect("Request fixture should build.");
		let keys = SigningKeys { session_token: Some("session"), ..KEYS };

		sign_request(&mut request, keys, SCOPE, datetime!(2024-01-01 00:00 UTC)).expect("Signing should succeed.");

		let authorization = request.headers()["authorization"].to_str().expect("Header should be ASCII.");

		assert!(authorization.contains("SignedHeaders=host;x-amz-access-token;x-amz-date;x-amz-security-token,"));
		assert_eq!(request.headers()["x-amz-security-token"], "session");
		assert_eq!(request.body(), br#"{"reportType":"GET_FLAT_FILE_OPEN_LISTINGS_DATA"}"#);
	}

	#[test]
	fn canonical_query_sorts_and_strictly_encodes() {
		assert_eq!(
			canonical_query("messageID=1234&final=true&note=a+b%2Bc&star=*"),
			"final=true&messageID=1234&note=a%20b%2Bc&star=%2A"
		);
		assert_eq!(canonical_query(""), "");
		assert_eq!(uri_encode("A-Z_a.z~0/9"), "A-Z_a.z~0%2F9");
	}

	#[test]
	fn sent_query_is_the_signed_query() {
		let mut request = Request::builder()
			.uri("https://sellingpartnerapi-na.amazon.com/catalog/2022-04-01/items?keywords=red+shoe&marketplaceIds=ATVPDKIKX0DER&note=a%2Bb")
			.body(Vec::new())
			.expect("Request fixture should build.");

		sign_request(&mut request, KEYS, SCOPE, datetime!(2024-01-01 00:00 UTC)).expect("Signing should succeed.");

		let sent = request.uri().query().expect("Query should survive signing.");

		assert_eq!(sent, "keywords=red%20shoe&marketplaceIds=ATVPDKIKX0DER&note=a%2Bb");
		assert_eq!(sent, canonical_query(sent));
		assert!(canonical_request(&request).0.contains(&format!("\n{sent}\n")));
		assert_eq!(request.uri().path(), "/catalog/2022-04-01/items");
	}

	#[test]
	fn resigning_replaces_the_previous_signature() {
		let mut request = Request::builder()
			.uri("https://example.amazonaws.com/")
			.body(Vec::new())
			.expect("Request fixture should build.");

		sign_request(&mut request, KEYS, SCOPE, datetime!(2015-08-30 12:36:00 UTC)).expect("Signing should succeed.");
		sign_request(&mut request, KEYS, SCOPE, datetime!(2015-08-30 12:36:00 UTC)).expect("Signing should succeed.");

		assert_eq!(request.headers().get_all("authorization").iter().count(), 1);
		assert!(
			request.headers()["authorization"]
				.to_str()
				.expect("Header should be ASCII.")
				.ends_with("5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31")
		);
	}
}
