//! Delegated credentials obtained through the security token service's `AssumeRole` action.

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{DelegatedCredential, TokenSecret},
	config::{DEFAULT_STS_URL, RoleSettings, parse_url},
	error::{ConfigError, CredentialError},
	http::{self, HttpRequest, HttpTransport, Method, Request, header},
	sign::sigv4::{self, SigningKeys, SigningScope},
};

const STS_VERSION: &str = "2011-06-15";

/// Boxed future returned by [`CredentialProvider::credential`].
pub type CredentialFuture<'a> = Pin<Box<dyn Future<Output = Result<DelegatedCredential>> + 'a + Send>>;

/// Produces fresh delegated signing credentials.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Obtains a new credential. Every call performs a new exchange.
	fn credential(&self) -> CredentialFuture<'_>;
}

/// [`CredentialProvider`] that assumes an IAM role.
pub struct StsAssumeRole<C>
where
	C: HttpTransport,
{
	transport: Arc<C>,
	settings: RoleSettings,
	url: Url,
}
impl<C> StsAssumeRole<C>
where
	C: HttpTransport,
{
	/// Creates a provider for `settings`, sending exchanges through `transport`.
	pub fn new(transport: Arc<C>, settings: RoleSettings) -> Result<Self> {
		let url = match settings.sts_url.clone() {
			Some(url) => url,
			None => parse_url("sts", DEFAULT_STS_URL).map_err(ConfigError::from)?,
		};

		Ok(Self { transport, settings, url })
	}

	fn request(&self, session_name: &str) -> Result<HttpRequest> {
		let mut form = url::form_urlencoded::Serializer::new(String::new());

		form.append_pair("Action", "AssumeRole");

		if let Some(duration) = self.settings.session_duration {
			form.append_pair("DurationSeconds", &duration.as_secs().to_string());
		}

		form.append_pair("RoleArn", &self.settings.role_arn)
			.append_pair("RoleSessionName", session_name)
			.append_pair("Version", STS_VERSION);

		let mut request = Request::builder()
			.method(Method::POST)
			.uri(self.url.as_str())
			.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8")
			.header(header::ACCEPT, "application/json")
			.body(form.finish().into_bytes())
			.map_err(ConfigError::from)?;

		sigv4::sign_request(
			&mut request,
			SigningKeys::from(&self.settings.iam),
			SigningScope { region: self.settings.sts_region.as_str(), service: "sts" },
			OffsetDateTime::now_utc(),
		)?;

		Ok(request)
	}
}
impl<C> CredentialProvider for StsAssumeRole<C>
where
	C: HttpTransport,
{
	fn credential(&self) -> CredentialFuture<'_> {
		Box::pin(async move {
			let session_name = hex::encode(rand::random::<[u8; 16]>());
			let request = self.request(&session_name)?;
			let response = self.transport.send(request).await.map_err(http::map_transport_error)?;

			Ok(parse_assume_role_response(response.status().as_u16(), response.body())?)
		})
	}
}
impl<C> Debug for StsAssumeRole<C>
where
	C: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StsAssumeRole")
			.field("url", &self.url.as_str())
			.field("role_arn", &self.settings.role_arn)
			.finish()
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleEnvelope {
	assume_role_response: AssumeRoleResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
	assume_role_result: AssumeRoleResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResult {
	#[serde(default)]
	credentials: Option<StsCredentials>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StsCredentials {
	access_key_id: String,
	secret_access_key: String,
	#[serde(default)]
	session_token: Option<String>,
	expiration: Expiration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Expiration {
	Epoch(f64),
	Text(String),
}
impl Expiration {
	fn resolve(self) -> Result<OffsetDateTime, CredentialError> {
		match self {
			Self::Epoch(seconds) => OffsetDateTime::from_unix_timestamp(seconds.trunc() as i64)
				.map_err(|_| CredentialError::InvalidExpiration { raw: seconds.to_string() }),
			Self::Text(raw) => OffsetDateTime::parse(&raw, &Rfc3339)
				.ok()
				.or_else(|| raw.parse::<i64>().ok().and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok()))
				.ok_or(CredentialError::InvalidExpiration { raw }),
		}
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorEnvelope {
	error: StsError,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StsError {
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	message: Option<String>,
}

/// Interprets an `AssumeRole` response received with `status`.
pub fn parse_assume_role_response(status: u16, body: &[u8]) -> Result<DelegatedCredential, CredentialError> {
	if !(200..300).contains(&status) {
		let (code, message) = match serde_json::from_slice::<ErrorEnvelope>(body) {
			Ok(ErrorEnvelope { error }) => (error.code, error.message),
			Err(_) => (None, None),
		};
		let message = message.unwrap_or_else(|| {
			String::from_utf8_lossy(body).trim().chars().take(256).collect::<String>()
		});

		return Err(CredentialError::AssumeRole { status, code, message });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let envelope: AssumeRoleEnvelope = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| CredentialError::ResponseParse { source, status })?;
	let credentials = envelope
		.assume_role_response
		.assume_role_result
		.credentials
		.filter(|c| !c.access_key_id.is_empty() && !c.secret_access_key.is_empty())
		.ok_or(CredentialError::MissingCredentials)?;

	Ok(DelegatedCredential {
		access_key_id: credentials.access_key_id,
		secret_key: TokenSecret::new(credentials.secret_access_key),
		session_token: credentials.session_token.filter(|t| !t.is_empty()).map(TokenSecret::new),
		expiry: credentials.expiration.resolve()?,
	})
}
