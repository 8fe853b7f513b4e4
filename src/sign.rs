//! Request signing with rotating delegated credentials.
//!
//! [`RequestSigner`] keeps the last delegated credential as an immutable snapshot. Before every
//! signature it checks that the snapshot is still valid `expiry_delta` past now and otherwise
//! performs a new exchange inline. No lock is held across the exchange, so concurrent callers that
//! all find a stale snapshot each run their own exchange and the last one to finish is kept.
//! Exchanges are idempotent, which makes the redundancy wasteful but never incorrect.

pub mod sigv4;
pub mod sts;

pub use sts::*;

// self
use crate::{
	_prelude::*,
	auth::DelegatedCredential,
	config::{EXPIRY_DELTA, Region, SERVICE_EXECUTE_API},
	error::CredentialError,
	ext::{RequestSignerExt, SignFuture},
	http::HttpRequest,
	obs::{self, Outcome, Stage, StageSpan},
	sign::sigv4::{SigningKeys, SigningScope},
};

/// Signs API requests with credentials from a [`CredentialProvider`].
pub struct RequestSigner {
	provider: Arc<dyn CredentialProvider>,
	region: Region,
	service: String,
	expiry_delta: StdDuration,
	credential: RwLock<Option<Arc<DelegatedCredential>>>,
}
impl RequestSigner {
	/// Creates a signer for `execute-api` in `region`.
	pub fn new(provider: Arc<dyn CredentialProvider>, region: Region) -> Self {
		Self {
			provider,
			region,
			service: SERVICE_EXECUTE_API.into(),
			expiry_delta: EXPIRY_DELTA,
			credential: RwLock::new(None),
		}
	}

	/// Overrides the margin before expiry at which the credential is replaced.
	pub fn with_expiry_delta(mut self, delta: StdDuration) -> Self {
		self.expiry_delta = delta;

		self
	}

	/// Overrides the service name in the signing scope.
	pub fn with_service(mut self, service: impl Into<String>) -> Self {
		self.service = service.into();

		self
	}

	/// Returns the cached credential, if any.
	pub fn credential(&self) -> Option<Arc<DelegatedCredential>> {
		self.credential.read().clone()
	}

	/// Performs a new exchange and caches the result.
	///
	/// A credential that is already within the expiry margin when it arrives is rejected.
	pub async fn refresh(&self) -> Result<Arc<DelegatedCredential>> {
		const STAGE: Stage = Stage::CredentialRefresh;

		let span = StageSpan::new(STAGE, "assume_role");

		obs::record_outcome(STAGE, Outcome::Attempt);

		let result = span.instrument(self.provider.credential()).await.and_then(|credential| {
			if credential.is_usable_at(OffsetDateTime::now_utc(), self.expiry_delta) {
				Ok(credential)
			} else {
				Err(CredentialError::ExpiresWithinMargin { expiry: credential.expiry }.into())
			}
		});

		match result {
			Ok(credential) => {
				let credential = Arc::new(credential);

				*self.credential.write() = Some(credential.clone());
				obs::record_outcome(STAGE, Outcome::Success);

				Ok(credential)
			},
			Err(e) => {
				obs::record_outcome(STAGE, Outcome::Failure);

				Err(e)
			},
		}
	}

	async fn usable_credential(&self) -> Result<Arc<DelegatedCredential>> {
		let cached = self.credential();

		match cached {
			Some(credential) if credential.is_usable_at(OffsetDateTime::now_utc(), self.expiry_delta) =>
				Ok(credential),
			_ => self.refresh().await,
		}
	}
}
impl RequestSignerExt for RequestSigner {
	fn sign<'a>(&'a self, request: &'a mut HttpRequest) -> SignFuture<'a> {
		Box::pin(async move {
			let credential = self.usable_credential().await?;

			sigv4::sign_request(
				request,
				SigningKeys::from(credential.as_ref()),
				SigningScope { region: self.region.as_str(), service: &self.service },
				OffsetDateTime::now_utc(),
			)
		})
	}
}
impl Debug for RequestSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestSigner")
			.field("region", &self.region)
			.field("service", &self.service)
			.field("expiry_delta", &self.expiry_delta)
			.field("credential_expiry", &self.credential.read().as_ref().map(|c| c.expiry))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{auth::TokenSecret, http::Request};

	struct CountingProvider {
		calls: AtomicUsize,
		lifetime: Duration,
		fail: bool,
	}
	impl CountingProvider {
		fn new(lifetime: Duration) -> Arc<Self> {
			Arc::new(Self { calls: AtomicUsize::new(0), lifetime, fail: false })
		}

		fn failing() -> Arc<Self> {
			Arc::new(Self { calls: AtomicUsize::new(0), lifetime: Duration::hours(1), fail: true })
		}
	}
	impl CredentialProvider for CountingProvider {
		fn credential(&self) -> CredentialFuture<'_> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst);

				if self.fail {
					return Err(CredentialError::AssumeRole {
						status: 403,
						code: Some("AccessDenied".into()),
						message: "denied".into(),
					}
					.into());
				}

				Ok(DelegatedCredential {
					access_key_id: format!("ASIA{call}"),
					secret_key: TokenSecret::new("secret"),
					session_token: Some(TokenSecret::new("session")),
					expiry: OffsetDateTime::now_utc() + self.lifetime,
				})
			})
		}
	}

	fn request() -> HttpRequest {
		Request::builder()
			.uri("https://sellingpartnerapi-na.amazon.com/orders/v0/orders")
			.header("x-amz-access-token", "Atza|token")
			.body(Vec::new())
			.expect("Request fixture should build.")
	}

	#[tokio::test]
	async fn credential_is_fetched_lazily_and_reused() {
		let provider = CountingProvider::new(Duration::hours(1));
		let signer = RequestSigner::new(provider.clone(), Region::UsEast1);

		assert!(signer.credential().is_none());

		for _ in 0..3 {
			let mut request = request();

			signer.sign(&mut request).await.expect("Signing should succeed.");

			let authorization =
				request.headers()["authorization"].to_str().expect("Header should be ASCII.");

			assert!(authorization.contains("Credential=ASIA0/"));
			assert!(authorization.contains("/us-east-1/execute-api/aws4_request"));
		}

		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn credential_inside_the_margin_is_replaced() {
		let provider = CountingProvider::new(Duration::minutes(5));
		let signer = RequestSigner::new(provider.clone(), Region::UsEast1).with_expiry_delta(StdDuration::from_secs(60));

		signer.sign(&mut request()).await.expect("Signing should succeed.");

		let short = RequestSigner::new(provider.clone(), Region::UsEast1).with_expiry_delta(StdDuration::from_secs(600));
		let err = short.sign(&mut request()).await.expect_err("Credential shorter than the margin must be rejected.");

		assert!(matches!(err, Error::Credential(CredentialError::ExpiresWithinMargin { .. })));
		assert!(short.credential().is_none());

		let stale = DelegatedCredential {
			access_key_id: "ASIAOLD".into(),
			secret_key: TokenSecret::new("secret"),
			session_token: None,
			expiry: OffsetDateTime::now_utc() + Duration::seconds(30),
		};

		*signer.credential.write() = Some(Arc::new(stale));

		let mut request = request();

		signer.sign(&mut request).await.expect("Signing should succeed.");

		assert!(
			request.headers()["authorization"]
				.to_str()
				.expect("Header should be ASCII.")
				.contains("Credential=ASIA2/")
		);
		assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn exchange_failure_fails_the_signature_once() {
		let provider = CountingProvider::failing();
		let signer = RequestSigner::new(provider.clone(), Region::EuWest1);
		let mut request = request();
		let err = signer.sign(&mut request).await.expect_err("Exchange failures must surface.");

		assert!(matches!(err, Error::Credential(CredentialError::AssumeRole { status: 403, .. })));
		assert!(!request.headers().contains_key("authorization"));
		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
	}
}
