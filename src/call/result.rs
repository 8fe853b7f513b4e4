// self
use crate::_prelude::*;

/// One structured error returned by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
	/// Error code identifying the condition.
	#[serde(default)]
	pub code: String,
	/// Human-readable description.
	#[serde(default)]
	pub message: String,
	/// Additional details, when supplied.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<String>,
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}: {}", self.code, self.message)?;

		if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
			write!(f, " ({details})")?;
		}

		Ok(())
	}
}

/// Error payload returned with non-2xx responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorList {
	/// Individual errors.
	#[serde(default)]
	pub errors: Vec<ApiError>,
}
impl ErrorList {
	/// Joins every error into one line, `None` when the list is empty.
	pub fn summary(&self) -> Option<String> {
		summarize(&self.errors)
	}
}

/// Error aggregate raised from an [`ErrorList`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiErrors {
	/// HTTP status code.
	pub status: u16,
	/// Upstream request identifier.
	pub request_id: Option<String>,
	/// One entry per error in the payload.
	pub errors: Vec<ApiError>,
}
impl Display for ApiErrors {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "API call failed with HTTP status {}", self.status)?;

		match summarize(&self.errors) {
			Some(summary) => write!(f, ": {summary}."),
			None => f.write_str("."),
		}
	}
}
impl StdError for ApiErrors {}

/// Outcome of a call that reached the API.
#[derive(Clone, Debug)]
pub struct CallResult<T> {
	/// HTTP status code.
	pub status: u16,
	/// Decoded body of a 2xx response; `None` for empty bodies.
	pub body: Option<T>,
	/// Decoded error payload of a non-2xx response, when requested.
	pub error_list: Option<ErrorList>,
	/// Upstream request identifier.
	pub request_id: Option<String>,
	/// Sustained rate advertised for the operation, in requests per second.
	pub rate_limit: Option<f64>,
}
impl<T> CallResult<T> {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` for 4xx and 5xx statuses.
	pub fn is_error(&self) -> bool {
		(400..600).contains(&self.status)
	}

	/// Best-effort description of what went wrong, `None` for successful calls.
	pub fn error_summary(&self) -> Option<String> {
		if self.is_success() {
			return None;
		}

		self.error_list
			.as_ref()
			.and_then(ErrorList::summary)
			.or_else(|| Some(format!("HTTP status {}", self.status)))
	}

	/// Returns the decoded body of a successful call, or the error the response described.
	pub fn into_body(self) -> Result<Option<T>> {
		if self.is_success() {
			return Ok(self.body);
		}

		match self.error_list {
			Some(list) => Err(ApiErrors { status: self.status, request_id: self.request_id, errors: list.errors }.into()),
			None => Err(Error::UnexpectedStatus { status: self.status, request_id: self.request_id }),
		}
	}
}

fn summarize(errors: &[ApiError]) -> Option<String> {
	if errors.is_empty() {
		return None;
	}

	Some(errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))
}
