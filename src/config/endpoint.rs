//! Regional API endpoints, signing regions, and marketplace identifiers.

// self
use crate::_prelude::*;

/// Signing region of the API.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Region {
	/// `us-east-1`, serving the North America endpoint.
	UsEast1,
	/// `eu-west-1`, serving the Europe endpoint.
	EuWest1,
	/// `us-west-2`, serving the Far East endpoint.
	UsWest2,
	/// Any other region name.
	Custom(String),
}
impl Region {
	/// Region name as it appears in the credential scope.
	pub fn as_str(&self) -> &str {
		match self {
			Self::UsEast1 => "us-east-1",
			Self::EuWest1 => "eu-west-1",
			Self::UsWest2 => "us-west-2",
			Self::Custom(name) => name,
		}
	}
}
impl Display for Region {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<&str> for Region {
	fn from(value: &str) -> Self {
		match value {
			"us-east-1" => Self::UsEast1,
			"eu-west-1" => Self::EuWest1,
			"us-west-2" => Self::UsWest2,
			other => Self::Custom(other.to_owned()),
		}
	}
}

/// API endpoint the client talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
	/// `https://sellingpartnerapi-na.amazon.com`
	NorthAmerica,
	/// `https://sellingpartnerapi-eu.amazon.com`
	Europe,
	/// `https://sellingpartnerapi-fe.amazon.com`
	FarEast,
	/// Any other base URL, e.g. a sandbox or a local mock.
	Custom(Url),
}
impl Endpoint {
	/// Resolves the base URL.
	pub fn base_url(&self) -> Result<Url, url::ParseError> {
		match self {
			Self::NorthAmerica => Url::parse("https://sellingpartnerapi-na.amazon.com"),
			Self::Europe => Url::parse("https://sellingpartnerapi-eu.amazon.com"),
			Self::FarEast => Url::parse("https://sellingpartnerapi-fe.amazon.com"),
			Self::Custom(url) => Ok(url.clone()),
		}
	}

	/// Signing region paired with the preset, `None` for custom endpoints.
	pub fn region(&self) -> Option<Region> {
		match self {
			Self::NorthAmerica => Some(Region::UsEast1),
			Self::Europe => Some(Region::EuWest1),
			Self::FarEast => Some(Region::UsWest2),
			Self::Custom(_) => None,
		}
	}
}
impl From<Url> for Endpoint {
	fn from(value: Url) -> Self {
		Self::Custom(value)
	}
}

/// Marketplaces reachable through the regional endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Marketplace {
	Canada,
	UnitedStates,
	Mexico,
	Brazil,
	Spain,
	UnitedKingdom,
	France,
	Belgium,
	Netherlands,
	Germany,
	Italy,
	Sweden,
	Poland,
	Egypt,
	Turkey,
	SaudiArabia,
	UnitedArabEmirates,
	India,
	Singapore,
	Australia,
	Japan,
}
impl Marketplace {
	/// Marketplace identifier used in query parameters such as `marketplaceIds`.
	pub fn id(self) -> &'static str {
		match self {
			Self::Canada => "A2EUQ1WTGCTBG2",
			Self::UnitedStates => "ATVPDKIKX0DER",
			Self::Mexico => "A1AM78C64UM0Y8",
			Self::Brazil => "A2Q3Y263D00KWC",
			Self::Spain => "A1RKKUPIHCS9HS",
			Self::UnitedKingdom => "A1F83G8C2ARO7P",
			Self::France => "A13V1IB3VIYZZH",
			Self::Belgium => "AMEN7PMS3EDWL",
			Self::Netherlands => "A1805IZSGTT6HS",
			Self::Germany => "A1PA6795UKMFR9",
			Self::Italy => "APJ6JRA9NG5V4",
			Self::Sweden => "A2NODRKZP88ZB9",
			Self::Poland => "A1C3SOZRARQ6R3",
			Self::Egypt => "ARBP9OOSHTCHU",
			Self::Turkey => "A33AVAJ2PDY3EV",
			Self::SaudiArabia => "A17E79C6D8DWNP",
			Self::UnitedArabEmirates => "A2VIGQ35RCS4UG",
			Self::India => "A21TJRUUN4KGV",
			Self::Singapore => "A19VAU5U5O7RUS",
			Self::Australia => "A39IBJ37TRP1C6",
			Self::Japan => "A1VC38T7YXB528",
		}
	}

	/// Regional endpoint serving the marketplace.
	pub fn endpoint(self) -> Endpoint {
		match self {
			Self::Canada | Self::UnitedStates | Self::Mexico | Self::Brazil => Endpoint::NorthAmerica,
			Self::Singapore | Self::Australia | Self::Japan => Endpoint::FarEast,
			_ => Endpoint::Europe,
		}
	}
}
impl Display for Marketplace {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.id())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn presets_pair_endpoints_with_regions() {
		let url = Endpoint::Europe.base_url().expect("Preset URL should parse.");

		assert_eq!(url.as_str(), "https://sellingpartnerapi-eu.amazon.com/");
		assert_eq!(Endpoint::FarEast.region(), Some(Region::UsWest2));
		assert_eq!(Marketplace::Germany.endpoint(), Endpoint::Europe);
		assert_eq!(Marketplace::Japan.endpoint().region(), Some(Region::UsWest2));
		assert_eq!(Region::from("eu-west-1"), Region::EuWest1);
		assert_eq!(Region::from("ap-south-1").as_str(), "ap-south-1");
	}
}
