//! Authority-host resolution for identity-provider endpoints.
//!
//! The resolved host always has a scheme, a host, and a path ending in `/`, so tenant and
//! endpoint suffixes can be joined onto it with [`Url::join`].

// std
use std::sync::LazyLock;
// self
use crate::{_prelude::*, error::ConfigError};

/// Azure China cloud authority.
pub const AZURE_CHINA: &str = "https://login.chinacloudapi.cn/";
/// Azure Germany cloud authority.
pub const AZURE_GERMANY: &str = "https://login.microsoftonline.de/";
/// Azure US Government cloud authority.
pub const AZURE_GOVERNMENT: &str = "https://login.microsoftonline.us/";
/// Azure public cloud authority; the built-in default.
pub const AZURE_PUBLIC_CLOUD: &str = "https://login.microsoftonline.com/";

/// Environment variable that replaces the built-in default authority.
pub const AUTHORITY_HOST_ENV: &str = "AZURE_AUTHORITY_HOST";

static KNOWN_AUTHORITY_HOSTS: LazyLock<BTreeMap<AzureCloud, Url>> = LazyLock::new(|| {
	AzureCloud::ALL
		.into_iter()
		.filter_map(|cloud| Url::parse(cloud.authority_host_str()).ok().map(|url| (cloud, url)))
		.collect()
});

/// Well-known national and public clouds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AzureCloud {
	/// Global public cloud.
	Public,
	/// China cloud.
	China,
	/// Germany cloud.
	Germany,
	/// US Government cloud.
	Government,
}
impl AzureCloud {
	/// Every known cloud.
	pub const ALL: [Self; 4] = [Self::Public, Self::China, Self::Germany, Self::Government];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Public => "public",
			Self::China => "china",
			Self::Germany => "germany",
			Self::Government => "government",
		}
	}

	/// Authority URL literal for the cloud.
	pub const fn authority_host_str(self) -> &'static str {
		match self {
			Self::Public => AZURE_PUBLIC_CLOUD,
			Self::China => AZURE_CHINA,
			Self::Germany => AZURE_GERMANY,
			Self::Government => AZURE_GOVERNMENT,
		}
	}

	/// Parsed authority URL for the cloud.
	pub fn authority_host(self) -> &'static Url {
		&KNOWN_AUTHORITY_HOSTS[&self]
	}

	/// Read-only mapping of every known cloud.
	pub fn known_authority_hosts() -> &'static BTreeMap<AzureCloud, Url> {
		&KNOWN_AUTHORITY_HOSTS
	}
}
impl Display for AzureCloud {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Resolves the authority host against the real process environment.
///
/// An explicit host wins outright. Otherwise a non-empty `AZURE_AUTHORITY_HOST` replaces the
/// public-cloud default.
pub fn resolve_authority_host(explicit: Option<&str>) -> Result<Url, ConfigError> {
	resolve_authority_host_with(explicit, |key| std::env::var(key).ok())
}

/// Same as [`resolve_authority_host`] with an injectable environment lookup.
pub fn resolve_authority_host_with<F>(explicit: Option<&str>, env: F) -> Result<Url, ConfigError>
where
	F: FnOnce(&str) -> Option<String>,
{
	let raw = match explicit {
		Some(value) => value.to_owned(),
		None => env(AUTHORITY_HOST_ENV)
			.filter(|value| !value.is_empty())
			.unwrap_or_else(|| AZURE_PUBLIC_CLOUD.to_owned()),
	};

	parse_authority_host(&raw)
}

/// Parses and normalizes an authority-host string.
pub fn parse_authority_host(raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw)
		.map_err(|source| ConfigError::InvalidAuthorityHost { value: raw.to_owned(), source })?;

	if url.host_str().is_none_or(str::is_empty) {
		return Err(ConfigError::AuthorityHostWithoutHost { value: raw.to_owned() });
	}

	Ok(normalize_authority_host(url))
}

/// Appends `/` to the path unless it already ends with one. Idempotent.
pub fn normalize_authority_host(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}
