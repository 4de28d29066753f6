//! Access to the iiko server API.
//!
//! `ReportingApi` is the seam between the report commands and the network. `IikoClient` talks to
//! a real server; `FixtureClient` serves seeded data from memory so the whole program can run
//! top-to-bottom offline.

mod fixture;
mod iiko;

use crate::config::BaseConfig;
use crate::period::Period;
use crate::resolver::{EntityKind, ReferenceDictionary, ReferenceResolver};
use crate::{Config, Result};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::fmt::{Debug, Formatter};
use tracing::{debug, warn};

#[cfg(test)]
pub use fixture::Fixture;
pub use fixture::FixtureClient;
pub use iiko::IikoClient;

/// When set and non-empty, `Mode::from_env` selects the offline fixture client.
pub const TEST_MODE_ENV: &str = "IIKO_REPORT_IN_TEST_MODE";

/// Whether to talk to real iiko servers or to the in-memory fixtures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Iiko,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(s) if !s.is_empty() => Mode::Test,
            _ => Mode::Iiko,
        }
    }
}

/// The login and password used for every selected server.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// The server expects the hex SHA-1 of the password rather than the password itself.
    pub fn password_hash(&self) -> String {
        hex::encode(Sha1::digest(self.password.as_bytes()))
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"****")
            .finish()
    }
}

/// The calls the reports need from an iiko server. Every payload is returned as raw JSON; shaping
/// it is left to the normalizer and the enricher.
#[async_trait::async_trait]
pub trait ReportingApi: Send {
    /// Logs in and keeps the session key for the calls that follow.
    async fn authenticate(&mut self) -> Result<()>;

    /// Runs the saved OLAP report `preset_id` over `period`.
    async fn olap_by_preset(&mut self, preset_id: &str, period: &Period) -> Result<Value>;

    /// Fetches the write-off acts dated within `period`.
    async fn writeoff_documents(&mut self, period: &Period) -> Result<Value>;

    /// Fetches the bulk listing that the dictionary for `kind` is built from.
    async fn listing(&mut self, kind: EntityKind) -> Result<Value>;
}

/// Creates the client for one configured server.
pub fn client(
    config: &Config,
    base: &BaseConfig,
    credentials: &Credentials,
    mode: Mode,
) -> Result<Box<dyn ReportingApi>> {
    match mode {
        Mode::Iiko => Ok(Box::new(IikoClient::new(
            base.url(),
            credentials.clone(),
            config.accept_invalid_certs(),
        )?)),
        Mode::Test => Ok(Box::new(FixtureClient::new(base.id(), credentials.clone()))),
    }
}

/// Loads the four reference dictionaries. A listing that cannot be fetched is logged and left
/// unloaded, so its ids resolve to the fallback label.
pub async fn load_resolver(api: &mut dyn ReportingApi) -> ReferenceResolver {
    let mut resolver = ReferenceResolver::new();
    for kind in EntityKind::ALL {
        match api.listing(kind).await {
            Ok(listing) => {
                let dictionary = ReferenceDictionary::from_listing(kind, &listing);
                if dictionary.is_empty() {
                    warn!("The {kind} listing has no usable entries");
                } else {
                    debug!("{kind} dictionary has {} entries", dictionary.len());
                }
                resolver = resolver.with(kind, dictionary);
            }
            Err(e) => warn!("Unable to load the {kind} listing: {e:#}"),
        }
    }
    resolver
}

/// `dateFrom`/`dateTo` for OLAP presets: midnight at the start of the period and midnight after
/// its last day.
pub(crate) fn olap_range(period: &Period) -> (String, String) {
    const OLAP_FORMAT: &str = "%Y-%m-%dT00:00:00";
    (
        period.from().format(OLAP_FORMAT).to_string(),
        period.end_exclusive().format(OLAP_FORMAT).to_string(),
    )
}

/// `dateFrom`/`dateTo` for documents: plain inclusive dates.
pub(crate) fn document_range(period: &Period) -> (String, String) {
    const DOCUMENT_FORMAT: &str = "%Y-%m-%d";
    (
        period.from().format(DOCUMENT_FORMAT).to_string(),
        period.to().format(DOCUMENT_FORMAT).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash() {
        let credentials = Credentials::new("admin", "password");
        assert_eq!(
            credentials.password_hash(),
            "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8"
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let s = format!("{:?}", Credentials::new("admin", "secret"));
        assert!(s.contains("admin"));
        assert!(!s.contains("secret"));
    }

    #[test]
    fn test_ranges() {
        let period = Period::parse("01.03.2024", "31.03.2024").unwrap();
        assert_eq!(
            olap_range(&period),
            (
                "2024-03-01T00:00:00".to_string(),
                "2024-04-01T00:00:00".to_string()
            )
        );
        assert_eq!(
            document_range(&period),
            ("2024-03-01".to_string(), "2024-03-31".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_resolver_from_fixture() {
        let mut api = FixtureClient::new("load-resolver", Credentials::new("a", "b"));
        api.authenticate().await.unwrap();
        let resolver = load_resolver(&mut api).await;
        for kind in EntityKind::ALL {
            assert!(resolver.is_loaded(kind), "{kind}");
        }
    }

    #[tokio::test]
    async fn test_load_resolver_tolerates_failures() {
        // Listings fail before authentication
        let mut api = FixtureClient::new("unauthenticated", Credentials::new("a", "b"));
        let resolver = load_resolver(&mut api).await;
        assert!(!resolver.is_loaded(EntityKind::Store));
        assert_eq!(resolver.resolve(EntityKind::Store, Some("x")), "Неизвестно");
    }
}
