//! Implements `ReportingApi` with in-memory data for testing purposes.
//!
//! Note: this is compiled even in the production build so that the whole app can run
//! top-to-bottom with `IIKO_REPORT_IN_TEST_MODE` set, without an iiko server.

use crate::api::{Credentials, ReportingApi};
use crate::period::Period;
use crate::resolver::EntityKind;
use crate::Result;
use anyhow::{bail, ensure, Context};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use tracing::trace;

/// Per-base overrides. Bases without an entry are served `Fixture::default()`.
static FIXTURES: LazyLock<Mutex<HashMap<String, Fixture>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The payloads one fake server returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    /// Whether the login is refused.
    pub reject_login: bool,
    pub olap: Value,
    pub writeoffs: Value,
    pub listings: HashMap<EntityKind, Value>,
}

#[cfg(test)]
impl Fixture {
    /// A server that returns no data at all.
    pub fn empty() -> Self {
        Self {
            reject_login: false,
            olap: serde_json::json!({ "data": [] }),
            writeoffs: serde_json::json!({ "response": [] }),
            listings: HashMap::new(),
        }
    }

    /// A server that refuses every login.
    pub fn rejecting() -> Self {
        Self {
            reject_login: true,
            ..Self::empty()
        }
    }
}

impl Default for Fixture {
    /// The seed data from this module.
    fn default() -> Self {
        let listings = HashMap::from([
            (EntityKind::Store, seed(STORES)),
            (EntityKind::Account, seed(ACCOUNTS)),
            (EntityKind::Conception, seed(CONCEPTIONS)),
            (EntityKind::Product, seed(PRODUCTS)),
        ]);
        Self {
            reject_login: false,
            olap: seed(OLAP),
            writeoffs: seed(WRITEOFFS),
            listings,
        }
    }
}

/// Parses one of the seed documents below, which are known to be valid JSON.
fn seed(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or(Value::Null)
}

/// An implementation of `ReportingApi` that serves the `Fixture` registered for its base id.
pub struct FixtureClient {
    base_id: String,
    credentials: Credentials,
    authenticated: bool,
}

impl FixtureClient {
    pub fn new(base_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_id: base_id.into(),
            credentials,
            authenticated: false,
        }
    }

    /// Registers the payloads served for `base_id`, replacing the seed data.
    #[cfg(test)]
    pub fn set_fixture(base_id: impl Into<String>, fixture: Fixture) {
        if let Ok(mut fixtures) = FIXTURES.lock() {
            fixtures.insert(base_id.into(), fixture);
        }
    }

    fn fixture(&self) -> Result<Fixture> {
        let fixtures = FIXTURES
            .lock()
            .map_err(|_| anyhow::anyhow!("The fixture registry is poisoned"))?;
        Ok(fixtures.get(&self.base_id).cloned().unwrap_or_default())
    }

    fn ensure_authenticated(&self) -> Result<()> {
        ensure!(
            self.authenticated,
            "Not logged in, authenticate before requesting data"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReportingApi for FixtureClient {
    async fn authenticate(&mut self) -> Result<()> {
        if !self.credentials.has_password() || self.fixture()?.reject_login {
            bail!(
                "Authentication failed: login '{}' was refused by {}",
                self.credentials.login(),
                self.base_id
            );
        }
        self.authenticated = true;
        Ok(())
    }

    async fn olap_by_preset(&mut self, preset_id: &str, period: &Period) -> Result<Value> {
        self.ensure_authenticated()?;
        trace!("Fixture OLAP {preset_id} for {period}");
        Ok(self.fixture()?.olap)
    }

    async fn writeoff_documents(&mut self, period: &Period) -> Result<Value> {
        self.ensure_authenticated()?;
        trace!("Fixture write-offs for {period}");
        Ok(self.fixture()?.writeoffs)
    }

    async fn listing(&mut self, kind: EntityKind) -> Result<Value> {
        self.ensure_authenticated()?;
        self.fixture()?
            .listings
            .remove(&kind)
            .with_context(|| format!("{} has no {kind} listing", self.base_id))
    }
}

const OLAP: &str = r#"{"data": [
  {"RestorauntGroup": "Зал", "WeekInMonthOpen": 1, "DayOfWeekOpen": "1. Понедельник", "OpenDate.Typed": "2024-03-04T00:00:00", "DishCategory": "Напитки", "DishDiscountSumInt": 12500.5, "GuestNum": 41, "DishAmountInt": 96, "UniqOrderId": 30},
  {"RestorauntGroup": "Зал", "WeekInMonthOpen": 1, "DayOfWeekOpen": "2. Вторник", "OpenDate.Typed": "2024-03-05T00:00:00", "DishCategory": " Горячее", "DishDiscountSumInt": 18300, "GuestNum": 52, "DishAmountInt": 120, "UniqOrderId": 37},
  {"RestorauntGroup": "Зал", "WeekInMonthOpen": 2, "DayOfWeekOpen": "1. Понедельник", "OpenDate.Typed": "2024-03-11T00:00:00", "DishCategory": "Напитки", "DishDiscountSumInt": 9800, "GuestNum": 33, "DishAmountInt": 71, "UniqOrderId": 25},
  {"RestorauntGroup": "Доставка", "WeekInMonthOpen": 1, "DayOfWeekOpen": "3. Среда", "OpenDate.Typed": "2024-03-06T00:00:00", "DishCategory": "", "DishGroup": "Пицца", "DishDiscountSumInt": 7450, "GuestNum": 0, "DishAmountInt": 18, "UniqOrderId": 12},
  {"RestorauntGroup": "Доставка", "OpenDate.Typed": "2024-03-14T00:00:00", "DishCategory": " Горячее", "DishDiscountSumInt": "3100", "GuestNum": 0, "DishAmountInt": 6, "UniqOrderId": 4}
]}"#;

const WRITEOFFS: &str = r#"{"response": [
  {"dateIncoming": "2024-03-05T10:15:00.000", "documentNumber": "0001", "status": "PROCESSED", "comment": "Истёк срок годности", "storeId": "store-1", "accountId": "account-1", "conceptionId": "conception-1",
   "items": [{"productId": "product-1", "amount": 2, "cost": 180.4}, {"productId": "product-2", "amount": 0.5, "cost": 95}]},
  {"dateIncoming": "2024-03-12T18:40", "documentNumber": "0002", "status": "NEW", "comment": "", "storeId": "store-1", "accountId": "account-2",
   "items": [{"productId": "product-3", "amount": 1}]}
]}"#;

const STORES: &str = r#"[
  {"id": "store-1", "name": "Основной склад", "type": "INVENTORY_ASSETS"},
  {"id": "cash-1", "name": "Касса", "type": "CASH"}
]"#;

const ACCOUNTS: &str = r#"[
  {"id": "account-1", "name": "Списание порчи"},
  {"id": "account-2", "name": "Представительские расходы"}
]"#;

const CONCEPTIONS: &str = r#"[
  {"id": "conception-1", "name": "Пиццерия", "rootType": "Conception"}
]"#;

const PRODUCTS: &str = r#"[
  {"id": "product-1", "name": "Молоко 3,2%"},
  {"id": "product-2", "name": "Сыр моцарелла"}
]"#;
