//! Strongly-typed identifiers.

use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlanError;

/// Identifier of a product (the `product_item` key of the demand table).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(String);

impl ProductKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProductKey {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PlanError::invalid_id("ProductKey: empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Name under which a forecast provider is registered.
///
/// The standard set is `arima`, `lstm` and `xgb`; other names are accepted so
/// new strategies can be plugged in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderName(Cow<'static, str>);

impl ProviderName {
    pub const ARIMA: ProviderName = ProviderName(Cow::Borrowed("arima"));
    pub const LSTM: ProviderName = ProviderName(Cow::Borrowed("lstm"));
    pub const XGB: ProviderName = ProviderName(Cow::Borrowed("xgb"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The standard provider set, in blending order.
    pub fn standard() -> Vec<ProviderName> {
        vec![Self::ARIMA, Self::LSTM, Self::XGB]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a pipeline run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered) so run summaries sort by start time.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RunId {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s).map_err(|e| PlanError::invalid_id(format!("RunId: {e}")))?;
        Ok(Self(uuid))
    }
}
