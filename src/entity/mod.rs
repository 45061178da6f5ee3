//! Typed records managed by the stores.
//!
//! An [`Entity`] wraps the per-type field struct with the bookkeeping every
//! record shares: server id, timestamps and the unsynced marker. The field
//! struct is flattened, so the wire shape is one camelCase JSON object.

use std::fmt::Debug;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::EntityId;
use crate::time::deserialize_timestamp;

/// Closed set of string values, such as a status or a payment method.
pub trait Choice:
    Copy + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.as_str().eq_ignore_ascii_case(value))
    }
}

macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident => $text:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( #[serde(rename = $text)] $variant, )+
        }

        impl $crate::entity::Choice for $name {
            const ALL: &'static [Self] = &[ $( $name::$variant ),+ ];

            fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::entity::Choice::as_str(*self))
            }
        }
    };
}

mod payment;
mod property;
mod tenant;

pub use payment::{PaymentFields, PaymentMethod, PaymentPatch, PaymentStatus};
pub use property::{PropertyFields, PropertyPatch, PropertyStatus, PropertyType};
pub use tenant::{TenantFields, TenantPatch, TenantStatus};

/// Field set of one entity type plus the rules the store applies to it.
pub trait EntityFields:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Status: Choice;
    /// Partial update body; `None` members leave the field untouched.
    type Patch: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Collection name used in API paths and cache keys.
    const KIND: &'static str;

    fn status(&self) -> Self::Status;

    /// Checks required and range-limited fields, reporting every failure.
    fn validate(&self) -> Result<(), ValidationError>;

    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Values matched by free-text search, in display order.
    fn search_fields(&self) -> Vec<&str>;

    /// Example records offered on a first run with no data at all.
    fn examples() -> Vec<Self> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity<F> {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: F,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: i64,
    /// Set while a local change has not been confirmed by the API.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unsynced: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl<F: EntityFields> Entity<F> {
    pub fn new(id: impl Into<EntityId>, fields: F, now: i64) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at: now,
            updated_at: now,
            unsynced: false,
        }
    }

    /// Record synthesized while the API is unreachable.
    pub fn local(fields: F, now: i64) -> Self {
        Self {
            unsynced: true,
            ..Self::new(EntityId::local(), fields, now)
        }
    }

    pub fn status(&self) -> F::Status {
        self.fields.status()
    }

    /// Fills timestamps the server left out.
    pub fn normalize_timestamps(&mut self, now: i64) {
        if self.created_at <= 0 {
            self.created_at = now;
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }

    /// `needle` must already be lowercase.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        needle.is_empty()
            || self
                .fields
                .search_fields()
                .iter()
                .any(|value| value.to_lowercase().contains(needle))
    }
}

pub(crate) fn require_text(issues: &mut ValidationError, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        issues.push(field, "is required");
    }
}

pub(crate) fn optional_text(issues: &mut ValidationError, field: &'static str, value: Option<&str>) {
    if matches!(value, Some(v) if v.trim().is_empty()) {
        issues.push(field, "must not be blank when provided");
    }
}

pub(crate) fn positive_amount(issues: &mut ValidationError, field: &'static str, value: Option<f64>) {
    if let Some(amount) = value {
        if !amount.is_finite() || amount <= 0.0 {
            issues.push(field, "must be greater than zero");
        }
    }
}

pub(crate) fn parse_date(
    issues: &mut ValidationError,
    field: &'static str,
    value: Option<&str>,
) -> Option<NaiveDate> {
    let value = value?;
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            issues.push(field, "must be a YYYY-MM-DD date");
            None
        }
    }
}

pub(crate) fn set_if<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

pub(crate) fn set_optional<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        target.clone_from(value);
    }
}
