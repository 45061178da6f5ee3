use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    optional_text, parse_date, positive_amount, require_text, set_if, set_optional, Entity,
    EntityFields, PropertyFields,
};
use crate::error::ValidationError;
use crate::id::EntityId;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email validation pattern to compile")
});

choice_enum!(
    TenantStatus {
        Active => "active",
        Inactive => "inactive",
        Pending => "pending",
    }
);

impl Default for TenantStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantFields {
    #[serde(alias = "fullName", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: TenantStatus,
}

impl TenantFields {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_rent(mut self, rent: f64) -> Self {
        self.rent_amount = Some(rent);
        self
    }

    pub fn with_lease(mut self, start: &str, end: &str) -> Self {
        self.lease_start = Some(start.to_string());
        self.lease_end = Some(end.to_string());
        self
    }

    /// Links the tenant to a property and caches its display name. The name
    /// is a copy; renaming the property later leaves it stale.
    pub fn assign_property(&mut self, property: &Entity<PropertyFields>) {
        self.property_id = Some(property.id.clone());
        self.property_name = Some(property.fields.name.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPatch {
    #[serde(alias = "fullName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TenantStatus>,
}

impl EntityFields for TenantFields {
    type Status = TenantStatus;
    type Patch = TenantPatch;

    const KIND: &'static str = "tenants";

    fn status(&self) -> TenantStatus {
        self.status
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = ValidationError::new();
        require_text(&mut issues, "name", &self.name);
        let email = self.email.trim();
        if email.is_empty() {
            issues.push("email", "is required");
        } else if !EMAIL_PATTERN.is_match(email) {
            issues.push("email", "is not a valid address");
        }
        optional_text(&mut issues, "phone", self.phone.as_deref());
        positive_amount(&mut issues, "rentAmount", self.rent_amount);
        let start = parse_date(&mut issues, "leaseStart", self.lease_start.as_deref());
        let end = parse_date(&mut issues, "leaseEnd", self.lease_end.as_deref());
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                issues.push("leaseEnd", "must not be before leaseStart");
            }
        }
        issues.into_result()
    }

    fn apply_patch(&mut self, patch: &TenantPatch) {
        set_if(&mut self.name, &patch.name);
        set_if(&mut self.email, &patch.email);
        set_optional(&mut self.phone, &patch.phone);
        set_optional(&mut self.property_id, &patch.property_id);
        set_optional(&mut self.property_name, &patch.property_name);
        set_optional(&mut self.rent_amount, &patch.rent_amount);
        set_optional(&mut self.lease_start, &patch.lease_start);
        set_optional(&mut self.lease_end, &patch.lease_end);
        set_optional(&mut self.notes, &patch.notes);
        set_if(&mut self.status, &patch.status);
    }

    fn search_fields(&self) -> Vec<&str> {
        [
            Some(self.name.as_str()),
            Some(self.email.as_str()),
            self.property_name.as_deref(),
            self.phone.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn examples() -> Vec<Self> {
        let tenant = |name: &str, email: &str, phone: &str, property: &str, rent: f64, status| {
            Self {
                phone: Some(phone.to_string()),
                property_name: Some(property.to_string()),
                ..Self::new(name, email)
                    .with_rent(rent)
                    .with_lease("2024-01-01", "2024-12-31")
                    .with_status(status)
            }
        };
        vec![
            tenant("John Smith", "john.smith@example.com", "+27 82 123 4567", "Sunset Villa", 8_500.0, TenantStatus::Active),
            tenant("Sarah Johnson", "sarah.j@example.com", "+27 83 234 5678", "Mountain View Apartments", 7_200.0, TenantStatus::Active),
            tenant("Michael Brown", "m.brown@example.com", "+27 84 345 6789", "City Center Complex", 15_000.0, TenantStatus::Active),
            tenant("Emma Wilson", "emma.w@example.com", "+27 85 456 7890", "Garden House", 6_800.0, TenantStatus::Pending),
            tenant("David Lee", "david.lee@example.com", "+27 86 567 8901", "Lake View", 7_800.0, TenantStatus::Inactive),
        ]
    }
}
