use serde::{Deserialize, Serialize};

use super::{parse_date, set_if, set_optional, Entity, EntityFields, TenantFields};
use crate::error::ValidationError;
use crate::id::EntityId;

choice_enum!(
    PaymentStatus {
        Completed => "completed",
        Pending => "pending",
        Overdue => "overdue",
    }
);

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

choice_enum!(
    PaymentMethod {
        BankTransfer => "bank_transfer",
        Eft => "eft",
        Cash => "cash",
        Card => "card",
        Other => "other",
    }
);

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::BankTransfer
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFields {
    #[serde(default)]
    pub tenant_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
}

impl PaymentFields {
    pub fn new(tenant_id: impl Into<EntityId>, amount: f64, date: &str) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            amount,
            date: date.to_string(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Points the payment at a tenant, copying the tenant's name and the
    /// property the tenant rents.
    pub fn assign_tenant(&mut self, tenant: &Entity<TenantFields>) {
        self.tenant_id = tenant.id.clone();
        self.tenant_name = Some(tenant.fields.name.clone());
        self.property_id.clone_from(&tenant.fields.property_id);
        self.property_name.clone_from(&tenant.fields.property_name);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
}

impl EntityFields for PaymentFields {
    type Status = PaymentStatus;
    type Patch = PaymentPatch;

    const KIND: &'static str = "payments";

    fn status(&self) -> PaymentStatus {
        self.status
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = ValidationError::new();
        if self.tenant_id.as_str().trim().is_empty() {
            issues.push("tenantId", "is required");
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            issues.push("amount", "must be greater than zero");
        }
        if self.date.trim().is_empty() {
            issues.push("date", "is required");
        } else {
            parse_date(&mut issues, "date", Some(&self.date));
        }
        issues.into_result()
    }

    fn apply_patch(&mut self, patch: &PaymentPatch) {
        set_if(&mut self.tenant_id, &patch.tenant_id);
        set_optional(&mut self.tenant_name, &patch.tenant_name);
        set_optional(&mut self.property_id, &patch.property_id);
        set_optional(&mut self.property_name, &patch.property_name);
        set_if(&mut self.amount, &patch.amount);
        set_if(&mut self.date, &patch.date);
        set_if(&mut self.method, &patch.method);
        set_optional(&mut self.reference, &patch.reference);
        set_optional(&mut self.notes, &patch.notes);
        set_if(&mut self.status, &patch.status);
    }

    fn search_fields(&self) -> Vec<&str> {
        [
            self.tenant_name.as_deref(),
            self.property_name.as_deref(),
            self.reference.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn examples() -> Vec<Self> {
        let payment = |tenant: &str, property: &str, amount: f64, date: &str, method, reference: &str, status| {
            Self {
                tenant_name: Some(tenant.to_string()),
                property_name: Some(property.to_string()),
                method,
                ..Self::new(EntityId::from(tenant.to_lowercase().replace(' ', "-")), amount, date)
                    .with_reference(reference)
                    .with_status(status)
            }
        };
        use PaymentMethod::*;
        use PaymentStatus::*;
        vec![
            payment("John Smith", "Sunset Villa", 8_500.0, "2024-03-01", BankTransfer, "RENT-MAR-001", Completed),
            payment("Sarah Johnson", "Mountain View Apartments", 7_200.0, "2024-03-01", Eft, "RENT-MAR-002", Completed),
            payment("Michael Brown", "City Center Complex", 15_000.0, "2024-03-05", BankTransfer, "RENT-MAR-003", Pending),
            payment("Emma Wilson", "Garden House", 6_800.0, "2024-02-01", Cash, "RENT-FEB-004", Overdue),
        ]
    }
}
