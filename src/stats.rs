//! Dashboard summary figures for each entity type.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::{
    Choice, Entity, EntityFields, PaymentFields, PaymentStatus, PropertyFields, TenantFields, TenantStatus,
};

/// Rounded percentage of `part` in `whole`, or 0 when `whole` is zero.
fn percent(part: f64, whole: f64) -> u32 {
    if whole <= 0.0 {
        0
    } else {
        ((part / whole) * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

/// Count per status name, including statuses with no records.
fn count_by_status<F: EntityFields>(entities: &[Entity<F>]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = F::Status::ALL
        .iter()
        .map(|choice| (choice.as_str().to_string(), 0))
        .collect();
    for entity in entities {
        *counts.entry(entity.status().as_str().to_string()).or_default() += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    pub total: usize,
    pub total_units: u64,
    pub occupied_units: u64,
    pub vacancy_rate: u32,
    pub by_status: BTreeMap<String, usize>,
}

pub fn property_summary(properties: &[Entity<PropertyFields>]) -> PropertySummary {
    let total_units: u64 = properties.iter().map(|p| u64::from(p.fields.units)).sum();
    let occupied_units: u64 = properties
        .iter()
        .map(|p| u64::from(p.fields.occupied_units.min(p.fields.units)))
        .sum();
    let vacant = total_units.saturating_sub(occupied_units);
    PropertySummary {
        total: properties.len(),
        total_units,
        occupied_units,
        vacancy_rate: percent(vacant as f64, total_units as f64),
        by_status: count_by_status(properties),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    /// Sum of `rentAmount` across all tenants.
    pub total_rent: f64,
}

pub fn tenant_summary(tenants: &[Entity<TenantFields>]) -> TenantSummary {
    TenantSummary {
        total: tenants.len(),
        active: tenants
            .iter()
            .filter(|t| t.status() == TenantStatus::Active)
            .count(),
        pending: tenants
            .iter()
            .filter(|t| t.status() == TenantStatus::Pending)
            .count(),
        total_rent: tenants.iter().filter_map(|t| t.fields.rent_amount).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub collected: f64,
    pub pending: f64,
    pub overdue: f64,
    pub total_expected: f64,
    pub collection_rate: u32,
}

pub fn payment_summary(payments: &[Entity<PaymentFields>]) -> PaymentSummary {
    let sum = |status: PaymentStatus| -> f64 {
        payments
            .iter()
            .filter(|p| p.status() == status)
            .map(|p| p.fields.amount)
            .sum()
    };
    let collected = sum(PaymentStatus::Completed);
    let pending = sum(PaymentStatus::Pending);
    let overdue = sum(PaymentStatus::Overdue);
    let total_expected = collected + pending + overdue;
    PaymentSummary {
        collected,
        pending,
        overdue,
        total_expected,
        collection_rate: percent(collected, total_expected),
    }
}
