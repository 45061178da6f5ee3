use serde::{Deserialize, Serialize};

use super::{optional_text, positive_amount, require_text, set_if, set_optional, EntityFields};
use crate::error::ValidationError;

choice_enum!(
    PropertyStatus {
        Active => "active",
        Occupied => "occupied",
        Inactive => "inactive",
        Maintenance => "maintenance",
        Vacant => "vacant",
    }
);

impl Default for PropertyStatus {
    fn default() -> Self {
        Self::Active
    }
}

choice_enum!(
    PropertyType {
        Residential => "residential",
        Commercial => "commercial",
        Mixed => "mixed",
    }
);

impl Default for PropertyType {
    fn default() -> Self {
        Self::Residential
    }
}

fn default_units() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFields {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default = "default_units")]
    pub units: u32,
    #[serde(default)]
    pub occupied_units: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub status: PropertyStatus,
}

impl PropertyFields {
    /// Single-unit active residential property with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            city: None,
            postal_code: None,
            property_type: PropertyType::default(),
            units: default_units(),
            occupied_units: 0,
            value: None,
            rent: None,
            bedrooms: None,
            bathrooms: None,
            description: None,
            amenities: Vec::new(),
            status: PropertyStatus::default(),
        }
    }

    pub fn with_status(mut self, status: PropertyStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_rent(mut self, rent: f64) -> Self {
        self.rent = Some(rent);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>, city: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self.city = Some(city.into());
        self
    }

    pub fn with_units(mut self, units: u32, occupied: u32) -> Self {
        self.units = units;
        self.occupied_units = occupied;
        self
    }

    #[allow(clippy::too_many_arguments)]
    fn example(
        name: &str,
        address: &str,
        city: &str,
        property_type: PropertyType,
        (units, occupied): (u32, u32),
        value: f64,
        rent: f64,
        status: PropertyStatus,
    ) -> Self {
        Self {
            property_type,
            value: Some(value),
            status,
            ..Self::named(name)
                .with_address(address, city)
                .with_units(units, occupied)
                .with_rent(rent)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupied_units: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PropertyStatus>,
}

impl EntityFields for PropertyFields {
    type Status = PropertyStatus;
    type Patch = PropertyPatch;

    const KIND: &'static str = "properties";

    fn status(&self) -> PropertyStatus {
        self.status
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = ValidationError::new();
        require_text(&mut issues, "name", &self.name);
        optional_text(&mut issues, "address", self.address.as_deref());
        optional_text(&mut issues, "city", self.city.as_deref());
        if self.units == 0 {
            issues.push("units", "must be at least 1");
        }
        if self.occupied_units > self.units {
            issues.push("occupiedUnits", "cannot exceed units");
        }
        positive_amount(&mut issues, "value", self.value);
        positive_amount(&mut issues, "rent", self.rent);
        if matches!(self.bathrooms, Some(b) if !b.is_finite() || b < 0.0) {
            issues.push("bathrooms", "must not be negative");
        }
        issues.into_result()
    }

    fn apply_patch(&mut self, patch: &PropertyPatch) {
        set_if(&mut self.name, &patch.name);
        set_optional(&mut self.address, &patch.address);
        set_optional(&mut self.city, &patch.city);
        set_optional(&mut self.postal_code, &patch.postal_code);
        set_if(&mut self.property_type, &patch.property_type);
        set_if(&mut self.units, &patch.units);
        set_if(&mut self.occupied_units, &patch.occupied_units);
        set_optional(&mut self.value, &patch.value);
        set_optional(&mut self.rent, &patch.rent);
        set_optional(&mut self.bedrooms, &patch.bedrooms);
        set_optional(&mut self.bathrooms, &patch.bathrooms);
        set_optional(&mut self.description, &patch.description);
        set_if(&mut self.amenities, &patch.amenities);
        set_if(&mut self.status, &patch.status);
    }

    fn search_fields(&self) -> Vec<&str> {
        [
            Some(self.name.as_str()),
            self.address.as_deref(),
            self.city.as_deref(),
            self.description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn examples() -> Vec<Self> {
        use PropertyStatus::*;
        use PropertyType::*;
        vec![
            Self::example("Sunset Villa", "123 Beach Rd", "Cape Town", Residential, (3, 2), 3_500_000.0, 8_500.0, Active),
            Self::example("Mountain View Apartments", "456 Hill St", "Johannesburg", Residential, (12, 10), 12_000_000.0, 7_200.0, Active),
            Self::example("City Center Complex", "789 Main Rd", "Durban", Commercial, (20, 15), 25_000_000.0, 15_000.0, Active),
            Self::example("Garden House", "12 Rose Ave", "Pretoria", Mixed, (8, 6), 8_500_000.0, 6_800.0, Active),
            Self::example("Lake View", "5 Shore Ln", "Port Elizabeth", Residential, (5, 3), 5_200_000.0, 7_800.0, Maintenance),
            Self::example("University Apartments", "88 Campus Rd", "Stellenbosch", Residential, (10, 4), 6_500_000.0, 4_500.0, Vacant),
        ]
    }
}
