//! Roster records (technicians and customers)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The six address components, in display order
pub const ADDRESS_FIELDS: [&str; 6] = [
    "address_one",
    "address_two",
    "city",
    "state",
    "zipcode",
    "country",
];

/// Which roster a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Technician,
    Customer,
}

impl EntityKind {
    /// Name of the identity column / feature property
    pub fn id_field(self) -> &'static str {
        match self {
            EntityKind::Technician => "id",
            EntityKind::Customer => "cnum",
        }
    }

    /// Plural form used in file names and routes
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Technician => "technicians",
            EntityKind::Customer => "customers",
        }
    }

    /// Columns of the normalized table, in persisted order
    pub fn target_fields(self) -> [&'static str; 8] {
        let [a1, a2, city, state, zip, country] = ADDRESS_FIELDS;
        [self.id_field(), "name", a1, a2, city, state, zip, country]
    }

    pub fn is_target_field(self, field: &str) -> bool {
        self.target_fields().contains(&field)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Technician => write!(f, "technician"),
            EntityKind::Customer => write!(f, "customer"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technician" | "technicians" => Ok(EntityKind::Technician),
            "customer" | "customers" => Ok(EntityKind::Customer),
            other => Err(Error::InvalidInput(format!("Unknown entity kind: {}", other))),
        }
    }
}

/// Postal address of a record
///
/// Absent components are stored as empty strings, so derived equality is
/// null-safe: an empty `address_two` equals one that was never provided.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub address_one: String,
    pub address_two: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

impl Address {
    /// Components joined by single spaces, trimmed at both ends
    ///
    /// Empty components contribute nothing, so a missing `address_two` never
    /// leaves a double space. This string is what gets sent to the geocoder.
    pub fn full_address(&self) -> String {
        ADDRESS_FIELDS
            .iter()
            .filter_map(|field| self.get(field))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "address_one" => &self.address_one,
            "address_two" => &self.address_two,
            "city" => &self.city,
            "state" => &self.state,
            "zipcode" => &self.zipcode,
            "country" => &self.country,
            _ => return None,
        };
        Some(value)
    }

    /// Set a component by column name; returns false for unknown names
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "address_one" => &mut self.address_one,
            "address_two" => &mut self.address_two,
            "city" => &mut self.city,
            "state" => &mut self.state,
            "zipcode" => &mut self.zipcode,
            "country" => &mut self.country,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// One roster row with a fixed shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// `None` when the identity column is absent or blank
    pub identifier: Option<String>,
    pub name: String,
    pub address: Address,
}

impl Record {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, address: Address) -> Self {
        Self {
            identifier: normalize_identifier(&identifier.into()),
            name: name.into(),
            address,
        }
    }

    /// Build a record from named cells
    ///
    /// `lookup` returns the raw cell for a target column, or `None` when the
    /// column is not available. Cells are trimmed; missing cells become empty.
    pub fn from_cells<'a, F>(kind: EntityKind, mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut record = Record {
            identifier: lookup(kind.id_field()).and_then(normalize_identifier),
            name: lookup("name").map(|v| v.trim().to_string()).unwrap_or_default(),
            address: Address::default(),
        };
        for field in ADDRESS_FIELDS {
            let value = lookup(field).map(|v| v.trim().to_string()).unwrap_or_default();
            record.address.set(field, value);
        }
        record
    }

    /// Cells in [`EntityKind::target_fields`] order
    pub fn to_row(&self) -> [&str; 8] {
        let a = &self.address;
        [
            self.identifier.as_deref().unwrap_or(""),
            &self.name,
            &a.address_one,
            &a.address_two,
            &a.city,
            &a.state,
            &a.zipcode,
            &a.country,
        ]
    }

    pub fn full_address(&self) -> String {
        self.address.full_address()
    }
}

/// Trim an identifier cell; blank means missing
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn springfield() -> Address {
        Address {
            address_one: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zipcode: "62704".into(),
            country: "US".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_address_single_spaced() {
        assert_eq!(springfield().full_address(), "1 Main St Springfield IL 62704 US");

        let only_country = Address {
            country: "US".into(),
            ..Default::default()
        };
        assert_eq!(only_country.full_address(), "US");
        assert_eq!(Address::default().full_address(), "");
    }

    #[test]
    fn test_empty_and_absent_components_compare_equal() {
        let stored = Record::from_cells(EntityKind::Technician, |field| match field {
            "id" => Some("T1"),
            "address_two" => Some(""),
            "city" => Some("Springfield"),
            _ => None,
        });
        let uploaded = Record::from_cells(EntityKind::Technician, |field| match field {
            "id" => Some("T1"),
            "city" => Some(" Springfield "),
            _ => None,
        });
        assert_eq!(stored.address, uploaded.address);
    }

    #[test]
    fn test_blank_identifier_is_missing() {
        let record = Record::from_cells(EntityKind::Customer, |field| match field {
            "cnum" => Some("   "),
            "name" => Some("Acme"),
            _ => None,
        });
        assert_eq!(record.identifier, None);
        assert_eq!(record.name, "Acme");
    }

    #[test]
    fn test_entity_kind_fields() {
        assert_eq!(EntityKind::Technician.id_field(), "id");
        assert_eq!(EntityKind::Customer.id_field(), "cnum");
        assert_eq!(EntityKind::Customer.target_fields()[0], "cnum");
        assert!(EntityKind::Technician.is_target_field("zipcode"));
        assert!(!EntityKind::Technician.is_target_field("cnum"));
        assert_eq!("Customers".parse::<EntityKind>().unwrap(), EntityKind::Customer);
        assert!("vendor".parse::<EntityKind>().is_err());
    }
}
