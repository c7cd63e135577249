//! The contact record extracted from a business card.
//!
//! Every field is a plain `String`. A card that lacks a piece of information
//! yields an empty string for that field, never a missing key, so consumers
//! can render or copy any field without an `Option` dance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structured contact details read from one business card.
///
/// Serialised with camelCase keys (`jobTitle`, `companyName`), which is also
/// the shape the extraction service is asked to produce. Deserialisation
/// fills absent keys with empty strings; it is used for trusted data
/// (persisted history) only. Service output goes through
/// [`crate::pipeline::contract::parse_response`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessCardRecord {
    pub name: String,
    pub job_title: String,
    pub company_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub website: String,
    pub description: String,
}

impl BusinessCardRecord {
    /// Value of a single field, e.g. for a per-field "copy" action.
    pub fn get(&self, field: CardField) -> &str {
        match field {
            CardField::Name => &self.name,
            CardField::JobTitle => &self.job_title,
            CardField::CompanyName => &self.company_name,
            CardField::Phone => &self.phone,
            CardField::Email => &self.email,
            CardField::Address => &self.address,
            CardField::Website => &self.website,
            CardField::Description => &self.description,
        }
    }

    /// Mutable access to a single field.
    pub fn get_mut(&mut self, field: CardField) -> &mut String {
        match field {
            CardField::Name => &mut self.name,
            CardField::JobTitle => &mut self.job_title,
            CardField::CompanyName => &mut self.company_name,
            CardField::Phone => &mut self.phone,
            CardField::Email => &mut self.email,
            CardField::Address => &mut self.address,
            CardField::Website => &mut self.website,
            CardField::Description => &mut self.description,
        }
    }

    /// All fields with their values, in display order.
    pub fn fields(&self) -> impl Iterator<Item = (CardField, &str)> + '_ {
        CardField::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// True when every field is empty.
    pub fn is_blank(&self) -> bool {
        self.fields().all(|(_, v)| v.is_empty())
    }
}

/// One of the eight fields of a [`BusinessCardRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardField {
    Name,
    JobTitle,
    CompanyName,
    Phone,
    Email,
    Address,
    Website,
    Description,
}

impl CardField {
    /// Display order.
    pub const ALL: [CardField; 8] = [
        CardField::Name,
        CardField::JobTitle,
        CardField::CompanyName,
        CardField::Phone,
        CardField::Email,
        CardField::Website,
        CardField::Address,
        CardField::Description,
    ];

    /// The fields whose keys must be present for a response to be accepted.
    pub const ANCHORS: [CardField; 4] = [
        CardField::Name,
        CardField::CompanyName,
        CardField::Email,
        CardField::Phone,
    ];

    /// JSON key used on the wire and in persisted history.
    pub fn key(self) -> &'static str {
        match self {
            CardField::Name => "name",
            CardField::JobTitle => "jobTitle",
            CardField::CompanyName => "companyName",
            CardField::Phone => "phone",
            CardField::Email => "email",
            CardField::Address => "address",
            CardField::Website => "website",
            CardField::Description => "description",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            CardField::Name => "Full Name",
            CardField::JobTitle => "Job Title",
            CardField::CompanyName => "Company",
            CardField::Phone => "Phone",
            CardField::Email => "Email",
            CardField::Address => "Address",
            CardField::Website => "Website",
            CardField::Description => "Notes / Services",
        }
    }

    /// Description sent to the extraction service alongside the key.
    pub fn description(self) -> &'static str {
        match self {
            CardField::Name => "Full name of the person",
            CardField::JobTitle => "Job title or role",
            CardField::CompanyName => "Name of the company",
            CardField::Phone => "Contact phone number",
            CardField::Email => "Email address",
            CardField::Address => "Physical office address",
            CardField::Website => "Website URL",
            CardField::Description => "Brief description of services or tagline if present",
        }
    }

    pub fn is_anchor(self) -> bool {
        Self::ANCHORS.contains(&self)
    }
}

impl fmt::Display for CardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CardField {
    type Err = String;

    /// Accepts the JSON key (`companyName`) as well as `company_name` and
    /// `company-name`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        CardField::ALL
            .iter()
            .copied()
            .find(|f| f.key().to_lowercase() == folded)
            .ok_or_else(|| {
                let known: Vec<&str> = CardField::ALL.iter().map(|f| f.key()).collect();
                format!("unknown field '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_with_camel_case_keys() {
        let record = BusinessCardRecord {
            job_title: "CTO".into(),
            company_name: "Acme".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["jobTitle"], "CTO");
        assert_eq!(json["companyName"], "Acme");
        assert_eq!(json.as_object().unwrap().len(), 8);
    }

    #[test]
    fn get_matches_key() {
        let mut record = BusinessCardRecord::default();
        for field in CardField::ALL {
            *record.get_mut(field) = field.key().to_string();
        }
        let json = serde_json::to_value(&record).unwrap();
        for field in CardField::ALL {
            assert_eq!(json[field.key()], record.get(field));
        }
    }

    #[test]
    fn anchors_are_the_four_contact_fields() {
        let anchors: Vec<_> = CardField::ALL.iter().filter(|f| f.is_anchor()).collect();
        assert_eq!(anchors.len(), 4);
        assert!(!CardField::Website.is_anchor());
        assert!(CardField::Phone.is_anchor());
    }

    #[test]
    fn field_parsing_accepts_common_spellings() {
        assert_eq!("companyName".parse::<CardField>(), Ok(CardField::CompanyName));
        assert_eq!("company_name".parse::<CardField>(), Ok(CardField::CompanyName));
        assert_eq!("job-title".parse::<CardField>(), Ok(CardField::JobTitle));
        assert_eq!("EMAIL".parse::<CardField>(), Ok(CardField::Email));
        assert!("fax".parse::<CardField>().is_err());
    }

    #[test]
    fn blank_record() {
        assert!(BusinessCardRecord::default().is_blank());
        let r = BusinessCardRecord {
            website: "acme.com".into(),
            ..Default::default()
        };
        assert!(!r.is_blank());
    }
}
