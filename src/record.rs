//! Record types flowing through a crawl cycle
//!
//! A [`ListingItem`] is produced from one element of a listing page. The
//! cascade turns it into a [`DetailRecord`], which carries one value slot and
//! exactly one [`Provenance`] tag per declared field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single extracted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl FieldValue {
    /// Returns true if the value carries no information
    ///
    /// Blank text, empty lists and empty maps are empty. A flag is never
    /// empty: `false` is an answer.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flag(_) => false,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|s| s.trim().is_empty()),
            Self::Map(map) => map.is_empty(),
        }
    }

    /// Wraps a value, mapping empty values to `None`
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Flattens the value into plain text (lists and maps are joined)
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Flag(b) => b.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Which cascade stage produced a field's final value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Structural,
    Pattern,
    Heuristic,
    Enrichment,
    Unresolved,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Pattern => "pattern",
            Self::Heuristic => "heuristic",
            Self::Enrichment => "enrichment",
            Self::Unresolved => "unresolved",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "structural" => Some(Self::Structural),
            "pattern" => Some(Self::Pattern),
            "heuristic" => Some(Self::Heuristic),
            "enrichment" => Some(Self::Enrichment),
            "unresolved" => Some(Self::Unresolved),
            _ => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw values extracted from one listing-page element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingItem {
    /// Field name -> non-empty raw value
    pub fields: BTreeMap<String, FieldValue>,

    /// Absolute detail-page URL, when the listing schema declares one
    pub detail_url: Option<String>,
}

impl ListingItem {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }
}

/// Location details produced by the geo collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub city: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_remote: bool,
}

/// A fully resolved offer, ready for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    /// Name of the source that produced this record
    pub source: String,

    /// The source's unique identifier for the item
    pub unique_id: String,

    /// Detail-page URL the record was resolved from
    pub url: Option<String>,

    /// Field name -> resolved value (`None` when unresolved)
    pub fields: BTreeMap<String, Option<FieldValue>>,

    /// Field name -> cascade stage that produced the value
    pub provenance: BTreeMap<String, Provenance>,

    /// Category label from the classifier
    pub category: Option<String>,

    /// Location details from the geo collaborator
    pub geo: GeoInfo,

    pub scraped_at: DateTime<Utc>,
}

impl DetailRecord {
    pub fn new(source: &str, unique_id: &str, url: Option<String>) -> Self {
        Self {
            source: source.to_string(),
            unique_id: unique_id.to_string(),
            url,
            fields: BTreeMap::new(),
            provenance: BTreeMap::new(),
            category: None,
            geo: GeoInfo::default(),
            scraped_at: Utc::now(),
        }
    }

    /// Sets a field together with its provenance tag
    ///
    /// An empty value is stored as `None` and tagged unresolved, so the
    /// "unresolved implies null" rule holds no matter what the caller passes.
    pub fn set(&mut self, name: &str, value: Option<FieldValue>, provenance: Provenance) {
        let value = value.and_then(FieldValue::non_empty);
        let provenance = match value {
            Some(_) if provenance == Provenance::Unresolved => Provenance::Structural,
            Some(_) => provenance,
            None => Provenance::Unresolved,
        };
        self.fields.insert(name.to_string(), value);
        self.provenance.insert(name.to_string(), provenance);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(Option::as_ref)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn provenance_of(&self, name: &str) -> Option<Provenance> {
        self.provenance.get(name).copied()
    }

    /// Names of fields that are still unresolved, in name order
    pub fn unresolved_fields(&self) -> Vec<String> {
        self.provenance
            .iter()
            .filter(|(_, p)| **p == Provenance::Unresolved)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
