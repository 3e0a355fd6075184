//! Record store port
//!
//! The cycle manager and the habit scheduler talk to the remote
//! record-keeping service only through [`RecordStore`]. Records are
//! flat maps of named, typed fields.

pub mod memory;
pub mod notion;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RecordStoreError;

pub use memory::InMemoryRecordStore;
pub use notion::NotionRecordStore;

/// Icon attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    /// A single emoji
    Emoji(String),
    /// An externally hosted image URL
    External(String),
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Title text (one per record)
    Title(String),
    /// A date, optionally with an end date
    Date {
        /// First day
        start: NaiveDate,
        /// Optional last day
        end: Option<NaiveDate>,
    },
    /// A single-select option by name
    Select(String),
    /// References to other records by id
    Relation(Vec<String>),
    /// Checkbox
    Checkbox(bool),
    /// Plain rich text content
    RichText(String),
}

/// Named attributes of a record.
pub type Fields = BTreeMap<String, FieldValue>;

/// A record as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier assigned by the store
    pub id: String,
    /// Attribute values
    pub fields: Fields,
    /// Icon, if any
    pub icon: Option<Icon>,
}

impl Record {
    /// Title text of the named field.
    #[must_use]
    pub fn title(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Title(text)) => Some(text),
            _ => None,
        }
    }

    /// Selected option of the named field.
    #[must_use]
    pub fn select(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Select(option)) => Some(option),
            _ => None,
        }
    }

    /// Start and optional end of the named date field.
    #[must_use]
    pub fn date(&self, name: &str) -> Option<(NaiveDate, Option<NaiveDate>)> {
        match self.fields.get(name) {
            Some(FieldValue::Date { start, end }) => Some((*start, *end)),
            _ => None,
        }
    }

    /// Rich text content of the named field.
    #[must_use]
    pub fn rich_text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::RichText(text)) => Some(text),
            _ => None,
        }
    }
}

/// Structured query predicate.
///
/// Date predicates compare against the start of a date field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Select field equals the option
    SelectEquals {
        /// Field name
        property: String,
        /// Option name
        value: String,
    },
    /// Select field is not the option (empty selects match)
    SelectNotEquals {
        /// Field name
        property: String,
        /// Option name
        value: String,
    },
    /// Date field starts on or before the date
    DateOnOrBefore {
        /// Field name
        property: String,
        /// Inclusive bound
        date: NaiveDate,
    },
    /// Date field starts on or after the date
    DateOnOrAfter {
        /// Field name
        property: String,
        /// Inclusive bound
        date: NaiveDate,
    },
    /// Date field starts on the date
    DateEquals {
        /// Field name
        property: String,
        /// Expected start
        date: NaiveDate,
    },
    /// All of the nested predicates hold
    And(Vec<Filter>),
    /// Any of the nested predicates holds
    Or(Vec<Filter>),
}

impl Filter {
    /// Shorthand for [`Filter::SelectEquals`].
    #[must_use]
    pub fn select_equals(property: &str, value: &str) -> Self {
        Self::SelectEquals {
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    /// Shorthand for [`Filter::SelectNotEquals`].
    #[must_use]
    pub fn select_not_equals(property: &str, value: &str) -> Self {
        Self::SelectNotEquals {
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    /// Shorthand for [`Filter::DateOnOrBefore`].
    #[must_use]
    pub fn date_on_or_before(property: &str, date: NaiveDate) -> Self {
        Self::DateOnOrBefore {
            property: property.to_string(),
            date,
        }
    }

    /// Shorthand for [`Filter::DateOnOrAfter`].
    #[must_use]
    pub fn date_on_or_after(property: &str, date: NaiveDate) -> Self {
        Self::DateOnOrAfter {
            property: property.to_string(),
            date,
        }
    }

    /// Shorthand for [`Filter::DateEquals`].
    #[must_use]
    pub fn date_equals(property: &str, date: NaiveDate) -> Self {
        Self::DateEquals {
            property: property.to_string(),
            date,
        }
    }

    /// Evaluate the predicate against a record's fields.
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        let date_start = |property: &str| match fields.get(property) {
            Some(FieldValue::Date { start, .. }) => Some(*start),
            _ => None,
        };

        match self {
            Self::SelectEquals { property, value } => {
                matches!(fields.get(property), Some(FieldValue::Select(v)) if v == value)
            }
            Self::SelectNotEquals { property, value } => {
                !matches!(fields.get(property), Some(FieldValue::Select(v)) if v == value)
            }
            Self::DateOnOrBefore { property, date } => {
                date_start(property).is_some_and(|start| start <= *date)
            }
            Self::DateOnOrAfter { property, date } => {
                date_start(property).is_some_and(|start| start >= *date)
            }
            Self::DateEquals { property, date } => {
                date_start(property).is_some_and(|start| start == *date)
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(fields)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(fields)),
        }
    }
}

/// Query, create and update records in remote collections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return every record in the collection matching the filter
    /// (all records when `filter` is `None`).
    async fn query(
        &self,
        collection_id: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Record>, RecordStoreError>;

    /// Create a record and return it with its assigned id.
    async fn create_record(
        &self,
        collection_id: &str,
        fields: Fields,
        icon: Option<Icon>,
    ) -> Result<Record, RecordStoreError>;

    /// Overwrite the given fields of an existing record.
    async fn update_record(&self, record_id: &str, fields: Fields)
        -> Result<(), RecordStoreError>;
}
