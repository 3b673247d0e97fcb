//! Compliance record payloads and list filters.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// UI placeholder values that mean "do not filter on this column".
const ALL_STATES: &str = "-- All States --";
const ALL_LOCATIONS: &str = "-- All Locations --";

/// One row of `se_data`.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ComplianceRecord {
    pub id: u64,
    pub state: String,
    pub location: String,
    pub establishment: String,
    pub act: String,
    pub details: String,
}

impl ComplianceRecord {
    #[must_use]
    pub fn from_input(id: u64, input: RecordInput) -> Self {
        Self {
            id,
            state: input.state,
            location: input.location,
            establishment: input.establishment,
            act: input.act,
            details: input.details,
        }
    }
}

/// Body for create and update.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecordInput {
    pub state: String,
    pub location: String,
    pub establishment: String,
    pub act: String,
    #[serde(default)]
    pub details: String,
}

impl RecordInput {
    /// State, location and establishment are required.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [&self.state, &self.location, &self.establishment]
            .iter()
            .all(|value| !value.trim().is_empty())
    }
}

#[derive(IntoParams, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[into_params(parameter_in = Query)]
pub struct RecordFilter {
    /// Exact state, or `-- All States --` for every state.
    pub state: Option<String>,
    /// Exact location, or `-- All Locations --` for every location.
    pub location: Option<String>,
}

impl RecordFilter {
    /// Drop empty values and the "all" placeholders.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            state: active(self.state, ALL_STATES),
            location: active(self.location, ALL_LOCATIONS),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &ComplianceRecord) -> bool {
        self.state.as_deref().is_none_or(|state| record.state == state)
            && self
                .location
                .as_deref()
                .is_none_or(|location| record.location == location)
    }
}

fn active(value: Option<String>, sentinel: &str) -> Option<String> {
    value.filter(|value| !value.is_empty() && value != sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str, location: &str) -> ComplianceRecord {
        ComplianceRecord {
            id: 1,
            state: state.to_string(),
            location: location.to_string(),
            establishment: "Factory".to_string(),
            act: "Factories Act".to_string(),
            details: String::new(),
        }
    }

    #[test]
    fn sentinels_and_empty_values_mean_no_filter() {
        let filter = RecordFilter {
            state: Some(ALL_STATES.to_string()),
            location: Some(String::new()),
        }
        .normalized();
        assert_eq!(filter, RecordFilter::default());
        assert!(filter.matches(&record("Kerala", "Kochi")));
    }

    #[test]
    fn filter_matches_exact_values() {
        let filter = RecordFilter {
            state: Some("Kerala".to_string()),
            location: Some(ALL_LOCATIONS.to_string()),
        }
        .normalized();
        assert!(filter.matches(&record("Kerala", "Kochi")));
        assert!(filter.matches(&record("Kerala", "Thrissur")));
        assert!(!filter.matches(&record("Goa", "Panaji")));
        assert!(!filter.matches(&record("kerala", "Kochi")));
    }

    #[test]
    fn record_input_requires_identifying_fields() {
        let mut input = RecordInput {
            state: "Goa".to_string(),
            location: "Panaji".to_string(),
            establishment: "Shop".to_string(),
            act: "Shops Act".to_string(),
            details: String::new(),
        };
        assert!(input.is_valid());
        input.establishment = "  ".to_string();
        assert!(!input.is_valid());
    }
}
