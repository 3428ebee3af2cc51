//! Mapping from the logical fields the funnels need to columns of the source table.
//!
//! Every name is configurable (`[columns]` in the config file). The freemail column
//! may be left unset, in which case the first column whose name contains
//! `freemail` (case-insensitive) is used.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Substring searched for when no freemail column is configured.
pub const FREEMAIL_MARKER: &str = "freemail";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("Could not find a column containing 'freemail'. Set columns.freemail in the config or pass --freemail-column.")]
    FreemailNotFound,
    #[error("Configured freemail column '{0}' is not in the data.")]
    FreemailMissing(String),
    #[error("Missing expected column(s): {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Column mapping for '{0}' is empty.")]
    EmptyMapping(&'static str),
}

/// Source column names. Defaults match the lead export the dashboard was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub country: String,
    pub company_size: String,
    /// None = discover by substring.
    pub freemail: Option<String>,
    pub lead_stage_2: String,
    pub lead_stage_3: String,
    pub converted_to_opportunity: String,
    pub opportunity_stage_1: String,
    pub opportunity_stage_2: String,
    pub opportunity_stage_3: String,
    pub opportunity_stage_4: String,
    pub opportunity_stage_5: String,
    pub closed_won: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            country: "Country".to_string(),
            company_size: "Company Size".to_string(),
            freemail: None,
            lead_stage_2: "Enters Lead Stage 2".to_string(),
            lead_stage_3: "Enters Lead Stage 3".to_string(),
            converted_to_opportunity: "Converted to Sales Opportunity".to_string(),
            opportunity_stage_1: "Enters Opportunity Stage 1".to_string(),
            opportunity_stage_2: "Enters Opportunity Stage 2".to_string(),
            opportunity_stage_3: "Enters Opportunity Stage 3".to_string(),
            opportunity_stage_4: "Enters Opportunity Stage 4".to_string(),
            opportunity_stage_5: "Enters Opportunity Stage 5".to_string(),
            closed_won: "Closed Won Date".to_string(),
        }
    }
}

impl ColumnMapping {
    /// (config key, column name) for every required, non-discovered field.
    fn required(&self) -> [(&'static str, &str); 11] {
        [
            ("country", &self.country),
            ("company_size", &self.company_size),
            ("lead_stage_2", &self.lead_stage_2),
            ("lead_stage_3", &self.lead_stage_3),
            ("converted_to_opportunity", &self.converted_to_opportunity),
            ("opportunity_stage_1", &self.opportunity_stage_1),
            ("opportunity_stage_2", &self.opportunity_stage_2),
            ("opportunity_stage_3", &self.opportunity_stage_3),
            ("opportunity_stage_4", &self.opportunity_stage_4),
            ("opportunity_stage_5", &self.opportunity_stage_5),
            ("closed_won", &self.closed_won),
        ]
    }

    /// Checks the mapping itself, independent of any data.
    pub fn validate(&self) -> Result<(), ColumnError> {
        for (key, name) in self.required() {
            if name.trim().is_empty() {
                return Err(ColumnError::EmptyMapping(key));
            }
        }
        if matches!(&self.freemail, Some(f) if f.trim().is_empty()) {
            return Err(ColumnError::EmptyMapping("freemail"));
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        macro_rules! take_if_changed {
            ($($field:ident),*) => {
                $(if other.$field != defaults.$field {
                    self.$field = other.$field;
                })*
            };
        }
        take_if_changed!(
            country,
            company_size,
            lead_stage_2,
            lead_stage_3,
            converted_to_opportunity,
            opportunity_stage_1,
            opportunity_stage_2,
            opportunity_stage_3,
            opportunity_stage_4,
            opportunity_stage_5,
            closed_won
        );
        if other.freemail.is_some() {
            self.freemail = other.freemail;
        }
    }

    /// Resolve against the column names of a loaded table (in table order).
    ///
    /// The freemail column is resolved first so that its absence is reported on
    /// its own; otherwise every missing column is listed in one error.
    pub fn resolve<S: AsRef<str>>(&self, columns: &[S]) -> Result<ResolvedColumns, ColumnError> {
        self.validate()?;
        let has = |name: &str| columns.iter().any(|c| c.as_ref() == name);

        let freemail = match &self.freemail {
            Some(name) if has(name) => name.clone(),
            Some(name) => return Err(ColumnError::FreemailMissing(name.clone())),
            None => find_freemail_column(columns).ok_or(ColumnError::FreemailNotFound)?,
        };

        let missing: Vec<String> = self
            .required()
            .iter()
            .filter(|(_, name)| !has(*name))
            .map(|(_, name)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ColumnError::Missing(missing));
        }

        Ok(ResolvedColumns {
            mapping: self.clone(),
            freemail,
        })
    }
}

/// First column (by table order) whose name contains `freemail`, case-insensitively.
pub fn find_freemail_column<S: AsRef<str>>(columns: &[S]) -> Option<String> {
    columns
        .iter()
        .map(|c| c.as_ref())
        .find(|c| c.to_lowercase().contains(FREEMAIL_MARKER))
        .map(String::from)
}

/// A mapping whose every column is known to exist in the table it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub mapping: ColumnMapping,
    pub freemail: String,
}
