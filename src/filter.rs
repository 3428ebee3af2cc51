//! Filter selections (region, company size, email type) and their polars predicates.

use color_eyre::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::derive::{DerivedTable, IS_FREEMAIL, REGION, REGION_NON_US, REGION_US};
use funnelboard_cli::{EmailTypeArg, RegionArg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionFilter {
    #[default]
    All,
    UsOnly,
    NonUsOnly,
}

impl RegionFilter {
    pub const ALL: [Self; 3] = [Self::All, Self::UsOnly, Self::NonUsOnly];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::UsOnly => "US only",
            Self::NonUsOnly => "Non-US only",
        }
    }

    fn predicate(self) -> Option<Expr> {
        match self {
            Self::All => None,
            Self::UsOnly => Some(col(REGION).eq(lit(REGION_US))),
            Self::NonUsOnly => Some(col(REGION).eq(lit(REGION_NON_US))),
        }
    }
}

impl From<RegionArg> for RegionFilter {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::All => Self::All,
            RegionArg::Us => Self::UsOnly,
            RegionArg::NonUs => Self::NonUsOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmailFilter {
    #[default]
    All,
    FreemailOnly,
    CorporateOnly,
}

impl EmailFilter {
    pub const ALL: [Self; 3] = [Self::All, Self::FreemailOnly, Self::CorporateOnly];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::FreemailOnly => "Freemail only",
            Self::CorporateOnly => "Corporate only",
        }
    }

    /// Null flags match neither side.
    fn predicate(self) -> Option<Expr> {
        match self {
            Self::All => None,
            Self::FreemailOnly => Some(col(IS_FREEMAIL).eq(lit(true)).fill_null(lit(false))),
            Self::CorporateOnly => Some(col(IS_FREEMAIL).eq(lit(false)).fill_null(lit(false))),
        }
    }
}

impl From<EmailTypeArg> for EmailFilter {
    fn from(arg: EmailTypeArg) -> Self {
        match arg {
            EmailTypeArg::All => Self::All,
            EmailTypeArg::Freemail => Self::FreemailOnly,
            EmailTypeArg::Corporate => Self::CorporateOnly,
        }
    }
}

/// Current filter choices. Dimensions are ANDed; `All` or an empty size list means no predicate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSelection {
    pub region: RegionFilter,
    pub company_sizes: Vec<String>,
    pub email: EmailFilter,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: RegionFilter) -> Self {
        self.region = region;
        self
    }

    pub fn with_company_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.company_sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_email(mut self, email: EmailFilter) -> Self {
        self.email = email;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.region == RegionFilter::All
            && self.company_sizes.is_empty()
            && self.email == EmailFilter::All
    }

    /// Add or remove one company size.
    pub fn toggle_company_size(&mut self, size: &str) {
        if let Some(pos) = self.company_sizes.iter().position(|s| s == size) {
            self.company_sizes.remove(pos);
        } else {
            self.company_sizes.push(size.to_string());
        }
    }

    /// Combined predicate, or None when nothing is filtered.
    pub fn predicate(&self, company_size_column: &str) -> Option<Expr> {
        let size = col(company_size_column).cast(DataType::String);
        let sizes = self
            .company_sizes
            .iter()
            .map(|s| size.clone().eq(lit(s.as_str())).fill_null(lit(false)))
            .reduce(|a, b| a.or(b));

        [self.region.predicate(), sizes, self.email.predicate()]
            .into_iter()
            .flatten()
            .reduce(|a, b| a.and(b))
    }

    /// Human-readable summary, e.g. for chart subtitles and logs.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "No filters".to_string();
        }
        let mut parts = Vec::new();
        if self.region != RegionFilter::All {
            parts.push(format!("Region: {}", self.region.as_str()));
        }
        if !self.company_sizes.is_empty() {
            parts.push(format!("Company size: {}", self.company_sizes.join(", ")));
        }
        if self.email != EmailFilter::All {
            parts.push(format!("Email: {}", self.email.as_str()));
        }
        parts.join(" | ")
    }
}

/// Rows of `table` matching every active predicate of `selection`.
pub fn apply_filters(table: &DerivedTable, selection: &FilterSelection) -> Result<DataFrame> {
    match selection.predicate(table.company_size_column()) {
        None => Ok(table.df.clone()),
        Some(pred) => Ok(table.df.clone().lazy().filter(pred).collect()?),
    }
}

/// Distinct non-null company sizes in order of first appearance.
pub fn company_size_options(table: &DerivedTable) -> Result<Vec<String>> {
    let name = table.company_size_column();
    let sizes = table
        .df
        .column(name)?
        .cast(&DataType::String)?
        .as_materialized_series()
        .str()?
        .clone();
    let mut seen = HashSet::new();
    Ok(sizes
        .into_iter()
        .flatten()
        .filter(|s| seen.insert(s.to_string()))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_has_no_predicate() {
        assert!(FilterSelection::new().predicate("Company Size").is_none());
        assert!(FilterSelection::new().is_empty());
    }

    #[test]
    fn toggle_company_size_adds_and_removes() {
        let mut sel = FilterSelection::new();
        sel.toggle_company_size("1-10");
        sel.toggle_company_size("11-50");
        assert_eq!(sel.company_sizes, vec!["1-10", "11-50"]);
        sel.toggle_company_size("1-10");
        assert_eq!(sel.company_sizes, vec!["11-50"]);
    }

    #[test]
    fn describe_lists_active_filters() {
        let sel = FilterSelection::new()
            .with_region(RegionFilter::UsOnly)
            .with_company_sizes(["1-10"])
            .with_email(EmailFilter::CorporateOnly);
        assert_eq!(
            sel.describe(),
            "Region: US only | Company size: 1-10 | Email: Corporate only"
        );
        assert_eq!(FilterSelection::new().describe(), "No filters");
    }

    #[test]
    fn cli_choices_map_to_filters() {
        assert_eq!(RegionFilter::from(RegionArg::NonUs), RegionFilter::NonUsOnly);
        assert_eq!(
            EmailFilter::from(EmailTypeArg::Freemail),
            EmailFilter::FreemailOnly
        );
    }
}
