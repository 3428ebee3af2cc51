//! Derived columns: country grouping, region, freemail flag and one boolean per funnel stage.

use color_eyre::Result;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::columns::{ColumnMapping, ResolvedColumns};

pub const COUNTRY_GROUP: &str = "Country Group";
pub const REGION: &str = "Region";
pub const IS_FREEMAIL: &str = "is_freemail";

pub const UNITED_STATES: &str = "United States";
pub const UNKNOWN_COUNTRY: &str = "Unknown";
pub const REGION_US: &str = "US";
pub const REGION_NON_US: &str = "Non-US";

const TRUTHY: &[&str] = &["true", "yes", "y", "1"];
const FALSY: &[&str] = &["false", "no", "n", "0"];

/// Boolean stage columns added to every derived table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    EnteredStage2,
    EnteredStage3,
    ConvertedToOpportunity,
    OppStage1,
    OppStage2,
    OppStage3,
    OppStage4,
    OppStage5,
    ClosedWon,
}

impl Indicator {
    pub const ALL: [Indicator; 9] = [
        Indicator::EnteredStage2,
        Indicator::EnteredStage3,
        Indicator::ConvertedToOpportunity,
        Indicator::OppStage1,
        Indicator::OppStage2,
        Indicator::OppStage3,
        Indicator::OppStage4,
        Indicator::OppStage5,
        Indicator::ClosedWon,
    ];

    /// Name of the derived boolean column.
    pub fn column(self) -> &'static str {
        match self {
            Indicator::EnteredStage2 => "entered_stage_2",
            Indicator::EnteredStage3 => "entered_stage_3",
            Indicator::ConvertedToOpportunity => "converted_to_opportunity",
            Indicator::OppStage1 => "opp_stage_1",
            Indicator::OppStage2 => "opp_stage_2",
            Indicator::OppStage3 => "opp_stage_3",
            Indicator::OppStage4 => "opp_stage_4",
            Indicator::OppStage5 => "opp_stage_5",
            Indicator::ClosedWon => "closed_won",
        }
    }

    /// Source column this indicator is computed from.
    pub fn source(self, mapping: &ColumnMapping) -> &str {
        match self {
            Indicator::EnteredStage2 => &mapping.lead_stage_2,
            Indicator::EnteredStage3 => &mapping.lead_stage_3,
            Indicator::ConvertedToOpportunity => &mapping.converted_to_opportunity,
            Indicator::OppStage1 => &mapping.opportunity_stage_1,
            Indicator::OppStage2 => &mapping.opportunity_stage_2,
            Indicator::OppStage3 => &mapping.opportunity_stage_3,
            Indicator::OppStage4 => &mapping.opportunity_stage_4,
            Indicator::OppStage5 => &mapping.opportunity_stage_5,
            Indicator::ClosedWon => &mapping.closed_won,
        }
    }

    /// Conversion is a flag column; every other stage is a date stamp where presence counts.
    fn requires_true(self) -> bool {
        matches!(self, Indicator::ConvertedToOpportunity)
    }
}

/// A loaded table with the derived columns appended.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    pub df: DataFrame,
    pub columns: ResolvedColumns,
}

impl DerivedTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn company_size_column(&self) -> &str {
        &self.columns.mapping.company_size
    }
}

/// Resolve the column mapping against `df` and append the derived columns.
/// Fails when the freemail column or any mapped column is missing.
pub fn derive_columns(df: &DataFrame, mapping: &ColumnMapping) -> Result<DerivedTable> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let resolved = mapping.resolve(&names)?;
    debug!(freemail = %resolved.freemail, rows = df.height(), "deriving funnel columns");

    let m = &resolved.mapping;
    let country = col(m.country.as_str()).cast(DataType::String);
    let country_group = when(country.clone().eq(lit(REGION_US)))
        .then(lit(UNITED_STATES))
        .otherwise(country)
        .fill_null(lit(UNKNOWN_COUNTRY))
        .alias(COUNTRY_GROUP);

    let freemail_dtype = df.column(resolved.freemail.as_str())?.dtype().clone();
    let mut exprs = vec![
        country_group,
        freemail_expr(&resolved.freemail, &freemail_dtype).alias(IS_FREEMAIL),
    ];
    for indicator in Indicator::ALL {
        let source = indicator.source(m);
        let expr = if indicator.requires_true() {
            let dtype = df.column(source)?.dtype();
            strictly_true_expr(source, dtype)
        } else {
            col(source).is_not_null()
        };
        exprs.push(expr.alias(indicator.column()));
    }

    let region = when(col(COUNTRY_GROUP).eq(lit(UNITED_STATES)))
        .then(lit(REGION_US))
        .otherwise(lit(REGION_NON_US))
        .alias(REGION);

    let df = df
        .clone()
        .lazy()
        .with_columns(exprs)
        .with_columns([region])
        .collect()?;

    Ok(DerivedTable {
        df,
        columns: resolved,
    })
}

fn any_of(expr: &Expr, values: &[&str]) -> Expr {
    values
        .iter()
        .map(|v| expr.clone().eq(lit(*v)))
        .reduce(|a, b| a.or(b))
        .unwrap_or_else(|| lit(false))
}

/// Boolean view of the freemail column. Unrecognized values become null so they match
/// neither "Freemail only" nor "Corporate only".
fn freemail_expr(name: &str, dtype: &DataType) -> Expr {
    let c = col(name);
    match dtype {
        DataType::Boolean => c,
        DataType::String => {
            let lower = c.str().to_lowercase();
            when(any_of(&lower, TRUTHY))
                .then(lit(true))
                .when(any_of(&lower, FALSY))
                .then(lit(false))
                .otherwise(lit(NULL).cast(DataType::Boolean))
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => c.cast(DataType::Float64).neq(lit(0.0)),
        other => {
            warn!(
                column = name,
                dtype = %other,
                "freemail column has no boolean reading; treating every row as unknown"
            );
            lit(NULL).cast(DataType::Boolean)
        }
    }
}

/// True only where the cell is the boolean `true`; nulls and other types count as false.
fn strictly_true_expr(name: &str, dtype: &DataType) -> Expr {
    match dtype {
        DataType::Boolean => col(name).eq(lit(true)).fill_null(lit(false)),
        other => {
            warn!(
                column = name,
                dtype = %other,
                "column is not boolean; no row counts as converted"
            );
            lit(false)
        }
    }
}
