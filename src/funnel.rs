//! Funnel definitions and aggregation: per-stage counts and percent of the previous stage.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;

use crate::derive::Indicator;

/// What a stage counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum StageSource {
    /// Every row of the filtered table.
    AllRows,
    /// Rows where this boolean column is true.
    Column(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelStage {
    pub label: String,
    pub source: StageSource,
}

impl FunnelStage {
    pub fn all_rows(label: &str) -> Self {
        Self {
            label: label.to_string(),
            source: StageSource::AllRows,
        }
    }

    pub fn indicator(label: &str, indicator: Indicator) -> Self {
        Self {
            label: label.to_string(),
            source: StageSource::Column(indicator.column().to_string()),
        }
    }
}

/// An ordered list of stages. Stage order is never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelDefinition {
    pub title: String,
    pub stages: Vec<FunnelStage>,
}

impl FunnelDefinition {
    /// MQL to sales opportunity.
    pub fn marketing() -> Self {
        Self {
            title: "Marketing Funnel: MQL → Sales Opportunity".to_string(),
            stages: vec![
                FunnelStage::all_rows("MQLs"),
                FunnelStage::indicator("Lead Stage 2", Indicator::EnteredStage2),
                FunnelStage::indicator("Lead Stage 3", Indicator::EnteredStage3),
                FunnelStage::indicator(
                    "Converted to Opportunity",
                    Indicator::ConvertedToOpportunity,
                ),
            ],
        }
    }

    /// Sales opportunity to closed won.
    pub fn sales() -> Self {
        Self {
            title: "Sales Funnel: Sales Opportunity → Closed Won".to_string(),
            stages: vec![
                FunnelStage::indicator("Opportunity Stage 1", Indicator::OppStage1),
                FunnelStage::indicator("Stage 2", Indicator::OppStage2),
                FunnelStage::indicator("Stage 3", Indicator::OppStage3),
                FunnelStage::indicator("Stage 4", Indicator::OppStage4),
                FunnelStage::indicator("Stage 5", Indicator::OppStage5),
                FunnelStage::indicator("Closed Won", Indicator::ClosedWon),
            ],
        }
    }
}

/// Stage-over-stage ratio. Undefined when the previous stage is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Ratio {
    Defined(f64),
    Undefined,
}

impl Ratio {
    pub fn of(count: u64, previous: u64) -> Self {
        if previous == 0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(count as f64 / previous as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(v),
            Ratio::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub label: String,
    pub count: u64,
    pub percent_of_previous: Ratio,
}

impl StageResult {
    /// Share lost relative to the previous stage (1 - ratio).
    pub fn drop_off(&self) -> Ratio {
        match self.percent_of_previous {
            Ratio::Defined(v) => Ratio::Defined(1.0 - v),
            Ratio::Undefined => Ratio::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Funnel {
    pub title: String,
    pub stages: Vec<StageResult>,
}

impl Funnel {
    pub fn counts(&self) -> Vec<u64> {
        self.stages.iter().map(|s| s.count).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.label.as_str()).collect()
    }

    /// Last stage over first stage.
    pub fn overall_conversion(&self) -> Ratio {
        match (self.stages.first(), self.stages.last()) {
            (Some(first), Some(last)) => Ratio::of(last.count, first.count),
            _ => Ratio::Undefined,
        }
    }

    pub fn max_count(&self) -> u64 {
        self.stages.iter().map(|s| s.count).max().unwrap_or(0)
    }
}

/// Build a funnel from stage counts. The first stage is 100% by definition.
pub fn funnel_from_counts(title: &str, labels: &[&str], counts: &[u64]) -> Funnel {
    let stages = labels
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(i, (label, &count))| StageResult {
            label: label.to_string(),
            count,
            percent_of_previous: if i == 0 {
                Ratio::Defined(1.0)
            } else {
                Ratio::of(count, counts[i - 1])
            },
        })
        .collect();
    Funnel {
        title: title.to_string(),
        stages,
    }
}

/// Count each stage over `df`. Each stage is counted independently; counts need not
/// be monotone.
pub fn aggregate(df: &DataFrame, definition: &FunnelDefinition) -> Result<Funnel> {
    let schema = df.schema();
    let mut exprs = Vec::with_capacity(definition.stages.len());
    for (i, stage) in definition.stages.iter().enumerate() {
        let alias = format!("stage_{i}");
        let expr = match &stage.source {
            StageSource::AllRows => len().cast(DataType::UInt64),
            StageSource::Column(name) => {
                if schema.get(name.as_str()).is_none() {
                    return Err(eyre!(
                        "Funnel '{}' stage '{}' needs column '{}', which is not in the table",
                        definition.title,
                        stage.label,
                        name
                    ));
                }
                col(name.as_str())
                    .fill_null(lit(false))
                    .cast(DataType::UInt64)
                    .sum()
            }
        };
        exprs.push(expr.alias(alias));
    }

    let totals = df.clone().lazy().select(exprs).collect()?;
    let mut counts = Vec::with_capacity(definition.stages.len());
    for i in 0..definition.stages.len() {
        let value = totals.column(&format!("stage_{i}"))?.get(0)?;
        counts.push(value.extract::<u64>().unwrap_or(0));
    }

    let labels: Vec<&str> = definition
        .stages
        .iter()
        .map(|s| s.label.as_str())
        .collect();
    Ok(funnel_from_counts(&definition.title, &labels, &counts))
}

/// Both funnels for one filtered table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelPair {
    pub rows: usize,
    pub marketing: Funnel,
    pub sales: Funnel,
}

pub fn aggregate_pair(df: &DataFrame) -> Result<FunnelPair> {
    Ok(FunnelPair {
        rows: df.height(),
        marketing: aggregate(df, &FunnelDefinition::marketing())?,
        sales: aggregate(df, &FunnelDefinition::sales())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_follow_previous_stage() {
        let f = funnel_from_counts("t", &["a", "b", "c", "d"], &[10, 5, 2, 0]);
        let ratios: Vec<Option<f64>> = f
            .stages
            .iter()
            .map(|s| s.percent_of_previous.value())
            .collect();
        assert_eq!(ratios, vec![Some(1.0), Some(0.5), Some(0.4), Some(0.0)]);
        assert_eq!(f.overall_conversion(), Ratio::Defined(0.0));
    }

    #[test]
    fn zero_previous_is_undefined() {
        let f = funnel_from_counts("t", &["a", "b", "c"], &[0, 0, 3]);
        assert_eq!(f.stages[0].percent_of_previous, Ratio::Defined(1.0));
        assert_eq!(f.stages[1].percent_of_previous, Ratio::Undefined);
        assert_eq!(f.stages[2].percent_of_previous, Ratio::Undefined);
        assert_eq!(f.overall_conversion(), Ratio::Undefined);
    }

    #[test]
    fn later_stage_may_exceed_earlier() {
        let f = funnel_from_counts("t", &["a", "b"], &[2, 4]);
        assert_eq!(f.stages[1].percent_of_previous, Ratio::Defined(2.0));
        assert_eq!(f.stages[1].drop_off(), Ratio::Defined(-1.0));
    }

    #[test]
    fn aggregate_counts_boolean_columns() {
        let df = df!(
            "entered_stage_2" => [true, true, false, false],
            "entered_stage_3" => [true, false, false, false],
            "converted_to_opportunity" => [false, false, false, false]
        )
        .unwrap();
        let f = aggregate(&df, &FunnelDefinition::marketing()).unwrap();
        assert_eq!(f.counts(), vec![4, 2, 1, 0]);
        assert_eq!(
            f.labels(),
            vec!["MQLs", "Lead Stage 2", "Lead Stage 3", "Converted to Opportunity"]
        );
    }

    #[test]
    fn aggregate_missing_column_is_an_error() {
        let df = df!("entered_stage_2" => [true]).unwrap();
        let err = aggregate(&df, &FunnelDefinition::marketing()).unwrap_err();
        assert!(err.to_string().contains("entered_stage_3"));
    }

    #[test]
    fn definitions_keep_stage_order() {
        let sales = FunnelDefinition::sales();
        let labels: Vec<&str> = sales.stages.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Opportunity Stage 1",
                "Stage 2",
                "Stage 3",
                "Stage 4",
                "Stage 5",
                "Closed Won"
            ]
        );
    }
}
