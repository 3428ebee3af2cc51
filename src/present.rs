//! Display formatting for funnels and the chart series handed to renderers.

use color_eyre::Result;
use serde::Serialize;
use std::fmt::Write as _;

use crate::config::ChartConfig;
use crate::funnel::{Funnel, FunnelPair, Ratio};

/// Shown in place of a percentage when the previous stage is empty.
pub const UNDEFINED_PERCENT: &str = "(n/a)";

/// Group digits in thousands: `12345` -> `"12,345"`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Whole-percent label in parentheses, e.g. `"(40%)"`.
pub fn format_percent(ratio: Ratio) -> String {
    match ratio {
        Ratio::Defined(v) if v.is_finite() => format!("({:.0}%)", v * 100.0),
        _ => UNDEFINED_PERCENT.to_string(),
    }
}

/// Count on the first line, percentage of previous on the second.
pub fn stage_label(count: u64, ratio: Ratio) -> String {
    format!("{}\n{}", format_count(count), format_percent(ratio))
}

/// RGB color shared by every renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` (leading `#` optional, case-insensitive).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Relative luminance is low enough that white text reads better than black.
    pub fn is_dark(self) -> bool {
        let l = 0.2126 * self.0 as f64 + 0.7152 * self.1 as f64 + 0.0722 * self.2 as f64;
        l < 140.0
    }
}

/// Everything a renderer needs to draw one funnel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelChart {
    pub title: String,
    pub stages: Vec<String>,
    pub counts: Vec<u64>,
    pub labels: Vec<String>,
    pub color: Rgb,
}

impl FunnelChart {
    pub fn from_funnel(funnel: &Funnel, color: Rgb) -> Self {
        Self {
            title: funnel.title.clone(),
            stages: funnel.stages.iter().map(|s| s.label.clone()).collect(),
            counts: funnel.counts(),
            labels: funnel
                .stages
                .iter()
                .map(|s| stage_label(s.count, s.percent_of_previous))
                .collect(),
            color,
        }
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Bar width as a fraction of the widest stage; 0 when every stage is empty.
    pub fn width_fraction(&self, i: usize) -> f64 {
        let max = self.max_count();
        if max == 0 {
            0.0
        } else {
            self.counts[i] as f64 / max as f64
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// The two charts laid out side by side: marketing left, sales right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardCharts {
    pub subtitle: String,
    pub rows: usize,
    pub charts: [FunnelChart; 2],
}

impl DashboardCharts {
    pub fn new(pair: &FunnelPair, subtitle: &str, chart: &ChartConfig) -> Result<Self> {
        Ok(Self {
            subtitle: subtitle.to_string(),
            rows: pair.rows,
            charts: [
                FunnelChart::from_funnel(&pair.marketing, chart.marketing_rgb()?),
                FunnelChart::from_funnel(&pair.sales, chart.sales_rgb()?),
            ],
        })
    }
}

/// Plain-text table of both funnels.
pub fn render_text(pair: &FunnelPair, subtitle: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} rows)", subtitle, format_count(pair.rows as u64));
    for funnel in [&pair.marketing, &pair.sales] {
        let width = funnel
            .stages
            .iter()
            .map(|s| s.label.chars().count())
            .max()
            .unwrap_or(0)
            .max("Stage".len());
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", funnel.title);
        let _ = writeln!(
            out,
            "{:<width$}  {:>10}  {:>14}",
            "Stage",
            "Count",
            "% of Previous",
            width = width
        );
        for stage in &funnel.stages {
            let _ = writeln!(
                out,
                "{:<width$}  {:>10}  {:>14}",
                stage.label,
                format_count(stage.count),
                format_percent(stage.percent_of_previous),
                width = width
            );
        }
        let _ = writeln!(
            out,
            "{:<width$}  {:>10}  {:>14}",
            "Overall",
            "",
            format_percent(funnel.overall_conversion()),
            width = width
        );
    }
    out
}

#[derive(Serialize)]
struct JsonStage<'a> {
    stage: &'a str,
    count: u64,
    percent_of_previous: Option<f64>,
    label: String,
}

#[derive(Serialize)]
struct JsonFunnel<'a> {
    title: &'a str,
    stages: Vec<JsonStage<'a>>,
    overall_conversion: Option<f64>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    filters: &'a str,
    rows: usize,
    marketing: JsonFunnel<'a>,
    sales: JsonFunnel<'a>,
}

fn json_funnel(funnel: &Funnel) -> JsonFunnel<'_> {
    JsonFunnel {
        title: &funnel.title,
        stages: funnel
            .stages
            .iter()
            .map(|s| JsonStage {
                stage: &s.label,
                count: s.count,
                percent_of_previous: s.percent_of_previous.value(),
                label: format_percent(s.percent_of_previous),
            })
            .collect(),
        overall_conversion: funnel.overall_conversion().value(),
    }
}

/// Pretty JSON of both funnels. Undefined ratios are `null`.
pub fn render_json(pair: &FunnelPair, subtitle: &str) -> Result<String> {
    let report = JsonReport {
        filters: subtitle,
        rows: pair.rows,
        marketing: json_funnel(&pair.marketing),
        sales: json_funnel(&pair.sales),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::funnel_from_counts;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn percent_labels() {
        assert_eq!(format_percent(Ratio::Defined(1.0)), "(100%)");
        assert_eq!(format_percent(Ratio::Defined(0.4)), "(40%)");
        assert_eq!(format_percent(Ratio::Defined(0.0)), "(0%)");
        assert_eq!(format_percent(Ratio::Defined(1.0 / 3.0)), "(33%)");
        assert_eq!(format_percent(Ratio::Undefined), "(n/a)");
    }

    #[test]
    fn stage_label_has_two_lines() {
        assert_eq!(stage_label(12345, Ratio::Defined(0.5)), "12,345\n(50%)");
    }

    #[test]
    fn hex_colors() {
        assert_eq!(Rgb::from_hex("#00A376"), Some(Rgb(0, 163, 118)));
        assert_eq!(Rgb::from_hex("00303f"), Some(Rgb(0, 48, 63)));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#GGGGGG"), None);
        assert_eq!(Rgb(0, 163, 118).to_hex(), "#00A376");
        assert!(Rgb(0, 48, 63).is_dark());
        assert!(!Rgb(255, 255, 255).is_dark());
    }

    #[test]
    fn chart_from_funnel() {
        let f = funnel_from_counts("Marketing", &["MQLs", "Lead Stage 2"], &[2000, 500]);
        let chart = FunnelChart::from_funnel(&f, Rgb(0, 0, 0));
        assert_eq!(chart.labels, vec!["2,000\n(100%)", "500\n(25%)"]);
        assert_eq!(chart.width_fraction(1), 0.25);
    }

    #[test]
    fn empty_chart_has_zero_widths() {
        let f = funnel_from_counts("Sales", &["a", "b"], &[0, 0]);
        let chart = FunnelChart::from_funnel(&f, Rgb(0, 0, 0));
        assert_eq!(chart.width_fraction(0), 0.0);
        assert_eq!(chart.labels[1], "0\n(n/a)");
    }
}
