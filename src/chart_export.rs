//! Funnel chart export to PNG and SVG (plotters) and EPS (minimal PostScript, no deps).

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::present::{DashboardCharts, FunnelChart, Rgb};
use funnelboard_cli::ExportFormatArg;

/// Bar thickness as a share of one stage row.
const BAR_FILL: f64 = 0.8;
/// Horizontal extent of the stage-name column in chart coordinates (bars span -1..1).
const NAME_COLUMN: f64 = 0.6;

/// Export format for the dashboard charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExportFormat {
    Png,
    Svg,
    Eps,
}

impl ChartExportFormat {
    pub const ALL: [Self; 3] = [Self::Png, Self::Svg, Self::Eps];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Eps => "eps",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Svg => "SVG",
            Self::Eps => "EPS",
        }
    }

    /// Format implied by the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// `forced` wins; otherwise the extension decides.
    pub fn resolve(path: &Path, forced: Option<ExportFormatArg>) -> Result<Self> {
        if let Some(f) = forced {
            return Ok(f.into());
        }
        Self::from_path(path).ok_or_else(|| {
            eyre!(
                "Cannot tell the export format of {}. Use a .png, .svg or .eps file name or pass --export-format.",
                path.display()
            )
        })
    }
}

impl From<ExportFormatArg> for ChartExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Png => Self::Png,
            ExportFormatArg::Svg => Self::Svg,
            ExportFormatArg::Eps => Self::Eps,
        }
    }
}

/// Write both funnels side by side to `path`. Size is (width, height) in pixels; EPS uses
/// half of it in points.
pub fn write_dashboard(
    path: &Path,
    format: ChartExportFormat,
    charts: &DashboardCharts,
    size: (u32, u32),
) -> Result<()> {
    if size.0 == 0 || size.1 == 0 {
        return Err(eyre!("Export size must be non-zero, got {}x{}", size.0, size.1));
    }
    match format {
        ChartExportFormat::Png => write_dashboard_png(path, charts, size)?,
        ChartExportFormat::Svg => write_dashboard_svg(path, charts, size)?,
        ChartExportFormat::Eps => write_dashboard_eps(path, charts, size)?,
    }
    info!(path = %path.display(), format = format.as_str(), "exported funnels");
    Ok(())
}

pub fn write_dashboard_png(path: &Path, charts: &DashboardCharts, size: (u32, u32)) -> Result<()> {
    use plotters::prelude::*;

    let root = BitMapBackend::new(path, size).into_drawing_area();
    draw_dashboard(root, charts)
}

pub fn write_dashboard_svg(path: &Path, charts: &DashboardCharts, size: (u32, u32)) -> Result<()> {
    use plotters::prelude::*;

    let root = SVGBackend::new(path, size).into_drawing_area();
    draw_dashboard(root, charts)
}

fn draw_dashboard<DB>(
    root: plotters::drawing::DrawingArea<DB, plotters::coord::Shift>,
    charts: &DashboardCharts,
) -> Result<()>
where
    DB: plotters::prelude::DrawingBackend,
    DB::ErrorType: 'static,
{
    use plotters::prelude::*;

    root.fill(&WHITE)?;
    let body = root.titled(&charts.subtitle, ("sans-serif", 16))?;
    let panels = body.split_evenly((1, 2));
    for (panel, chart) in panels.iter().zip(charts.charts.iter()) {
        draw_funnel(panel, chart)?;
    }
    root.present()?;
    Ok(())
}

fn draw_funnel<DB>(
    area: &plotters::drawing::DrawingArea<DB, plotters::coord::Shift>,
    funnel: &FunnelChart,
) -> Result<()>
where
    DB: plotters::prelude::DrawingBackend,
    DB::ErrorType: 'static,
{
    use plotters::prelude::*;
    use plotters::style::text_anchor::{HPos, Pos, VPos};

    let n = funnel.len().max(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption(funnel.title.as_str(), ("sans-serif", 20))
        .build_cartesian_2d(-1.0 - NAME_COLUMN..1.0, 0.0..n)?;

    let Rgb(r, g, b) = funnel.color;
    let bar_color = RGBColor(r, g, b);
    let name_style = ("sans-serif", 14)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));

    for i in 0..funnel.len() {
        // stage 0 at the top
        let y = n - i as f64 - 0.5;
        let half = funnel.width_fraction(i);
        if half > 0.0 {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(-half, y - BAR_FILL / 2.0), (half, y + BAR_FILL / 2.0)],
                bar_color.filled(),
            )))?;
        }

        chart.draw_series(std::iter::once(Text::new(
            funnel.stages[i].clone(),
            (-1.0 - NAME_COLUMN, y),
            name_style.clone(),
        )))?;

        let text_color = if funnel.color.is_dark() && half >= 0.25 {
            WHITE
        } else {
            BLACK
        };
        let label_style = ("sans-serif", 14)
            .into_font()
            .color(&text_color)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let mut lines = funnel.labels[i].lines();
        if let Some(count) = lines.next() {
            chart.draw_series(std::iter::once(Text::new(
                count.to_string(),
                (0.0, y + 0.15),
                label_style.clone(),
            )))?;
        }
        if let Some(percent) = lines.next() {
            chart.draw_series(std::iter::once(Text::new(
                percent.to_string(),
                (0.0, y - 0.15),
                label_style,
            )))?;
        }
    }
    Ok(())
}

/// Escape a string for PostScript ( and ) and \. Characters outside ASCII are replaced since
/// the standard fonts have no glyphs for them.
fn ps_escape(s: &str) -> String {
    s.replace('→', "->")
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

fn ps_rgb(rgb: Rgb) -> String {
    format!(
        "{:.3} {:.3} {:.3} setrgbcolor",
        rgb.0 as f64 / 255.0,
        rgb.1 as f64 / 255.0,
        rgb.2 as f64 / 255.0
    )
}

/// Write both funnels to EPS (Encapsulated PostScript). No external dependencies.
pub fn write_dashboard_eps(path: &Path, charts: &DashboardCharts, size: (u32, u32)) -> Result<()> {
    let w = (size.0 as f64 / 2.0).max(200.0);
    let h = (size.1 as f64 / 2.0).max(150.0);

    let mut f = File::create(path)?;

    writeln!(f, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(f, "%%BoundingBox: 0 0 {} {}", w.ceil() as i32, h.ceil() as i32)?;
    writeln!(f, "%%Creator: funnelboard")?;
    writeln!(f, "%%EndComments")?;
    writeln!(f, "gsave")?;
    // x y (text) ctext: centered at x
    writeln!(
        f,
        "/ctext {{ 3 1 roll moveto dup stringwidth pop 2 div neg 0 rmoveto show }} def"
    )?;

    writeln!(f, "0 setgray")?;
    writeln!(f, "/Helvetica findfont 10 scalefont setfont")?;
    writeln!(
        f,
        "{} {} ({}) ctext",
        w / 2.0,
        h - 14.0,
        ps_escape(&charts.subtitle)
    )?;

    let panel_w = w / 2.0;
    for (idx, chart) in charts.charts.iter().enumerate() {
        write_funnel_eps(&mut f, chart, idx as f64 * panel_w, panel_w, h - 24.0)?;
    }

    writeln!(f, "grestore")?;
    writeln!(f, "%%EOF")?;
    f.sync_all()?;
    Ok(())
}

fn write_funnel_eps(
    f: &mut File,
    chart: &FunnelChart,
    x0: f64,
    panel_w: f64,
    top: f64,
) -> Result<()> {
    const MARGIN: f64 = 10.0;
    const CAPTION_H: f64 = 20.0;

    writeln!(f, "0 setgray")?;
    writeln!(f, "/Helvetica-Bold findfont 10 scalefont setfont")?;
    writeln!(
        f,
        "{} {} ({}) ctext",
        x0 + panel_w / 2.0,
        top - 12.0,
        ps_escape(&chart.title)
    )?;

    let plot_top = top - CAPTION_H;
    let plot_h = plot_top - MARGIN;
    let plot_w = panel_w - 2.0 * MARGIN;
    // Same proportions as the plotters layout: names, then a bar area of width 2
    let unit = plot_w / (2.0 + NAME_COLUMN);
    let name_x = x0 + MARGIN;
    let center_x = name_x + NAME_COLUMN * unit + unit;
    let row_h = plot_h / chart.len().max(1) as f64;

    for i in 0..chart.len() {
        let y_center = plot_top - (i as f64 + 0.5) * row_h;
        let half = chart.width_fraction(i) * unit;
        if half > 0.0 {
            writeln!(f, "{}", ps_rgb(chart.color))?;
            writeln!(
                f,
                "{} {} {} {} rectfill",
                center_x - half,
                y_center - row_h * BAR_FILL / 2.0,
                half * 2.0,
                row_h * BAR_FILL
            )?;
        }

        writeln!(f, "0 setgray")?;
        writeln!(f, "/Helvetica findfont 8 scalefont setfont")?;
        writeln!(
            f,
            "{} {} moveto ({}) show",
            name_x,
            y_center - 3.0,
            ps_escape(&chart.stages[i])
        )?;

        let on_bar = chart.color.is_dark() && chart.width_fraction(i) >= 0.25;
        writeln!(f, "{}", if on_bar { "1 setgray" } else { "0 setgray" })?;
        for (j, line) in chart.labels[i].lines().take(2).enumerate() {
            let dy = if j == 0 { 2.0 } else { -8.0 };
            writeln!(
                f,
                "{} {} ({}) ctext",
                center_x,
                y_center + dy,
                ps_escape(line)
            )?;
        }
    }
    Ok(())
}
