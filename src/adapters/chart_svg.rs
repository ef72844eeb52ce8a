//! SVG equity chart for the account dashboard.

use crate::domain::metrics::EquityPoint;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 240.0;
const PADDING: f64 = 40.0;

/// Draw balance and equity as two polylines, plus a dashed line at
/// `reference` (the starting balance) when it falls inside the plotted range.
pub fn equity_svg(points: &[EquityPoint], reference: Option<f64>) -> String {
    if points.is_empty() {
        return "<p class=\"muted\">No equity data available.</p>".to_string();
    }

    let values = points.iter().flat_map(|p| [p.balance, p.equity]);
    let mut min = values.clone().fold(f64::INFINITY, f64::min);
    let mut max = values.fold(f64::NEG_INFINITY, f64::max);
    if let Some(r) = reference {
        min = min.min(r);
        max = max.max(r);
    }

    let plot_width = WIDTH - 2.0 * PADDING;
    let plot_height = HEIGHT - 2.0 * PADDING;
    let range = max - min;
    let scale_y = if range > 0.0 { plot_height / range } else { 1.0 };
    let scale_x = if points.len() > 1 {
        plot_width / (points.len() - 1) as f64
    } else {
        0.0
    };
    let y_of = |v: f64| HEIGHT - PADDING - (v - min) * scale_y;

    let polyline = |select: fn(&EquityPoint) -> f64| {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:.1},{:.1}", PADDING + i as f64 * scale_x, y_of(select(p))))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"equity-chart\" viewBox=\"0 0 {WIDTH:.0} {HEIGHT:.0}\" width=\"{WIDTH:.0}\" height=\"{HEIGHT:.0}\">"
    );
    svg.push_str(&format!(
        "<line x1=\"{PADDING:.0}\" y1=\"{:.0}\" x2=\"{:.0}\" y2=\"{:.0}\" stroke=\"#888\"/>",
        HEIGHT - PADDING,
        WIDTH - PADDING,
        HEIGHT - PADDING
    ));
    svg.push_str(&format!(
        "<line x1=\"{PADDING:.0}\" y1=\"{PADDING:.0}\" x2=\"{PADDING:.0}\" y2=\"{:.0}\" stroke=\"#888\"/>",
        HEIGHT - PADDING
    ));
    if let Some(r) = reference {
        let y = y_of(r);
        svg.push_str(&format!(
            "<line class=\"reference\" x1=\"{PADDING:.0}\" y1=\"{y:.1}\" x2=\"{:.0}\" y2=\"{y:.1}\" stroke=\"#999\" stroke-dasharray=\"4 4\"/>",
            WIDTH - PADDING
        ));
    }
    svg.push_str(&format!(
        "<polyline class=\"balance\" fill=\"none\" stroke=\"#3b82f6\" stroke-width=\"1.5\" points=\"{}\"/>",
        polyline(|p| p.balance)
    ));
    svg.push_str(&format!(
        "<polyline class=\"equity\" fill=\"none\" stroke=\"#10b981\" stroke-width=\"1.5\" points=\"{}\"/>",
        polyline(|p| p.equity)
    ));
    svg.push_str(&format!(
        "<text x=\"{PADDING:.0}\" y=\"{:.0}\" font-size=\"11\">{:.0}</text>",
        PADDING - 8.0,
        max
    ));
    svg.push_str(&format!(
        "<text x=\"{PADDING:.0}\" y=\"{:.0}\" font-size=\"11\">{:.0}</text>",
        HEIGHT - PADDING + 16.0,
        min
    ));
    svg.push_str("</svg>");
    svg
}
