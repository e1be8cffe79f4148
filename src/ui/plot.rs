use chrono::{Datelike, NaiveDate};
use eframe::egui::{Color32, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Line, Plot, PlotPoints, Points,
};

use aqi_forecast::data::model::CellValue;
use aqi_forecast::data::summary::BoxStats;
use aqi_forecast::model::FeatureImportance;

use crate::color::generate_palette;

const PLOT_HEIGHT: f32 = 260.0;

/// Axis labels only at whole positions that name a bar.
fn index_formatter(
    labels: Vec<String>,
) -> impl Fn(GridMark, &std::ops::RangeInclusive<f64>) -> String {
    move |mark: GridMark, _range: &std::ops::RangeInclusive<f64>| {
        let idx = mark.value.round();
        if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// AQI over time
// ---------------------------------------------------------------------------

/// Monthly AQI across the whole span; x is days since the common era.
pub fn aqi_trend(ui: &mut Ui, trend: &[(NaiveDate, f64)]) {
    let points: PlotPoints = trend
        .iter()
        .map(|(month, aqi)| [month.num_days_from_ce() as f64, *aqi])
        .collect();

    Plot::new("aqi_trend")
        .height(PLOT_HEIGHT)
        .x_axis_formatter(|mark: GridMark, _range: &std::ops::RangeInclusive<f64>| {
            NaiveDate::from_num_days_from_ce_opt(mark.value.round() as i32)
                .map(|d| d.format("%Y-%m").to_string())
                .unwrap_or_default()
        })
        .y_axis_label("Mean AQI")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(points)
                    .name("Mean AQI")
                    .color(Color32::LIGHT_RED)
                    .width(2.0),
            );
        });
}

/// Average AQI per month (1–12) as a line.
pub fn monthly_line(ui: &mut Ui, monthly: &[(CellValue, f64)]) {
    let points: PlotPoints = monthly
        .iter()
        .filter_map(|(month, aqi)| Some([month.as_f64()?, *aqi]))
        .collect();

    Plot::new("monthly_aqi")
        .height(PLOT_HEIGHT)
        .x_axis_label("Month")
        .y_axis_label("Mean AQI")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(points)
                    .name("Mean AQI")
                    .color(Color32::LIGHT_BLUE)
                    .width(2.0),
            );
        });
}

/// Average AQI per year as vertical bars.
pub fn yearly_bars(ui: &mut Ui, yearly: &[(CellValue, f64)]) {
    let bars: Vec<Bar> = yearly
        .iter()
        .filter_map(|(year, aqi)| {
            Some(
                Bar::new(year.as_f64()?, *aqi)
                    .name(year.to_string())
                    .width(0.6),
            )
        })
        .collect();

    Plot::new("yearly_aqi")
        .height(PLOT_HEIGHT)
        .x_axis_label("Year")
        .y_axis_label("Mean AQI")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(Color32::LIGHT_GREEN));
        });
}

// ---------------------------------------------------------------------------
// Ranked horizontal bars
// ---------------------------------------------------------------------------

/// Horizontal bars, first entry on top, one colour per bar.
fn ranked_bars(ui: &mut Ui, id: &str, value_label: &str, entries: Vec<(String, f64)>) {
    let n = entries.len();
    let palette = generate_palette(n);
    // Index 0 is drawn at the top, so positions count down.
    let mut labels = vec![String::new(); n];
    let bars: Vec<Bar> = entries
        .into_iter()
        .zip(palette)
        .enumerate()
        .map(|(i, ((name, value), color))| {
            let pos = n - 1 - i;
            labels[pos] = name.clone();
            Bar::new(pos as f64, value).name(name).fill(color).width(0.7)
        })
        .collect();

    Plot::new(id)
        .height(PLOT_HEIGHT.max(22.0 * n as f32))
        .x_axis_label(value_label)
        .y_axis_formatter(index_formatter(labels))
        .allow_scroll(false)
        .allow_drag(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal());
        });
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

/// One box per group, left to right, with outliers as points.
pub fn city_boxes(ui: &mut Ui, stats: &[BoxStats]) {
    let palette = generate_palette(stats.len());
    let labels: Vec<String> = stats.iter().map(|s| s.group.to_string()).collect();

    let boxes: Vec<BoxElem> = stats
        .iter()
        .zip(palette)
        .enumerate()
        .map(|(i, (s, color))| {
            let spread = BoxSpread::new(s.lower_whisker, s.q1, s.median, s.q3, s.upper_whisker);
            BoxElem::new(i as f64, spread)
                .name(s.group.to_string())
                .fill(color.gamma_multiply(0.4))
                .stroke(Stroke::new(1.5, color))
                .box_width(0.6)
        })
        .collect();
    let outliers: PlotPoints = stats
        .iter()
        .enumerate()
        .flat_map(|(i, s)| s.outliers.iter().map(move |&v| [i as f64, v]))
        .collect();

    Plot::new("city_distribution")
        .height(PLOT_HEIGHT)
        .x_axis_formatter(index_formatter(labels))
        .y_axis_label("AQI")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.box_plot(BoxPlot::new(boxes));
            plot_ui.points(
                Points::new(outliers)
                    .name("Outliers")
                    .color(Color32::GRAY)
                    .radius(2.0),
            );
        });
}

/// Top cities by median AQI, highest on top.
pub fn top_cities(ui: &mut Ui, cities: &[(CellValue, f64)]) {
    let entries = cities.iter().map(|(c, v)| (c.to_string(), *v)).collect();
    ranked_bars(ui, "top_cities", "Median AQI", entries);
}

/// The `n` most important model features.
pub fn feature_importances(ui: &mut Ui, importances: &[FeatureImportance], n: usize) {
    let entries = importances
        .iter()
        .take(n)
        .map(|f| (f.feature.clone(), f.importance))
        .collect();
    ranked_bars(ui, "feature_importance", "Importance", entries);
}
