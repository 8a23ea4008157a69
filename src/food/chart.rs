use colored::Colorize;
use serde::Serialize;

use crate::food::analysis::nutrition::NutrientRecord;

/// Shown instead of a chart when every share is zero.
pub const NO_DATA_MESSAGE: &str = "No nutritional data available for this image.";

pub const LABELS: [&str; 6] = [
    "Carbohydrates",
    "Fat",
    "Protein",
    "Sodium",
    "Calcium",
    "Saturated Fat",
];

pub const PALETTE: [&str; 6] = [
    "#FF6384", "#36A2EB", "#FFCE56", "#4BC0C0", "#9966FF", "#FF9F40",
];

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSegment {
    pub label: &'static str,
    pub value: u32,
    pub color: &'static str,
}

/// How on-segment labels are drawn over the fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStyle {
    pub color: &'static str,
    pub font_weight: &'static str,
    pub font_size: u32,
    pub text_align: &'static str,
    pub stroke_color: &'static str,
    pub stroke_width: u32,
    pub shadow_blur: u32,
    pub shadow_color: &'static str,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            color: "#fff",
            font_weight: "bold",
            font_size: 12,
            text_align: "center",
            stroke_color: "#000",
            stroke_width: 1,
            shadow_blur: 3,
            shadow_color: "#000",
        }
    }
}

/// Pie chart data for a rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub segments: Vec<ChartSegment>,
    pub label_style: LabelStyle,
    pub padding: u32,
}

impl ChartSeries {
    pub fn labels(&self) -> Vec<&'static str> {
        self.segments.iter().map(|s| s.label).collect()
    }

    pub fn values(&self) -> Vec<u32> {
        self.segments.iter().map(|s| s.value).collect()
    }

    pub fn colors(&self) -> Vec<&'static str> {
        self.segments.iter().map(|s| s.color).collect()
    }

    pub fn total(&self) -> u32 {
        self.segments.iter().map(|s| s.value).sum()
    }

    /// Tooltip text for the segment at `index`.
    pub fn tooltip(&self, index: usize) -> Option<String> {
        self.segments.get(index).map(format_segment)
    }

    /// Text drawn on the segment at `index`.
    pub fn segment_label(&self, index: usize) -> Option<String> {
        self.segments.get(index).map(format_segment)
    }

    /// Colored horizontal bars, one line per segment, scaled to the total.
    pub fn render_terminal(&self) -> String {
        let total = self.total().max(1) as usize;
        let name_width = LABELS.iter().map(|l| l.len()).max().unwrap_or(0);

        let mut out = String::new();
        for segment in &self.segments {
            let width = segment.value as usize * BAR_WIDTH / total;
            let (r, g, b) = hex_to_rgb(segment.color);
            let bar = "█".repeat(width).truecolor(r, g, b);
            out.push_str(&format!(
                "{:<name_width$} {} {}%\n",
                segment.label,
                bar,
                segment.value,
                name_width = name_width
            ));
        }
        out
    }
}

fn format_segment(segment: &ChartSegment) -> String {
    format!("{}: {}%", segment.label, segment.value)
}

fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(255)
    };
    (channel(0), channel(2), channel(4))
}

/// Maps a record onto the six chart segments.
///
/// Label and color are bound by position, never by value. Returns `None`
/// when every share is zero so callers show [`NO_DATA_MESSAGE`] instead of
/// an empty pie.
pub fn project(record: &NutrientRecord) -> Option<ChartSeries> {
    let values = record.percentages();
    if values.iter().all(|&v| v == 0) {
        return None;
    }

    let segments = LABELS
        .iter()
        .zip(PALETTE.iter())
        .zip(values.iter())
        .map(|((&label, &color), &value)| ChartSegment { label, value, color })
        .collect();

    Some(ChartSeries {
        segments,
        label_style: LabelStyle::default(),
        padding: 20,
    })
}
