use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Mix, Srgb};

use aqi_forecast::data::model::AqiCategory;

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red * 255.0).round() as u8,
        (rgb.green * 255.0).round() as u8,
        (rgb.blue * 255.0).round() as u8,
    )
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_color32(rgb)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Semantic colours
// ---------------------------------------------------------------------------

/// Conventional AQI band colours, green to maroon.
pub fn category_color(category: AqiCategory) -> Color32 {
    match category {
        AqiCategory::Good => Color32::from_rgb(0x00, 0xb0, 0x50),
        AqiCategory::Satisfactory => Color32::from_rgb(0x92, 0xd0, 0x50),
        AqiCategory::Moderate => Color32::from_rgb(0xff, 0xd7, 0x00),
        AqiCategory::Poor => Color32::from_rgb(0xff, 0x8c, 0x00),
        AqiCategory::VeryPoor => Color32::from_rgb(0xe0, 0x20, 0x20),
        AqiCategory::Severe => Color32::from_rgb(0x7e, 0x00, 0x23),
    }
}

/// Blue (−1) → white (0) → red (+1) for correlation cells. NaN is grey.
pub fn correlation_color(r: f64) -> Color32 {
    if r.is_nan() {
        return Color32::GRAY;
    }
    let white: Hsl = Srgb::new(1.0f32, 1.0, 1.0).into_color();
    let end: Hsl = if r < 0.0 {
        Hsl::new(220.0, 0.7, 0.45)
    } else {
        Hsl::new(0.0, 0.7, 0.5)
    };
    let rgb: Srgb = white.mix(end, r.abs().min(1.0) as f32).into_color();
    to_color32(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_distinct_colours() {
        let palette = generate_palette(6);
        assert_eq!(palette.len(), 6);
        for (i, a) in palette.iter().enumerate() {
            for b in &palette[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn zero_correlation_is_white() {
        assert_eq!(correlation_color(0.0), Color32::WHITE);
        assert_ne!(correlation_color(0.9), correlation_color(-0.9));
        assert_eq!(correlation_color(f64::NAN), Color32::GRAY);
    }
}
