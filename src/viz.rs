//! Cluster scatter plots rendered with Plotters and returned as base64 PNG

use crate::error::{AnalysisError, Result};
use crate::model::{DbscanParams, NOISE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use plotters::prelude::*;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::ops::Range;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 8] = [
    RED,
    BLUE,
    GREEN,
    MAGENTA,
    CYAN,
    RGBColor(255, 140, 0),
    RGBColor(128, 0, 128),
    RGBColor(128, 128, 0),
];

/// Color used for noise points
const NOISE_COLOR: RGBColor = BLACK;

/// A labeled 2D point set to draw
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub labels: Vec<i32>,
}

impl ScatterPlot {
    /// Title in the form `"<subject> (DBSCAN) - eps=0.123, min_samples=4"`
    pub fn title_for(subject: &str, params: &DbscanParams) -> String {
        format!(
            "{} (DBSCAN) - eps={:.3}, min_samples={}",
            subject, params.eps, params.min_samples
        )
    }
}

/// Renders a scatter plot into an encoded image
pub trait Visualizer: Send + Sync {
    /// Returns the encoded image (base64 PNG for the default renderer)
    fn render(&self, plot: &ScatterPlot) -> Result<String>;
}

/// Bitmap renderer producing base64-encoded PNG images
#[derive(Debug, Clone, Copy)]
pub struct PngScatterPlot {
    pub width: u32,
    pub height: u32,
}

impl Default for PngScatterPlot {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
        }
    }
}

impl Visualizer for PngScatterPlot {
    fn render(&self, plot: &ScatterPlot) -> Result<String> {
        if plot.points.len() != plot.labels.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} points but {} labels",
                plot.points.len(),
                plot.labels.len()
            )));
        }

        let (x_range, y_range) = plot_bounds(&plot.points);
        let mut pixels = vec![0u8; (self.width * self.height * 3) as usize];

        {
            let root = BitMapBackend::with_buffer(&mut pixels, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(draw_error)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(&plot.title, ("sans-serif", 22))
                .margin(15)
                .x_label_area_size(50)
                .y_label_area_size(70)
                .build_cartesian_2d(x_range, y_range)
                .map_err(draw_error)?;

            chart
                .configure_mesh()
                .x_desc(plot.x_label.as_str())
                .y_desc(plot.y_label.as_str())
                .axis_desc_style(("sans-serif", 15))
                .draw()
                .map_err(draw_error)?;

            let distinct: BTreeSet<i32> = plot.labels.iter().copied().collect();
            for label in distinct {
                let color = cluster_color(label);
                let members = plot
                    .points
                    .iter()
                    .zip(&plot.labels)
                    .filter(|(_, &l)| l == label)
                    .map(|(&(x, y), _)| Circle::new((x, y), 5, color.filled()));

                chart
                    .draw_series(members)
                    .map_err(draw_error)?
                    .label(legend_label(label))
                    .legend(move |(x, y)| Circle::new((x + 5, y), 5, color.filled()));
            }

            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(draw_error)?;

            root.present().map_err(draw_error)?;
        }

        encode_png(pixels, self.width, self.height)
    }
}

/// Palette color for a cluster label; noise is black
pub fn cluster_color(label: i32) -> RGBColor {
    if label == NOISE {
        NOISE_COLOR
    } else {
        CLUSTER_COLORS[label.rem_euclid(CLUSTER_COLORS.len() as i32) as usize]
    }
}

fn legend_label(label: i32) -> String {
    if label == NOISE {
        "Noise".to_string()
    } else {
        format!("Cluster {}", label)
    }
}

/// Axis ranges covering all points with some padding
fn plot_bounds(points: &[(f64, f64)]) -> (Range<f64>, Range<f64>) {
    let axis = |values: Vec<f64>| {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(min.is_finite() && max.is_finite()) {
            return 0.0..1.0;
        }
        let pad = if max > min { (max - min) * 0.05 } else { 0.5 };
        (min - pad)..(max + pad)
    };

    (
        axis(points.iter().map(|p| p.0).collect()),
        axis(points.iter().map(|p| p.1).collect()),
    )
}

fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> Result<String> {
    let buffer = image::RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        AnalysisError::Visualization("pixel buffer does not match the plot size".to_string())
    })?;

    let mut png = Cursor::new(Vec::new());
    buffer
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| AnalysisError::Visualization(format!("PNG encoding failed: {}", e)))?;

    Ok(STANDARD.encode(png.into_inner()))
}

fn draw_error<E: std::fmt::Display>(err: E) -> AnalysisError {
    AnalysisError::Visualization(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plot() -> ScatterPlot {
        ScatterPlot {
            title: ScatterPlot::title_for("Customer Segmentation", &DbscanParams::new(0.5, 3)),
            x_label: "Total Orders".to_string(),
            y_label: "Total Spending".to_string(),
            points: vec![(1.0, 10.0), (1.5, 12.0), (8.0, 80.0), (8.5, 82.0), (30.0, 1.0)],
            labels: vec![0, 0, 1, 1, NOISE],
        }
    }

    #[test]
    fn test_title_format() {
        let title = ScatterPlot::title_for("Product Segmentation", &DbscanParams::new(0.31415, 4));
        assert_eq!(title, "Product Segmentation (DBSCAN) - eps=0.314, min_samples=4");
    }

    #[test]
    fn test_cluster_colors() {
        assert_eq!(cluster_color(NOISE), BLACK);
        assert_eq!(cluster_color(0), RED);
        assert_eq!(cluster_color(1), BLUE);
        assert_eq!(cluster_color(CLUSTER_COLORS.len() as i32), RED);
    }

    #[test]
    fn test_plot_bounds_pad_points() {
        let (x, y) = plot_bounds(&[(0.0, 5.0), (10.0, 5.0)]);
        assert!(x.start < 0.0 && x.end > 10.0);
        assert!(y.start < 5.0 && y.end > 5.0);

        let (x, y) = plot_bounds(&[]);
        assert_eq!((x, y), (0.0..1.0, 0.0..1.0));
    }

    #[test]
    fn test_mismatched_labels_are_rejected() {
        let mut plot = sample_plot();
        plot.labels.pop();
        assert!(PngScatterPlot::default().render(&plot).is_err());
    }

    #[test]
    fn test_encode_png_produces_png_signature() {
        let encoded = encode_png(vec![255u8; 4 * 3 * 3], 4, 3).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        assert!(encode_png(vec![0u8; 5], 4, 3).is_err());
    }

    #[test]
    fn test_render_cluster_plot() {
        let encoded = PngScatterPlot::default().render(&sample_plot()).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
