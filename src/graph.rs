// Rasterising a ChartSpec with plotters

use crate::chart::{format_thousands, AxisValue, ChartKind, ChartSpec};
use crate::palette::ColorPalette;
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::ops::Range;

/// Render a chart to PNG or SVG bytes.
pub fn render_chart(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Png => render_png(spec, options),
        OutputFormat::Svg => render_svg(spec, options),
    }
}

fn render_png(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, spec)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(&buffer, width, height, image::ColorType::Rgb8)
        .context("Failed to encode PNG")?;
    Ok(png_bytes)
}

fn render_svg(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw(&root, spec)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;
    if spec.kind.is_pie() {
        draw_pie(root, spec)
    } else {
        draw_cartesian(root, spec)
    }
}

/// Series mapped onto plot coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CartesianLayout {
    pub categories: Vec<String>,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub series: Vec<Vec<(f64, f64)>>,
}

/// Categorical x values sit at `index + 0.5` on a `0..n` axis; numeric ones
/// keep their value. Bars always include zero on the y axis.
pub(crate) fn cartesian_layout(spec: &ChartSpec) -> CartesianLayout {
    let categories = if spec.categorical_x { spec.categories() } else { Vec::new() };
    let positions: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let series: Vec<Vec<(f64, f64)>> = spec
        .series
        .iter()
        .map(|s| {
            s.points
                .iter()
                .map(|p| {
                    let x = match &p.x {
                        AxisValue::Number(n) if !spec.categorical_x => *n,
                        other => positions
                            .get(other.to_string().as_str())
                            .map(|&i| i as f64 + 0.5)
                            .unwrap_or(0.0),
                    };
                    (x, p.y)
                })
                .collect()
        })
        .collect();

    let x_range = if spec.categorical_x {
        0.0..(categories.len().max(1) as f64)
    } else {
        padded_range(series.iter().flatten().map(|&(x, _)| x))
    };

    let mut y_values: Vec<f64> = series.iter().flatten().map(|&(_, y)| y).collect();
    if spec.kind == ChartKind::Bar {
        y_values.push(0.0);
    }
    let y_range = padded_range(y_values.into_iter());

    CartesianLayout {
        categories,
        x_range,
        y_range,
        series,
    }
}

fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

/// Dodged bar rectangles: `(series index, top-left, bottom-right)`.
pub(crate) fn bar_rects(layout: &CartesianLayout) -> Vec<(usize, (f64, f64), (f64, f64))> {
    let num_series = layout.series.len().max(1);
    let bar_width = 0.8 / num_series as f64;

    let mut rects = Vec::new();
    for (series_idx, points) in layout.series.iter().enumerate() {
        let offset = (series_idx as f64 - (num_series as f64 - 1.0) / 2.0) * bar_width;
        for &(x, y) in points {
            let x_center = x + offset;
            rects.push((
                series_idx,
                (x_center - bar_width / 2.0, y),
                (x_center + bar_width / 2.0, 0.0),
            ));
        }
    }
    rects
}

fn draw_cartesian<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let layout = cartesian_layout(spec);
    let palette = ColorPalette::category10();

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(layout.x_range.clone(), layout.y_range.clone())
        .context("Failed to build chart")?;

    if spec.categorical_x {
        let categories = layout.categories.clone();
        chart
            .configure_mesh()
            .x_labels(categories.len())
            .x_label_formatter(&|x| {
                let idx = x.floor() as usize;
                categories.get(idx).cloned().unwrap_or_default()
            })
            .y_label_formatter(&|y| format_thousands(*y))
            .x_desc(spec.x.as_str())
            .y_desc(spec.y.as_str())
            .draw()
            .context("Failed to draw mesh")?;
    } else {
        chart
            .configure_mesh()
            .y_label_formatter(&|y| format_thousands(*y))
            .x_desc(spec.x.as_str())
            .y_desc(spec.y.as_str())
            .draw()
            .context("Failed to draw mesh")?;
    }

    match spec.kind {
        ChartKind::Bar => {
            for (series_idx, tl, br) in bar_rects(&layout) {
                let color = palette.color(series_idx);
                chart
                    .draw_series(std::iter::once(Rectangle::new([tl, br], color.filled())))
                    .context("Failed to draw bar")?;
            }
            for (series_idx, series) in spec.series.iter().enumerate() {
                let color = palette.color(series_idx);
                chart
                    .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())
                    .context("Failed to register legend")?
                    .label(series.name.clone())
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
            }
        }
        ChartKind::Line => {
            for (series_idx, points) in layout.series.iter().enumerate() {
                let color = palette.color(series_idx);
                chart
                    .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
                    .context("Failed to draw line series")?
                    .label(spec.series[series_idx].name.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }
        ChartKind::Scatter => {
            for (series_idx, points) in layout.series.iter().enumerate() {
                let color = palette.color(series_idx);
                chart
                    .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, color.filled())))
                    .context("Failed to draw point series")?
                    .label(spec.series[series_idx].name.clone())
                    .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
            }
        }
        ChartKind::Pie | ChartKind::Donut => return draw_pie(root, spec),
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .context("Failed to draw legend")?;

    Ok(())
}

/// Wedge polygons in pixel space, clockwise from 12 o'clock. A non-zero
/// `hole` (fraction of the radius) turns wedges into donut segments.
pub(crate) fn pie_wedges(
    values: &[f64],
    center: (i32, i32),
    radius: f64,
    hole: f64,
) -> Vec<Vec<(i32, i32)>> {
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let (cx, cy) = (center.0 as f64, center.1 as f64);
    let at = |r: f64, angle: f64| -> (i32, i32) {
        ((cx + r * angle.cos()).round() as i32, (cy + r * angle.sin()).round() as i32)
    };

    let mut wedges = Vec::new();
    let mut start = -PI / 2.0;
    for &v in values {
        if v <= 0.0 {
            continue;
        }
        let sweep = v / total * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI)) * 120.0).ceil().max(2.0) as usize;

        let outer: Vec<(i32, i32)> = (0..=steps)
            .map(|i| at(radius, start + sweep * i as f64 / steps as f64))
            .collect();

        let mut polygon = outer;
        if hole > 0.0 {
            let inner_r = radius * hole;
            polygon.extend(
                (0..=steps)
                    .rev()
                    .map(|i| at(inner_r, start + sweep * i as f64 / steps as f64)),
            );
        } else {
            polygon.push(center);
        }

        wedges.push(polygon);
        start += sweep;
    }
    wedges
}

fn draw_pie<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root
        .titled(&spec.title, ("sans-serif", 20))
        .context("Failed to draw title")?;
    let (width, height) = area.dim_in_pixel();
    let palette = ColorPalette::category10();

    let points: Vec<_> = spec.series.iter().flat_map(|s| s.points.iter()).collect();
    let values: Vec<f64> = points.iter().map(|p| p.y).collect();
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();

    let legend_width = (width / 3) as i32;
    let pie_width = width as i32 - legend_width;
    let center = (pie_width / 2, height as i32 / 2);
    let radius = (pie_width.min(height as i32) as f64 / 2.0) * 0.85;
    let hole = if spec.kind == ChartKind::Donut { 0.5 } else { 0.0 };

    let shown: Vec<usize> = (0..values.len()).filter(|&i| values[i] > 0.0).collect();
    for (wedge_idx, polygon) in pie_wedges(&values, center, radius, hole).into_iter().enumerate() {
        let color = palette.color(shown[wedge_idx]);
        area.draw(&Polygon::new(polygon, color.filled()))
            .context("Failed to draw wedge")?;
    }

    for (row, &i) in shown.iter().enumerate() {
        let y = 20 + row as i32 * 22;
        let x = pie_width + 10;
        let color = palette.color(i);
        area.draw(&Rectangle::new([(x, y), (x + 12, y + 12)], color.filled()))
            .context("Failed to draw legend swatch")?;
        let share = values[i] / total * 100.0;
        let label = format!(
            "{} {} ({:.1}%)",
            points[i].x,
            format_thousands(values[i]),
            share
        );
        area.draw(&Text::new(label, (x + 18, y), ("sans-serif", 14)))
            .context("Failed to draw legend text")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{build_chart, ChartOptions};
    use crate::data::Table;

    fn table() -> Table {
        Table::from_strings(
            vec!["region".into(), "category".into(), "sales".into(), "year".into()],
            vec![
                vec!["강남구".into(), "카페".into(), "100".into(), "2023".into()],
                vec!["서초구".into(), "카페".into(), "30".into(), "2024".into()],
                vec!["강남구".into(), "한식".into(), "50".into(), "2025".into()],
            ],
        )
    }

    #[test]
    fn test_layout_categorical_positions() {
        let spec = build_chart(ChartKind::Bar, &table(), "region", "sales", None, &ChartOptions::default()).unwrap();
        let layout = cartesian_layout(&spec);
        assert_eq!(layout.categories, vec!["강남구", "서초구"]);
        assert_eq!(layout.x_range, 0.0..2.0);
        assert_eq!(layout.series[0], vec![(0.5, 100.0), (1.5, 30.0), (0.5, 50.0)]);
        // bars include zero
        assert!(layout.y_range.start < 0.0);
    }

    #[test]
    fn test_layout_numeric_padding() {
        let spec = build_chart(ChartKind::Line, &table(), "year", "sales", None, &ChartOptions::default()).unwrap();
        let layout = cartesian_layout(&spec);
        assert!(layout.categories.is_empty());
        assert!((layout.x_range.start - 2022.9).abs() < 1e-9);
        assert!((layout.x_range.end - 2025.1).abs() < 1e-9);
    }

    #[test]
    fn test_padded_range_degenerate() {
        assert_eq!(padded_range([5.0].into_iter()), 4.0..6.0);
        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
    }

    #[test]
    fn test_bar_rects_dodge() {
        let spec = build_chart(ChartKind::Bar, &table(), "region", "sales", Some("category"), &ChartOptions::default()).unwrap();
        let layout = cartesian_layout(&spec);
        let rects = bar_rects(&layout);
        assert_eq!(rects.len(), 3);
        // two series, each 0.4 wide, left one centred at 0.3
        let (series, tl, br) = rects[0];
        assert_eq!(series, 0);
        assert!((tl.0 - 0.1).abs() < 1e-9);
        assert!((br.0 - 0.5).abs() < 1e-9);
        assert_eq!(tl.1, 100.0);
        assert_eq!(br.1, 0.0);
    }

    #[test]
    fn test_pie_wedges_cover_circle() {
        let wedges = pie_wedges(&[1.0, 1.0, 0.0, 2.0], (100, 100), 50.0, 0.0);
        assert_eq!(wedges.len(), 3);
        // first wedge starts at 12 o'clock and closes at the centre
        assert_eq!(wedges[0][0], (100, 50));
        assert_eq!(*wedges[0].last().unwrap(), (100, 100));
        // the last wedge ends back at 12 o'clock
        let last = &wedges[2];
        assert_eq!(last[last.len() - 2], (100, 50));
    }

    #[test]
    fn test_donut_wedges_have_inner_arc() {
        let wedges = pie_wedges(&[1.0], (0, 0), 10.0, 0.5);
        assert_eq!(wedges.len(), 1);
        assert_eq!(*wedges[0].last().unwrap(), (0, -5));
    }

    #[test]
    fn test_pie_all_zero() {
        assert!(pie_wedges(&[0.0, 0.0], (0, 0), 10.0, 0.0).is_empty());
    }
}
