//! Bar charts of the keyword and citation aggregates, drawn with `plotters`.
//!
//! The output format follows the file extension: `.svg` is written with the
//! SVG backend, anything else as a bitmap (`.png`, `.jpg`, ...).

use crate::aggregate::{CitationRanking, KeywordFrequency};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontTransform;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const ORANGE: RGBColor = RGBColor(255, 165, 0);

/// Pixel size of the keyword chart.
pub const KEYWORD_CHART_SIZE: (u32, u32) = (700, 700);

/// Pixel size of the citation chart.
pub const CITATION_CHART_SIZE: (u32, u32) = (1400, 1400);

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to plot for the {0} chart")]
    Empty(&'static str),

    #[error("Failed to draw {}: {message}", .path.display())]
    Drawing { path: PathBuf, message: String },
}

struct BarChart<'a> {
    name: &'static str,
    caption: &'a str,
    x_desc: &'a str,
    y_desc: &'a str,
    labels: Vec<String>,
    values: Vec<u32>,
    rotate_labels: bool,
}

/// Draws the `top_n` most frequent keywords.
pub fn render_keyword_chart(
    frequency: &KeywordFrequency,
    path: impl AsRef<Path>,
    top_n: usize,
) -> Result<(), ChartError> {
    let (labels, values) = frequency
        .top(top_n)
        .into_iter()
        .map(|(keyword, count)| (keyword, u32::try_from(count).unwrap_or(u32::MAX)))
        .unzip();

    render(
        &BarChart {
            name: "keyword",
            caption: "Most Frequent Keywords",
            x_desc: "Author Keywords",
            y_desc: "Frequency",
            labels,
            values,
            rotate_labels: true,
        },
        path.as_ref(),
        KEYWORD_CHART_SIZE,
    )
}

/// Draws the `top_n` most cited records, labelled by dataset index.
pub fn render_citation_chart(
    ranking: &CitationRanking,
    path: impl AsRef<Path>,
    top_n: usize,
) -> Result<(), ChartError> {
    let (labels, values) = ranking
        .top(top_n)
        .iter()
        .map(|(index, count)| (index.to_string(), *count))
        .unzip();

    render(
        &BarChart {
            name: "citation",
            caption: "Most Cited Articles (By index)",
            x_desc: "Article Index",
            y_desc: "Times Cited",
            labels,
            values,
            rotate_labels: false,
        },
        path.as_ref(),
        CITATION_CHART_SIZE,
    )
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

fn render(chart: &BarChart, path: &Path, size: (u32, u32)) -> Result<(), ChartError> {
    if chart.values.is_empty() {
        return Err(ChartError::Empty(chart.name));
    }

    let result = if is_svg(path) {
        draw(SVGBackend::new(path, size).into_drawing_area(), chart)
    } else {
        draw(BitMapBackend::new(path, size).into_drawing_area(), chart)
    };

    result.map_err(|message| ChartError::Drawing {
        path: path.to_path_buf(),
        message,
    })?;

    info!(chart = chart.name, path = %path.display(), bars = chart.values.len(), "Rendered chart");
    Ok(())
}

fn draw<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, chart: &BarChart) -> Result<(), String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let bars = chart.values.len() as u32;
    let max = chart.values.iter().copied().max().unwrap_or(0);
    let y_max = max.saturating_add(max / 10).saturating_add(1);

    let mut plot = ChartBuilder::on(&root)
        .caption(chart.caption, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(if chart.rotate_labels { 160 } else { 40 })
        .y_label_area_size(60)
        .build_cartesian_2d((0u32..bars).into_segmented(), 0u32..y_max)
        .map_err(|e| e.to_string())?;

    let label = |value: &SegmentValue<u32>| match value {
        SegmentValue::CenterOf(i) => chart.labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };

    let mut mesh = plot.configure_mesh();
    mesh.disable_x_mesh()
        .x_desc(chart.x_desc)
        .y_desc(chart.y_desc)
        .x_labels(chart.labels.len())
        .x_label_formatter(&label);
    if chart.rotate_labels {
        mesh.x_label_style(("sans-serif", 14).into_font().transform(FontTransform::Rotate90));
    }
    mesh.draw().map_err(|e| e.to_string())?;

    plot.draw_series(
        Histogram::vertical(&plot)
            .style(ORANGE.filled())
            .margin(4)
            .data(chart.values.iter().enumerate().map(|(i, v)| (i as u32, *v))),
    )
    .map_err(|e| e.to_string())?;

    root.present().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{citation_ranking, keyword_frequency};
    use crate::{Provenance, Record};
    use rstest::rstest;

    #[rstest]
    #[case("keywords.svg", true)]
    #[case("keywords.SVG", true)]
    #[case("keywords.png", false)]
    #[case("keywords", false)]
    fn test_backend_selection(#[case] path: &str, #[case] svg: bool) {
        assert_eq!(is_svg(Path::new(path)), svg);
    }

    fn records() -> Vec<Record> {
        [
            ("Robotics; Education", Some(25)),
            ("robotics; Swarms", None),
            ("Soft Robotics; Agriculture", Some(u32::MAX)),
            ("HRI; Robotics", Some(57)),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (keywords, cited))| Record {
            index: i + 1,
            author_keywords: Some(keywords.to_string()),
            times_cited: cited,
            ..Record::new(Provenance::Scopus)
        })
        .collect()
    }

    #[test]
    fn test_render_keyword_chart_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.svg");

        render_keyword_chart(&keyword_frequency(&records()), &path, 15).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Most Frequent Keywords"));
    }

    #[test]
    fn test_render_citation_chart_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.svg");

        render_citation_chart(&citation_ranking(&records()), &path, 2).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Most Cited Articles (By index)"));
    }

    #[test]
    fn test_empty_keyword_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.png");

        let err = render_keyword_chart(&keyword_frequency(&[]), &path, 15).unwrap_err();
        assert!(matches!(err, ChartError::Empty("keyword")));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_citation_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.svg");

        let err = render_citation_chart(&citation_ranking(&[]), &path, 15).unwrap_err();
        assert_eq!(err.to_string(), "Nothing to plot for the citation chart");
    }
}
