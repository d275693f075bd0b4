//! Colored terminal output for datasets and their aggregates.
//!
//! Used by the command line front end; the library itself never prints.

use colored::Colorize;

use crate::aggregate::{CitationRanking, KeywordFrequency};
use crate::pipeline::Dataset;
use crate::{MISSING, NO_RANK, Record};

/// Cuts `text` to at most `width` characters, marking the cut with `...`.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn cell(value: Option<&str>, width: usize) -> String {
    truncate(value.unwrap_or(MISSING), width)
}

fn colorize_rank(rank: Option<&str>) -> String {
    match rank {
        Some("Q1") => "Q1".green().bold().to_string(),
        Some("Q2") => "Q2".green().to_string(),
        Some("Q3") => "Q3".yellow().to_string(),
        Some("Q4") => "Q4".red().to_string(),
        Some(other) => other.to_string(),
        None => NO_RANK.dimmed().to_string(),
    }
}

fn record_line(record: &Record) -> String {
    format!(
        "  {:>5}  {:<20} {:<48} {:>4}  {:<16} {:>6}  {:<10} {}",
        record.index,
        cell(record.authors.as_deref(), 20),
        cell(record.title.as_deref(), 48),
        record.year.map_or_else(|| "-".to_string(), |y| y.to_string()),
        cell(record.affiliation.as_deref(), 16),
        record
            .times_cited
            .map_or_else(|| "-".to_string(), |c| c.to_string()),
        record.provenance.as_str(),
        colorize_rank(record.quality_rank.as_deref()),
    )
}

/// Display the processed dataset, at most `limit` rows.
pub fn print_dataset(dataset: &Dataset, limit: Option<usize>) {
    if dataset.is_empty() {
        println!("No records. Both exports were empty.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Merged Dataset ({} records) ===", dataset.len()).bold()
    );
    println!();

    println!(
        "  {:>5}  {:<20} {:<48} {:>4}  {:<16} {:>6}  {:<10} {}",
        "Index".dimmed(),
        "First Author".dimmed(),
        "Title".dimmed(),
        "Year".dimmed(),
        "Affiliation".dimmed(),
        "Cited".dimmed(),
        "Source".dimmed(),
        "Rank".dimmed(),
    );
    println!("  {}", "-".repeat(128).dimmed());

    let shown = limit.unwrap_or(dataset.len()).min(dataset.len());
    for record in &dataset.records[..shown] {
        println!("{}", record_line(record));
    }
    if shown < dataset.len() {
        println!("  {}", format!("... {} more", dataset.len() - shown).dimmed());
    }

    println!();
    println!(
        "  {} Scopus rows, {} Web of Science rows, {} duplicates removed",
        dataset.scopus_rows,
        dataset.wos_rows,
        dataset.report.total()
    );
    for (key, removed) in &dataset.report.removed {
        println!("    {:<10} {:>5}", key.name().dimmed(), removed);
    }
}

/// Display the most frequent author keywords.
pub fn print_keywords(frequency: &KeywordFrequency, top_n: usize) {
    if frequency.is_empty() {
        println!("No author keywords in the dataset.");
        return;
    }

    println!("\n{}", "=== Most Frequent Keywords ===".bold());
    println!();
    println!("  {:>4}  {:<40} {:>9}", "#".dimmed(), "Keyword".dimmed(), "Frequency".dimmed());
    println!("  {}", "-".repeat(56).dimmed());

    for (i, (keyword, count)) in frequency.top(top_n).iter().enumerate() {
        println!("  {:>4}. {:<40} {:>9}", i + 1, truncate(keyword, 40), count);
    }
}

/// Display the most cited records, with their titles for context.
pub fn print_citations(ranking: &CitationRanking, dataset: &Dataset, top_n: usize) {
    if ranking.is_empty() {
        println!("No citation counts in the dataset.");
        return;
    }

    println!("\n{}", "=== Most Cited Articles ===".bold());
    println!();
    println!(
        "  {:>5}  {:>6}  {}",
        "Index".dimmed(),
        "Cited".dimmed(),
        "Title".dimmed()
    );
    println!("  {}", "-".repeat(72).dimmed());

    for (index, count) in ranking.top(top_n) {
        let title = dataset
            .records
            .iter()
            .find(|record| record.index == *index)
            .and_then(|record| record.title.as_deref());
        println!("  {:>5}  {:>6}  {}", index, count.to_string().bold(), cell(title, 60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provenance;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Robotics In Education", 10), "Robotic...");
        assert_eq!(truncate("Ñandú Ñandú", 8), "Ñandú...");
    }

    #[test]
    fn test_record_line_placeholders() {
        colored::control::set_override(false);
        let line = record_line(&Record {
            index: 7,
            ..Record::new(Provenance::WebOfScience)
        });

        assert!(line.contains("No data"));
        assert!(line.contains("WoS"));
        assert!(line.contains("No rank"));
    }
}
