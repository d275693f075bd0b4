//! End-to-end processing: normalize, merge, deduplicate, index, enrich.
//!
//! [`Pipeline`] works on in-memory exports, text or workbook bytes, and is
//! what the tests and the library API use. [`Session`] owns the input paths and the current
//! [`Dataset`] and is what the command line drives.
//!
//! # Configuration file
//!
//! Every setting has a default; a TOML file only needs the values it
//! changes.
//!
//! ```toml
//! merge_order = "scopus-first"
//! top_n = 15
//!
//! [wos]
//! delimiter = "\t"
//! malformed = "skip"
//!
//! [wos.headers]
//! times_cited = ["Cited Reference Count", "Times Cited, WoS Core"]
//!
//! [ranking]
//! path = "scimagojr_2020.csv"
//!
//! [dedupe]
//! keys = ["doi", "title", "abstract"]
//! missing_keys = "match"
//! provenance_scope = "per-pass"
//! ```

use crate::aggregate::{CitationRanking, KeywordFrequency, citation_ranking, keyword_frequency};
use crate::dedupe::{DedupReport, Deduplicator, DeduplicatorConfig};
use crate::error::{PipelineError, Result};
use crate::normalize::{MalformedPolicy, ScopusParser, SourceConfig, SourceData, WosParser};
use crate::rank::{self, RankingConfig, RankingTable};
use crate::{Record, SourceParser};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which export comes first in the merged list, and so survives deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeOrder {
    #[default]
    ScopusFirst,
    WosFirst,
}

/// Settings of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scopus: SourceConfig,
    pub wos: SourceConfig,
    pub ranking: RankingConfig,
    pub dedupe: DeduplicatorConfig,
    pub merge_order: MergeOrder,
    /// Entries shown in keyword and citation rankings
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scopus: SourceConfig::scopus(),
            wos: SourceConfig::web_of_science(),
            ranking: RankingConfig::default(),
            dedupe: DeduplicatorConfig::default(),
            merge_order: MergeOrder::default(),
            top_n: 15,
        }
    }
}

/// On-disk layout of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    scopus: SourceOverrides,
    wos: SourceOverrides,
    ranking: Option<RankingConfig>,
    dedupe: Option<DeduplicatorConfig>,
    merge_order: Option<MergeOrder>,
    top_n: Option<usize>,
}

/// Changes to one source's default configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SourceOverrides {
    delimiter: Option<char>,
    auto_detect: Option<bool>,
    flexible: Option<bool>,
    author_delimiter: Option<char>,
    malformed: Option<MalformedPolicy>,
    /// Replaces the aliases of the named fields
    headers: HashMap<String, Vec<String>>,
}

impl SourceOverrides {
    fn apply(self, config: &mut SourceConfig) -> Result<()> {
        if let Some(delimiter) = self.delimiter {
            let byte = u8::try_from(delimiter).map_err(|_| {
                PipelineError::Config(format!(
                    "{} delimiter {:?} is not a single-byte character",
                    config.format(),
                    delimiter
                ))
            })?;
            config.set_delimiter(byte);
        }
        if let Some(auto_detect) = self.auto_detect {
            config.set_auto_detect(auto_detect);
        }
        if let Some(flexible) = self.flexible {
            config.set_flexible(flexible);
        }
        if let Some(delimiter) = self.author_delimiter {
            config.set_author_delimiter(delimiter);
        }
        if let Some(policy) = self.malformed {
            config.set_malformed_policy(policy);
        }
        for (field, aliases) in self.headers {
            config.set_header_mapping(&field, aliases);
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Builds a configuration from TOML text, starting from the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config = Self::default();
        file.scopus.apply(&mut config.scopus)?;
        file.wos.apply(&mut config.wos)?;
        if let Some(ranking) = file.ranking {
            config.ranking = ranking;
        }
        if let Some(dedupe) = file.dedupe {
            config.dedupe = dedupe;
        }
        if let Some(merge_order) = file.merge_order {
            config.merge_order = merge_order;
        }
        if let Some(top_n) = file.top_n {
            config.top_n = top_n;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_toml_str(&text)
            .map_err(|e| match e {
                PipelineError::Config(msg) => {
                    PipelineError::Config(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })
    }

    /// Checks the source and ranking settings.
    pub fn validate(&self) -> Result<()> {
        for source in [&self.scopus, &self.wos] {
            source
                .validate()
                .map_err(|msg| PipelineError::Config(format!("{}: {}", source.format(), msg)))?;
        }
        self.ranking.validate().map_err(PipelineError::Config)?;
        if self.dedupe.keys.is_empty() {
            return Err(PipelineError::Config(
                "At least one deduplication key is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// The processed record table of one run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Deduplicated records, indexed `1..=N`
    pub records: Vec<Record>,
    /// Rows removed by each deduplication key
    pub report: DedupReport,
    /// Rows normalized from the Scopus export
    pub scopus_rows: usize,
    /// Rows normalized from the Web of Science export
    pub wos_rows: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keyword_frequency(&self) -> KeywordFrequency {
        keyword_frequency(&self.records)
    }

    pub fn citation_ranking(&self) -> CitationRanking {
        citation_ranking(&self.records)
    }
}

/// Runs the processing stages over in-memory exports.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalizes both exports, merges and deduplicates them, indexes the
    /// survivors `1..=N` and looks up their quality ranks.
    pub fn run(&self, scopus: &str, wos: &str, ranking: &RankingTable) -> Result<Dataset> {
        let scopus_records = self.scopus_parser().parse(scopus)?;
        let wos_records = self.wos_parser().parse(wos)?;
        Ok(self.assemble(scopus_records, wos_records, ranking))
    }

    /// Like [`Pipeline::run`], for exports that may be workbooks.
    pub fn run_sources(
        &self,
        scopus: &SourceData,
        wos: &SourceData,
        ranking: &RankingTable,
    ) -> Result<Dataset> {
        let scopus_records = scopus.parse_with(&self.scopus_parser())?;
        let wos_records = wos.parse_with(&self.wos_parser())?;
        Ok(self.assemble(scopus_records, wos_records, ranking))
    }

    fn scopus_parser(&self) -> ScopusParser {
        ScopusParser::with_config(self.config.scopus.clone())
    }

    fn wos_parser(&self) -> WosParser {
        WosParser::with_config(self.config.wos.clone())
    }

    fn assemble(
        &self,
        scopus_records: Vec<Record>,
        wos_records: Vec<Record>,
        ranking: &RankingTable,
    ) -> Dataset {
        let scopus_rows = scopus_records.len();
        let wos_rows = wos_records.len();

        let merged: Vec<Record> = match self.config.merge_order {
            MergeOrder::ScopusFirst => scopus_records.into_iter().chain(wos_records).collect(),
            MergeOrder::WosFirst => wos_records.into_iter().chain(scopus_records).collect(),
        };
        info!(
            scopus = scopus_rows,
            wos = wos_rows,
            order = ?self.config.merge_order,
            "Merged exports"
        );

        let (mut records, report) = Deduplicator::new()
            .with_config(self.config.dedupe.clone())
            .deduplicate(merged);

        for (i, record) in records.iter_mut().enumerate() {
            record.index = i + 1;
        }

        rank::enrich(&mut records, ranking);

        Dataset {
            records,
            report,
            scopus_rows,
            wos_rows,
        }
    }
}

/// Input selection plus the dataset of the latest run.
///
/// Each [`Session::process`] rebuilds the dataset from the inputs; nothing
/// carries over from a previous run.
#[derive(Debug, Default)]
pub struct Session {
    pipeline: Pipeline,
    scopus_path: Option<PathBuf>,
    wos_path: Option<PathBuf>,
    dataset: Option<Dataset>,
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            pipeline: Pipeline::new(config),
            ..Self::default()
        }
    }

    pub fn set_scopus_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.scopus_path = Some(path.into());
        self
    }

    pub fn set_wos_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.wos_path = Some(path.into());
        self
    }

    pub fn set_ranking_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.pipeline.config.ranking.path = Some(path.into());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Reads both exports and the ranking table and replaces the dataset.
    ///
    /// On error the previous dataset is left as it was.
    pub fn process(&mut self) -> Result<&Dataset> {
        let config = self.pipeline.config();
        let scopus_path = required(&self.scopus_path, "Scopus export")?;
        let wos_path = required(&self.wos_path, "Web of Science export")?;
        let ranking_path = required(&config.ranking.path, "ranking table")?;

        let scopus = read_input(scopus_path)?;
        let wos = read_input(wos_path)?;
        let ranking = RankingTable::from_path(ranking_path, &config.ranking)?;

        let dataset = self.pipeline.run_sources(&scopus, &wos, &ranking)?;
        info!(
            records = dataset.len(),
            removed = dataset.report.total(),
            "Processed dataset"
        );

        Ok(&*self.dataset.insert(dataset))
    }

    /// The dataset of the latest successful run.
    pub fn dataset(&self) -> Result<&Dataset> {
        self.dataset.as_ref().ok_or(PipelineError::NotProcessed)
    }
}

fn required<'a>(path: &'a Option<PathBuf>, what: &str) -> Result<&'a Path> {
    path.as_deref()
        .ok_or_else(|| PipelineError::Config(format!("No {} selected", what)))
}

fn read_input(path: &Path) -> Result<SourceData> {
    SourceData::from_path(path).map_err(|e| PipelineError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provenance;
    use crate::dedupe::{DedupKey, MissingKeyPolicy, ProvenanceScope};
    use pretty_assertions::assert_eq;

    const SCOPUS: &str = "\
Authors,Title,Year,Affiliations,Cited by,DOI,Source title,Abstract,Author Keywords,Document Type
\"Lopez M., Garcia R.\",robots in class,2020,\"Tec, Monterrey, Mexico\",7,10.1/a,Computers & Education,First,Robotics,Article
\"Chen L.\",soft grippers,2019,\"Zhejiang Univ, China\",3,10.1/b,Soft Robotics,Second,Grippers,Article";

    const WOS: &str = "\
Authors\tArticle Title\tPublication Year\tAddresses\tCited Reference Count\tDOI\tSource Title\tAbstract\tAuthor Keywords\tDocument Type
Lopez, M\tRobots in Class\t2020\t[Lopez, M] Tec, Monterrey, Mexico\t30\t10.1/a\tComputers & Education\tFirst\tRobotics\tArticle
Kim, S\tSwarm Control\t2021\t[Kim, S] KAIST, Daejeon, South Korea\t12\t10.1/c\tIEEE Transactions on Robotics\tThird\tSwarms\tArticle";

    fn ranking() -> RankingTable {
        RankingTable::parse(
            "Title;SJR Best Quartile\nComputers & Education;Q1\nSoft Robotics;-",
            &RankingConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_run() {
        let dataset = Pipeline::default().run(SCOPUS, WOS, &ranking()).unwrap();

        assert_eq!(dataset.scopus_rows, 2);
        assert_eq!(dataset.wos_rows, 2);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.report.removed_by(DedupKey::Doi), 1);

        let indexes: Vec<usize> = dataset.records.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);

        let first = &dataset.records[0];
        assert_eq!(first.provenance, Provenance::Both);
        assert_eq!(first.times_cited, Some(7));
        assert_eq!(first.quality_rank.as_deref(), Some("Q1"));

        assert_eq!(dataset.records[1].quality_rank, None);
        assert_eq!(dataset.records[2].provenance, Provenance::WebOfScience);
        assert_eq!(dataset.records[2].affiliation.as_deref(), Some("South Korea"));
    }

    #[test]
    fn test_run_wos_first() {
        let config = PipelineConfig {
            merge_order: MergeOrder::WosFirst,
            ..Default::default()
        };
        let dataset = Pipeline::new(config).run(SCOPUS, WOS, &ranking()).unwrap();

        assert_eq!(dataset.records[0].authors.as_deref(), Some("Lopez, M"));
        assert_eq!(dataset.records[0].times_cited, Some(30));
        assert_eq!(dataset.records[0].provenance, Provenance::Both);
    }

    fn workbook_of(text: &str) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (row, line) in (0u32..).zip(text.lines()) {
            for (col, value) in (0u16..).zip(line.split('\t')) {
                sheet.write_string(row, col, value).unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_run_sources_with_wos_workbook() {
        let pipeline = Pipeline::default();
        let from_text = pipeline.run(SCOPUS, WOS, &ranking()).unwrap();
        let from_workbook = pipeline
            .run_sources(
                &SourceData::Text(SCOPUS.to_string()),
                &SourceData::Workbook(workbook_of(WOS)),
                &ranking(),
            )
            .unwrap();

        assert_eq!(from_workbook.wos_rows, 2);
        assert_eq!(from_workbook.records, from_text.records);
    }

    #[test]
    fn test_run_empty_exports() {
        let dataset = Pipeline::default().run("", "", &ranking()).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_config_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
merge_order = "wos-first"
top_n = 10

[scopus]
delimiter = ";"
malformed = "skip"

[scopus.headers]
title = ["Document Title"]

[ranking]
path = "scimagojr_2020.csv"

[dedupe]
keys = ["doi", "title"]
missing_keys = "ignore"
provenance_scope = "merged"
"#,
        )
        .unwrap();

        assert_eq!(config.merge_order, MergeOrder::WosFirst);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.scopus.delimiter, b';');
        assert_eq!(config.scopus.malformed, MalformedPolicy::Skip);
        assert_eq!(
            config.scopus.get_field_for_header("Document Title"),
            Some(crate::error::fields::TITLE)
        );
        assert_eq!(config.ranking.path, Some(PathBuf::from("scimagojr_2020.csv")));
        assert_eq!(config.ranking.rank_column, "SJR Best Quartile");
        assert_eq!(config.dedupe.keys, vec![DedupKey::Doi, DedupKey::Title]);
        assert_eq!(config.dedupe.missing_keys, MissingKeyPolicy::Ignore);
        assert_eq!(config.dedupe.provenance_scope, ProvenanceScope::Merged);
        assert!(config.wos.auto_detect);
    }

    #[test]
    fn test_config_defaults_from_empty_toml() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.top_n, 15);
        assert_eq!(config.merge_order, MergeOrder::ScopusFirst);
        assert_eq!(config.dedupe.keys.len(), 3);
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let err = PipelineConfig::from_toml_str("[scopus]\nseparator = \";\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_config_rejects_empty_keys() {
        let err = PipelineConfig::from_toml_str("[dedupe]\nkeys = []").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_session_requires_processing() {
        let session = Session::new(PipelineConfig::default());
        assert!(matches!(session.dataset(), Err(PipelineError::NotProcessed)));
    }

    #[test]
    fn test_session_requires_inputs() {
        let mut session = Session::new(PipelineConfig::default());
        session.set_scopus_path("scopus.csv");

        let err = session.process().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(session.dataset().is_err());
    }
}
