//! Pipeline orchestration
//!
//! This module provides the public API for Pawflux.
//! It wires extraction (or TSV import), aggregation and encoding together.

use crate::aggregator::Aggregator;
use crate::config::PawfluxConfig;
use crate::encoder::{Encoder, Timeline};
use crate::error::FluxError;
use crate::extractor::{Extraction, Extractor};
use crate::interchange::{
    read_tsv, write_tsv, ImportStats, ImportedRecord, TsvImport, TSV_HEADER,
};
use crate::quality::QualityReport;
use crate::types::{Event, Report};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Convert an activity document into a pretty-printed report JSON.
///
/// # Example
/// ```ignore
/// let report_json = document_to_report(std::fs::read_to_string("activity.txt")?)?;
/// ```
pub fn document_to_report(text: String) -> Result<String, FluxError> {
    let processor = PawfluxProcessor::new()?;
    let report = processor.report(&text, InputFormat::Document);
    processor.encoder.encode_report(&report, true)
}

/// Convert a TSV export into app-history JSON.
///
/// Rows that fail to parse are skipped and logged.
pub fn tsv_to_app_history(text: String) -> Result<String, FluxError> {
    let processor = PawfluxProcessor::new()?;
    let (json, _) = processor.app_history(&text, InputFormat::Tsv)?;
    Ok(json)
}

/// Input layouts accepted by the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Loosely structured activity document
    Document,
    /// Tab-separated interchange
    Tsv,
}

impl InputFormat {
    /// TSV when the first non-blank line is the TSV header or has three tabs
    pub fn detect(text: &str) -> Self {
        match text.lines().find(|l| !l.trim().is_empty()) {
            Some(line) if line.trim() == TSV_HEADER || line.matches('\t').count() >= 3 => {
                InputFormat::Tsv
            }
            _ => InputFormat::Document,
        }
    }
}

/// Events loaded from either input layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedEvents {
    pub records: Vec<ImportedRecord>,
    /// Records dropped during extraction or import
    pub skipped: usize,
    /// Present for TSV input
    pub stats: Option<ImportStats>,
}

impl LoadedEvents {
    pub fn events(&self) -> Vec<Event> {
        self.records.iter().map(|r| r.event.clone()).collect()
    }
}

impl From<Extraction> for LoadedEvents {
    fn from(extraction: Extraction) -> Self {
        LoadedEvents {
            skipped: extraction.skipped.len(),
            records: extraction
                .events
                .into_iter()
                .enumerate()
                .map(|(i, event)| ImportedRecord { row: i + 1, event })
                .collect(),
            stats: None,
        }
    }
}

impl From<TsvImport> for LoadedEvents {
    fn from(import: TsvImport) -> Self {
        LoadedEvents {
            skipped: import.stats.failed,
            records: import.records,
            stats: Some(import.stats),
        }
    }
}

/// Configured processor holding the extractor, aggregator and encoder.
///
/// Use this when running several conversions with the same configuration.
pub struct PawfluxProcessor {
    extractor: Extractor,
    aggregator: Aggregator,
    encoder: Encoder,
}

impl PawfluxProcessor {
    /// Create a processor with the default configuration
    pub fn new() -> Result<Self, FluxError> {
        Self::with_config(PawfluxConfig::default())
    }

    pub fn with_config(config: PawfluxConfig) -> Result<Self, FluxError> {
        let encoder = Encoder::new(config.aggregator.categories.clone());
        Ok(Self {
            extractor: Extractor::new(config.extractor)?,
            aggregator: Aggregator::new(config.aggregator),
            encoder,
        })
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Extract events from an activity document
    pub fn extract(&self, text: &str) -> Extraction {
        self.extractor.extract(text)
    }

    /// Read a TSV export
    pub fn import_tsv(&self, text: &str) -> TsvImport {
        read_tsv(text, &self.extractor)
    }

    pub fn load(&self, text: &str, format: InputFormat) -> LoadedEvents {
        let loaded: LoadedEvents = match format {
            InputFormat::Document => self.extract(text).into(),
            InputFormat::Tsv => self.import_tsv(text).into(),
        };
        if loaded.skipped > 0 {
            warn!("{} records skipped while loading {:?} input", loaded.skipped, format);
        }
        info!("loaded {} events", loaded.records.len());
        loaded
    }

    /// Aggregate events; `skipped` is recorded in the report summary
    pub fn aggregate(&self, events: &[Event], skipped: usize) -> Report {
        let mut report = self.aggregator.aggregate(events);
        report.summary.skipped_records = skipped;
        report
    }

    /// Load and aggregate in one step
    pub fn report(&self, text: &str, format: InputFormat) -> Report {
        let loaded = self.load(text, format);
        self.aggregate(&loaded.events(), loaded.skipped)
    }

    /// App-history JSON plus the import counters
    pub fn app_history(
        &self,
        text: &str,
        format: InputFormat,
    ) -> Result<(String, ImportStats), FluxError> {
        let loaded = self.load(text, format);
        let json = self.encoder.app_history_to_json(&loaded.records)?;
        let stats = loaded.stats.unwrap_or_else(|| ImportStats {
            total: loaded.records.len() + loaded.skipped,
            imported: loaded.records.len(),
            failed: loaded.skipped,
            failures: Vec::new(),
        });
        Ok((json, stats))
    }

    pub fn timeline(&self, text: &str, format: InputFormat) -> Timeline {
        self.encoder.timeline(&self.load(text, format).events())
    }

    /// Quality assessment of a TSV export
    pub fn quality(&self, text: &str) -> QualityReport {
        let import = self.import_tsv(text);
        QualityReport::assess(&import.events(), &import.stats)
    }

    /// Convert an activity document to TSV
    pub fn document_to_tsv(&self, text: &str) -> Result<String, FluxError> {
        write_tsv(&self.extract(text).events)
    }
}
