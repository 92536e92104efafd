//! Per-user analysis session.
//!
//! A [`Session`] owns the dataset of the latest upload. Each ingestion is
//! tagged with a generation number handed out by [`Session::begin_ingest()`];
//! a result is only installed if no newer ingestion started in the meantime,
//! so overlapping uploads resolve to the last one started.

use log::{info, warn};

use crate::{
    config::AnalysisConfig,
    data::RawTable,
    normalize::{self, CanonicalRecord, NormalizeMode, NormalizeReport},
    schema::{self, SchemaReport},
};

/// Proof that an ingestion was started; consumed when it completes.
#[derive(Debug, PartialEq, Eq)]
pub struct IngestTicket {
    generation: u64,
}

impl IngestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Inferred schema and normalized records of one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub generation: u64,
    pub mode: NormalizeMode,
    pub schema: SchemaReport,
    pub records: Vec<CanonicalRecord>,
    pub report: NormalizeReport,
}

impl Dataset {
    /// Runs inference and normalization over `table`.
    pub fn build(
        table: &RawTable,
        mode: NormalizeMode,
        config: &AnalysisConfig,
        generation: u64,
    ) -> Self {
        let schema = schema::infer_schema_with(table, config);
        let (records, report) = normalize::normalize_with(table, &schema.mapping, mode, config);
        Self {
            generation,
            mode,
            schema,
            records,
            report,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Session {
    config: AnalysisConfig,
    generation: u64,
    current: Option<Dataset>,
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            generation: 0,
            current: None,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Starts a new ingestion, invalidating every ticket issued before it.
    pub fn begin_ingest(&mut self) -> IngestTicket {
        self.generation += 1;
        IngestTicket {
            generation: self.generation,
        }
    }

    /// Builds and installs the dataset for `table`. Returns `None` and
    /// discards the work when `ticket` has been superseded.
    pub fn complete_ingest(
        &mut self,
        ticket: IngestTicket,
        table: &RawTable,
        mode: NormalizeMode,
    ) -> Option<&Dataset> {
        if ticket.generation != self.generation {
            warn!(
                "Discarding stale ingestion {} (current is {})",
                ticket.generation, self.generation
            );
            return None;
        }
        let dataset = Dataset::build(table, mode, &self.config, ticket.generation);
        Some(self.install(dataset))
    }

    /// Convenience for callers without overlapping uploads.
    pub fn ingest(&mut self, table: &RawTable, mode: NormalizeMode) -> &Dataset {
        let ticket = self.begin_ingest();
        let dataset = Dataset::build(table, mode, &self.config, ticket.generation);
        self.install(dataset)
    }

    fn install(&mut self, dataset: Dataset) -> &Dataset {
        info!(
            "Session generation {} holds {} record(s)",
            dataset.generation,
            dataset.records.len()
        );
        self.current.insert(dataset)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.current.as_ref()
    }

    /// Ends the session, handing back the installed dataset.
    pub fn into_dataset(self) -> Option<Dataset> {
        self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(region: &str) -> RawTable {
        RawTable::from_records(vec![vec![("Region", region), ("Qty", "2")]])
    }

    #[test]
    fn stale_ingestion_is_discarded() {
        let mut session = Session::default();
        let first = session.begin_ingest();
        let second = session.begin_ingest();
        assert!(first.generation() < second.generation());

        let installed = session
            .complete_ingest(second, &table("Afar"), NormalizeMode::Lenient)
            .expect("latest ingestion installs");
        assert_eq!(installed.records[0].region, "Afar");

        assert!(
            session
                .complete_ingest(first, &table("Tigray"), NormalizeMode::Lenient)
                .is_none()
        );
        assert_eq!(session.dataset().unwrap().records[0].region, "Afar");
    }

    #[test]
    fn new_upload_replaces_previous_dataset() {
        let mut session = Session::default();
        session.ingest(&table("Afar"), NormalizeMode::Lenient);
        let dataset = session.ingest(&table("Amhara"), NormalizeMode::Strict);
        assert_eq!(dataset.generation, 2);
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].region, "Amhara");
        assert_eq!(dataset.records[0].customer, "Walk-in");

        session.clear();
        assert!(session.dataset().is_none());
        assert_eq!(session.generation(), 2);
        assert!(session.into_dataset().is_none());
    }

    #[test]
    fn empty_upload_is_a_valid_empty_dataset() {
        let mut session = Session::default();
        let dataset = session.ingest(&RawTable::default(), NormalizeMode::Lenient);
        assert!(dataset.is_empty());
        assert_eq!(dataset.schema.stats.total_rows, 0);
    }
}
