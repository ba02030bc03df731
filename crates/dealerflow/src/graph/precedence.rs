use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConfigurationError;
use crate::graph::cycles::find_cycles;
use crate::jobs::model::JobType;

/// One stage of the per-tenant chain. Lower rank runs earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceEntry {
    pub job_type: JobType,
    pub rank: u32,
    pub prerequisites: Vec<JobType>,
}

/// Static table of job type -> prerequisite types.
#[derive(Debug, Clone)]
pub struct PrecedenceTable {
    entries: Vec<PrecedenceEntry>,
}

impl Default for PrecedenceTable {
    /// ingest -> {feed enrich, detail enrich}; detail enrich -> link publish.
    fn default() -> Self {
        Self::new(vec![
            PrecedenceEntry {
                job_type: JobType::FeedIngest,
                rank: 0,
                prerequisites: vec![],
            },
            PrecedenceEntry {
                job_type: JobType::FeedEnrich,
                rank: 1,
                prerequisites: vec![JobType::FeedIngest],
            },
            PrecedenceEntry {
                job_type: JobType::DetailEnrich,
                rank: 2,
                prerequisites: vec![JobType::FeedIngest],
            },
            PrecedenceEntry {
                job_type: JobType::LinkPublish,
                rank: 3,
                prerequisites: vec![JobType::DetailEnrich],
            },
        ])
    }
}

impl PrecedenceTable {
    /// Later duplicates of a job type replace earlier ones.
    pub fn new(entries: Vec<PrecedenceEntry>) -> Self {
        let mut by_type: BTreeMap<JobType, PrecedenceEntry> = BTreeMap::new();
        for entry in entries {
            by_type.insert(entry.job_type, entry);
        }
        let mut entries: Vec<PrecedenceEntry> = by_type.into_values().collect();
        entries.sort_by_key(|e| (e.rank, e.job_type));
        Self { entries }
    }

    /// Entries in rank order.
    pub fn chain(&self) -> impl Iterator<Item = &PrecedenceEntry> {
        self.entries.iter()
    }

    pub fn entry(&self, job_type: JobType) -> Option<&PrecedenceEntry> {
        self.entries.iter().find(|e| e.job_type == job_type)
    }

    pub fn rank(&self, job_type: JobType) -> Option<u32> {
        self.entry(job_type).map(|e| e.rank)
    }

    pub fn prerequisites(&self, job_type: JobType) -> &[JobType] {
        self.entry(job_type)
            .map(|e| e.prerequisites.as_slice())
            .unwrap_or(&[])
    }

    /// Type-level cycles, edges pointing prerequisite -> dependent.
    pub fn cycles(&self) -> Vec<Vec<JobType>> {
        let mut edges: BTreeMap<JobType, BTreeSet<JobType>> = BTreeMap::new();
        for entry in &self.entries {
            for prereq in &entry.prerequisites {
                edges.entry(*prereq).or_default().insert(entry.job_type);
            }
        }
        find_cycles(&edges)
    }

    /// Startup check; passes still detect cycles on their own.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let cycles = self.cycles();
        if cycles.is_empty() {
            return Ok(());
        }
        let rendered = cycles
            .iter()
            .map(|c| {
                c.iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConfigurationError::PrecedenceCycle(rendered))
    }
}
