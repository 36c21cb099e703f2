//! Migration pipeline orchestration.
//!
//! Steps run strictly in order: schema, labels, documents, accounting data.
//! The first fatal error stops the run and leaves whatever was already
//! committed in place.

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use tracing::{error, info};

use crate::bulk::BulkInsertStats;
use crate::config::MigrationConfig;
use crate::connectors::{create_connector, SourceConnector};
use crate::error::Result;
use crate::migrate::{
    AccountingMigrator, DocumentMigrator, DocumentStats, LabelMigrator, LabelStats,
};
use crate::target::{create_target, TargetStore};

/// Position of a pipeline in the migration sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Nothing has run yet.
    #[default]
    NotStarted,
    /// Labels are persisted and indexed.
    LabelsMigrated,
    /// Documents and their children are persisted.
    DocsMigrated,
    /// Accounting transactions are persisted.
    AccountingMigrated,
    /// All steps succeeded.
    Done,
    /// A step failed; earlier steps stay committed.
    Failed,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationPhase::NotStarted => "not started",
            MigrationPhase::LabelsMigrated => "labels migrated",
            MigrationPhase::DocsMigrated => "documents migrated",
            MigrationPhase::AccountingMigrated => "accounting migrated",
            MigrationPhase::Done => "done",
            MigrationPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Migration statistics.
#[derive(Debug, Default, Clone)]
pub struct MigrationStats {
    /// Label step counters.
    pub labels: LabelStats,
    /// Document step counters.
    pub documents: DocumentStats,
    /// Accounting step counters.
    pub accounting: BulkInsertStats,
    /// Bulk statements executed over all steps.
    pub statements: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl MigrationStats {
    /// Calculate throughput (documents per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.documents.read as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Migration pipeline.
pub struct Pipeline {
    config: MigrationConfig,
    source: Box<dyn SourceConnector>,
    target: Box<dyn TargetStore>,
    phase: MigrationPhase,
}

impl Pipeline {
    /// Create a new migration pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the connector cannot be created.
    pub fn new(config: MigrationConfig) -> Result<Self> {
        let source = create_connector(&config.source)?;
        let target = create_target(&config);
        Ok(Self::with_stores(config, source, target))
    }

    /// Create a pipeline over stores built by the caller.
    #[must_use]
    pub fn with_stores(
        config: MigrationConfig,
        source: Box<dyn SourceConnector>,
        target: Box<dyn TargetStore>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            phase: MigrationPhase::NotStarted,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    /// The target store written by this pipeline.
    #[must_use]
    pub fn target(&self) -> &dyn TargetStore {
        self.target.as_ref()
    }

    /// Run the migration pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. The pipeline is then in
    /// [`MigrationPhase::Failed`] and nothing is rolled back.
    pub async fn run(&mut self) -> Result<MigrationStats> {
        let start = std::time::Instant::now();
        let mut stats = MigrationStats::default();

        info!(
            "Starting migration: {} -> {}",
            self.source.source_type(),
            self.target.target_type()
        );

        if let Err(e) = self.run_steps(&mut stats).await {
            error!("Migration failed after phase '{}': {}", self.phase, e);
            self.phase = MigrationPhase::Failed;
            return Err(e);
        }

        self.source.close().await?;
        self.target.close().await?;

        stats.statements =
            stats.labels.bulk.statements + stats.documents.statements + stats.accounting.statements;
        stats.duration_secs = start.elapsed().as_secs_f64();
        self.transition(MigrationPhase::Done);

        info!(
            "Migration complete: {} labels, {} documents, {} transactions in {} statements, {:.2}s ({:.0} docs/sec)",
            stats.labels.unique,
            stats.documents.read,
            stats.accounting.inserted,
            stats.statements,
            stats.duration_secs,
            stats.throughput()
        );

        Ok(stats)
    }

    async fn run_steps(&mut self, stats: &mut MigrationStats) -> Result<()> {
        self.source.connect().await?;
        self.target.connect().await?;
        self.target.ensure_schema(&self.config.tables).await?;

        let labels = LabelMigrator::new(self.target.as_ref(), &self.config);
        let (index, label_stats) = labels.migrate(self.source.documents().await?).await?;
        stats.labels = label_stats;
        self.transition(MigrationPhase::LabelsMigrated);

        let total = self.source.count_documents().await?;
        let progress = if self.config.options.progress {
            create_progress_bar(total.unwrap_or(0))
        } else {
            ProgressBar::hidden()
        };
        let documents = DocumentMigrator::new(self.target.as_ref(), &self.config, &index);
        let result = documents
            .migrate(self.source.documents().await?, &progress)
            .await;
        progress.finish_and_clear();
        stats.documents = result?;
        self.transition(MigrationPhase::DocsMigrated);

        let transactions = self.source.transactions().await?;
        let accounting = AccountingMigrator::new(self.target.as_ref(), &self.config);
        stats.accounting = accounting.migrate(&transactions).await?;
        self.transition(MigrationPhase::AccountingMigrated);

        Ok(())
    }

    fn transition(&mut self, phase: MigrationPhase) {
        info!("Phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
