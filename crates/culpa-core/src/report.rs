use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Submitted { records: u64, queue_id: String },
    DryRun { records: usize },
    Empty,
    Skipped(String),
    Failed(String),
}

/// What happened to one live collection.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub collection: String,
    pub watchpoint: Option<String>,
    pub status: OutcomeStatus,
    pub duration: Duration,
}

/// Post-run report for a single `--run` invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub database: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration: Duration,
    pub outcomes: Vec<CollectionOutcome>,
    /// Configured collections absent from the database.
    pub missing: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|o| matches!(o.status, OutcomeStatus::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &CollectionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed(_)))
    }

    pub fn submitted_records(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                OutcomeStatus::Submitted { records, .. } => records,
                _ => 0,
            })
            .sum()
    }
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{mins}m {secs}s")
    } else {
        let millis = d.as_millis();
        if millis < 1000 {
            format!("{millis}ms")
        } else {
            format!("{}.{}s", total_secs, d.subsec_millis() / 100)
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted { .. } => f.pad("OK"),
            Self::DryRun { .. } => f.pad("DRY-RUN"),
            Self::Empty => f.pad("EMPTY"),
            Self::Skipped(_) => f.pad("SKIPPED"),
            Self::Failed(_) => f.pad("FAILED"),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bar = "=".repeat(72);
        let thin = "-".repeat(72);

        writeln!(f, "\n{bar}")?;
        writeln!(f, "  SCAN REPORT{}", if self.dry_run { " (dry run)" } else { "" })?;
        writeln!(f, "{bar}\n")?;

        writeln!(f, "  Database: {}", self.database)?;
        writeln!(f, "  Run ID:   {}", self.run_id)?;
        writeln!(
            f,
            "  Status:   {}",
            if self.is_success() { "completed" } else { "completed with failures" }
        )?;
        writeln!(f, "  Records:  {}", self.submitted_records())?;
        writeln!(f, "  Duration: {}", format_duration(self.total_duration))?;

        writeln!(f, "\n{thin}")?;
        writeln!(f, "  COLLECTIONS ({})", self.outcomes.len())?;
        writeln!(f, "{thin}\n")?;
        if self.outcomes.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            let name_w = self
                .outcomes
                .iter()
                .map(|o| o.collection.len())
                .max()
                .unwrap_or(0)
                .max("COLLECTION".len());
            let wp_w = self
                .outcomes
                .iter()
                .map(|o| o.watchpoint.as_deref().map_or(1, str::len))
                .max()
                .unwrap_or(0)
                .max("WATCHPOINT".len());
            writeln!(
                f,
                "  {:<name_w$} {:<wp_w$} {:<9} {}",
                "COLLECTION", "WATCHPOINT", "RESULT", "RECORDS"
            )?;
            for o in &self.outcomes {
                let records = match &o.status {
                    OutcomeStatus::Submitted { records, .. } => records.to_string(),
                    OutcomeStatus::DryRun { records } => records.to_string(),
                    OutcomeStatus::Empty => "0".to_string(),
                    _ => "-".to_string(),
                };
                writeln!(
                    f,
                    "  {:<name_w$} {:<wp_w$} {:<9} {}",
                    o.collection,
                    o.watchpoint.as_deref().unwrap_or("-"),
                    o.status,
                    records
                )?;
                match &o.status {
                    OutcomeStatus::Failed(err) => writeln!(f, "       -> {err}")?,
                    OutcomeStatus::Skipped(reason) => writeln!(f, "       -> {reason}")?,
                    _ => {}
                }
            }
        }

        if !self.missing.is_empty() {
            writeln!(f, "\n{thin}")?;
            writeln!(f, "  CONFIGURED BUT MISSING ({})", self.missing.len())?;
            writeln!(f, "{thin}\n")?;
            for name in &self.missing {
                writeln!(f, "  {name}")?;
            }
        }

        writeln!(f, "\n{thin}")?;
        writeln!(f, "  TIMELINE")?;
        writeln!(f, "{thin}\n")?;
        writeln!(
            f,
            "  Started:    {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  Completed:  {}",
            self.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        writeln!(f, "\n{bar}")?;

        Ok(())
    }
}
