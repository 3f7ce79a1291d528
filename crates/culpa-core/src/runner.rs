use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::collection::{plan_collections, CollectionPlan, ScanDecision};
use crate::config::ConnectorConfig;
use crate::error::ConnectorResult;
use crate::event::{EventSink, ScanEvent};
use crate::report::{CollectionOutcome, OutcomeStatus, RunReport};
use crate::sink::{SampleBatch, WatchpointSink};
use crate::source::CollectionSource;

/// Drives one pass over the database: plan, sample, submit.
pub struct Scanner {
    source: Arc<dyn CollectionSource>,
    sink: Arc<dyn WatchpointSink>,
    event_sinks: Vec<Arc<dyn EventSink>>,
    dry_run: bool,
}

impl Scanner {
    pub fn new(source: Arc<dyn CollectionSource>, sink: Arc<dyn WatchpointSink>) -> Self {
        Self {
            source,
            sink,
            event_sinks: Vec::new(),
            dry_run: false,
        }
    }

    pub fn add_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.event_sinks.push(sink);
    }

    /// Sample collections but never submit.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn emit(&self, event: ScanEvent) {
        for sink in &self.event_sinks {
            sink.emit(event.clone()).await;
        }
    }

    /// Run a full scan. Only a failure to list collections aborts the run;
    /// per-collection failures are recorded in the report.
    pub async fn run(&self, config: &ConnectorConfig) -> ConnectorResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let database = self.source.database_name().to_string();

        self.emit(ScanEvent::Started {
            run_id,
            database: database.clone(),
            at: started_at,
        })
        .await;

        let live: Vec<String> = self
            .source
            .list_collections()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();

        let plan = plan_collections(config, &live);
        tracing::info!(
            live = live.len(),
            scans = plan.scans().count(),
            missing = plan.missing.len(),
            "Planned scan"
        );

        for name in &plan.missing {
            self.emit(ScanEvent::MissingCollection {
                run_id,
                collection: name.clone(),
            })
            .await;
        }

        let mut outcomes = Vec::with_capacity(plan.collections.len());
        for collection_plan in &plan.collections {
            let outcome = self
                .scan_collection(run_id, &database, collection_plan, config.behavior.sample_size)
                .await;
            outcomes.push(outcome);
        }

        let completed_at = Utc::now();
        self.emit(ScanEvent::Completed {
            run_id,
            at: completed_at,
        })
        .await;

        Ok(RunReport {
            run_id,
            database,
            dry_run: self.dry_run,
            started_at,
            completed_at,
            total_duration: clock.elapsed(),
            outcomes,
            missing: plan.missing,
        })
    }

    async fn scan_collection(
        &self,
        run_id: Uuid,
        database: &str,
        plan: &CollectionPlan,
        sample_size: u32,
    ) -> CollectionOutcome {
        let clock = Instant::now();
        let collection = plan.collection.clone();

        let watchpoint = match &plan.decision {
            ScanDecision::Skip(reason) => {
                self.emit(ScanEvent::CollectionSkipped {
                    run_id,
                    collection: collection.clone(),
                    reason: reason.to_string(),
                })
                .await;
                return CollectionOutcome {
                    collection,
                    watchpoint: None,
                    status: OutcomeStatus::Skipped(reason.to_string()),
                    duration: clock.elapsed(),
                };
            }
            ScanDecision::Scan {
                watchpoint,
                configured,
            } => {
                if !configured {
                    tracing::info!(%collection, %watchpoint, "Unconfigured collection, traversing with derived watchpoint");
                }
                watchpoint.clone()
            }
        };

        let status = match self
            .sample_and_submit(run_id, database, &collection, &watchpoint, sample_size)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                self.emit(ScanEvent::CollectionFailed {
                    run_id,
                    collection: collection.clone(),
                    error: e.to_string(),
                })
                .await;
                OutcomeStatus::Failed(e.to_string())
            }
        };

        CollectionOutcome {
            collection,
            watchpoint: Some(watchpoint),
            status,
            duration: clock.elapsed(),
        }
    }

    async fn sample_and_submit(
        &self,
        run_id: Uuid,
        database: &str,
        collection: &str,
        watchpoint: &str,
        sample_size: u32,
    ) -> ConnectorResult<OutcomeStatus> {
        tracing::info!(%collection, sample_size, "Sampling newest records");
        let records = self.source.sample(collection, sample_size).await?;

        self.emit(ScanEvent::CollectionSampled {
            run_id,
            collection: collection.to_string(),
            records: records.len(),
        })
        .await;

        if records.is_empty() {
            return Ok(OutcomeStatus::Empty);
        }
        if self.dry_run {
            return Ok(OutcomeStatus::DryRun {
                records: records.len(),
            });
        }

        let receipt = self
            .sink
            .submit(SampleBatch {
                watchpoint: watchpoint.to_string(),
                database: database.to_string(),
                collection: collection.to_string(),
                sampled_at: Utc::now(),
                records,
            })
            .await?;

        tracing::debug!(%collection, server_result = %receipt.server_result, "Controller accepted batch");
        self.emit(ScanEvent::CollectionSubmitted {
            run_id,
            collection: collection.to_string(),
            watchpoint: watchpoint.to_string(),
            queue_id: receipt.queue_id.clone(),
            records: receipt.record_count,
        })
        .await;

        Ok(OutcomeStatus::Submitted {
            records: receipt.record_count,
            queue_id: receipt.queue_id,
        })
    }
}
