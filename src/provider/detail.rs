//! Per-application detail views.
//!
//! Every sub-view is rebuilt by replaying the entity's event payloads in
//! stored order. Payloads that no longer decode are counted and skipped; the
//! rest of the view is still produced.

use super::listing::ApplicationListingEntry;
use crate::error::StoreResult;
use crate::events::LifecycleEvent;
use crate::store::TimelineEntity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: u64,
    pub status: JobStatus,
    pub stage_ids: Vec<u64>,
    pub submitted: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Active,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage_id: u64,
    pub attempt: u32,
    pub name: String,
    pub num_tasks: u32,
    pub status: StageStatus,
    pub failure_reason: Option<String>,
    pub submitted: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSummary {
    pub executor_id: String,
    pub host: String,
    pub cores: u32,
    pub active: bool,
    pub added: Option<DateTime<Utc>>,
    pub removed: Option<DateTime<Utc>>,
    pub removal_reason: Option<String>,
}

/// Latest reported size of one stored block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBlock {
    pub block_id: String,
    pub executor_id: String,
    pub memory_size: u64,
    pub disk_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    pub summary: ApplicationListingEntry,
    pub environment: BTreeMap<String, String>,
    pub jobs: Vec<JobSummary>,
    pub stages: Vec<StageSummary>,
    pub executors: Vec<ExecutorSummary>,
    pub storage: Vec<StorageBlock>,
    pub event_count: usize,
    /// Payloads that could not be decoded during replay
    pub skipped_events: usize,
}

impl ApplicationDetail {
    pub fn from_entity(entity: &TimelineEntity) -> StoreResult<Self> {
        let summary = ApplicationListingEntry::from_entity(entity)?;

        let mut environment = BTreeMap::new();
        let mut jobs: BTreeMap<u64, JobSummary> = BTreeMap::new();
        let mut stages: BTreeMap<(u64, u32), StageSummary> = BTreeMap::new();
        let mut executors: BTreeMap<String, ExecutorSummary> = BTreeMap::new();
        let mut storage: BTreeMap<String, StorageBlock> = BTreeMap::new();
        let mut skipped_events = 0;

        for event in &entity.events {
            let Some(lifecycle) = event.lifecycle() else {
                skipped_events += 1;
                continue;
            };
            let at = event.timestamp;

            match lifecycle {
                LifecycleEvent::ApplicationStart { .. } | LifecycleEvent::ApplicationEnd => {}
                LifecycleEvent::EnvironmentUpdate { properties } => environment.extend(properties),
                LifecycleEvent::JobStart { job_id, stage_ids } => {
                    jobs.insert(
                        job_id,
                        JobSummary {
                            job_id,
                            status: JobStatus::Running,
                            stage_ids,
                            submitted: Some(at),
                            completed: None,
                        },
                    );
                }
                LifecycleEvent::JobEnd { job_id, succeeded } => {
                    let job = jobs.entry(job_id).or_insert_with(|| JobSummary {
                        job_id,
                        status: JobStatus::Running,
                        stage_ids: Vec::new(),
                        submitted: None,
                        completed: None,
                    });
                    job.status = if succeeded {
                        JobStatus::Succeeded
                    } else {
                        JobStatus::Failed
                    };
                    job.completed = Some(at);
                }
                LifecycleEvent::StageSubmitted {
                    stage_id,
                    attempt,
                    name,
                    num_tasks,
                } => {
                    stages.insert(
                        (stage_id, attempt),
                        StageSummary {
                            stage_id,
                            attempt,
                            name,
                            num_tasks,
                            status: StageStatus::Active,
                            failure_reason: None,
                            submitted: Some(at),
                            completed: None,
                        },
                    );
                }
                LifecycleEvent::StageCompleted {
                    stage_id,
                    attempt,
                    failure_reason,
                } => {
                    let stage = stages
                        .entry((stage_id, attempt))
                        .or_insert_with(|| StageSummary {
                            stage_id,
                            attempt,
                            name: String::new(),
                            num_tasks: 0,
                            status: StageStatus::Active,
                            failure_reason: None,
                            submitted: None,
                            completed: None,
                        });
                    stage.status = if failure_reason.is_some() {
                        StageStatus::Failed
                    } else {
                        StageStatus::Complete
                    };
                    stage.failure_reason = failure_reason;
                    stage.completed = Some(at);
                }
                LifecycleEvent::ExecutorAdded {
                    executor_id,
                    host,
                    cores,
                } => {
                    executors.insert(
                        executor_id.clone(),
                        ExecutorSummary {
                            executor_id,
                            host,
                            cores,
                            active: true,
                            added: Some(at),
                            removed: None,
                            removal_reason: None,
                        },
                    );
                }
                LifecycleEvent::ExecutorRemoved {
                    executor_id,
                    reason,
                } => {
                    let executor =
                        executors
                            .entry(executor_id.clone())
                            .or_insert_with(|| ExecutorSummary {
                                executor_id,
                                host: String::new(),
                                cores: 0,
                                active: true,
                                added: None,
                                removed: None,
                                removal_reason: None,
                            });
                    executor.active = false;
                    executor.removed = Some(at);
                    executor.removal_reason = reason;
                }
                LifecycleEvent::BlockUpdated {
                    block_id,
                    executor_id,
                    memory_size,
                    disk_size,
                } => {
                    // Zero sizes mean the block was evicted
                    if memory_size == 0 && disk_size == 0 {
                        storage.remove(&block_id);
                    } else {
                        storage.insert(
                            block_id.clone(),
                            StorageBlock {
                                block_id,
                                executor_id,
                                memory_size,
                                disk_size,
                            },
                        );
                    }
                }
            }
        }

        Ok(Self {
            summary,
            environment,
            jobs: jobs.into_values().collect(),
            stages: stages.into_values().collect(),
            executors: executors.into_values().collect(),
            storage: storage.into_values().collect(),
            event_count: entity.events.len(),
            skipped_events,
        })
    }

    pub fn active_executors(&self) -> usize {
        self.executors.iter().filter(|e| e.active).count()
    }

    pub fn storage_memory_used(&self) -> u64 {
        self.storage.iter().map(|b| b.memory_size).sum()
    }
}
