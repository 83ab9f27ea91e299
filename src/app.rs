use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::{Compound, Descriptor, DescriptorMode, ResultRow};
use crate::error::{FailureKind, HarvestError};
use crate::materialize::{Materializer, Quota, WrittenFiles};
use crate::normalize::{CanonicalTable, normalize_for};
use crate::poll::{PollController, PollPolicy};
use crate::pubchem::PubchemClient;
use crate::resolver::Resolver;
use crate::submit::SearchSubmitter;
use crate::zinc::ZincClient;

#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestOptions {
    pub max: Option<usize>,
    pub skip_zinc: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub descriptor: String,
    pub mode: String,
    pub compound: Compound,
    pub pubchem_rows: usize,
    pub zinc_rows: Option<usize>,
    pub files: WrittenFiles,
    pub harvested_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Harvested,
    NotFound,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub descriptor: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<HarvestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub items: Vec<BatchItem>,
}

impl BatchResult {
    pub fn harvested(&self) -> usize {
        self.count(ItemStatus::Harvested)
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    /// Worst failure across the batch. Items that were not found do not count.
    pub fn worst_failure(&self) -> Option<FailureKind> {
        self.items.iter().filter_map(|item| item.failure).max()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Everything one invocation needs: upstream clients, poll schedule and output tree.
pub struct Harvester<P: PubchemClient, Z: ZincClient> {
    pubchem: P,
    zinc: Z,
    materializer: Materializer,
    poll: PollPolicy,
}

impl<P: PubchemClient, Z: ZincClient> Harvester<P, Z> {
    pub fn new(pubchem: P, zinc: Z, materializer: Materializer, poll: PollPolicy) -> Self {
        Self {
            pubchem,
            zinc,
            materializer,
            poll,
        }
    }

    /// Runs each descriptor in turn. A failing descriptor is recorded and the batch continues.
    pub fn harvest_batch(
        &self,
        inputs: &[String],
        mode: DescriptorMode,
        options: HarvestOptions,
        sink: &dyn ProgressSink,
    ) -> BatchResult {
        let mut items = Vec::with_capacity(inputs.len());
        for input in inputs {
            let outcome = Descriptor::new(input, mode)
                .and_then(|descriptor| self.harvest(&descriptor, options, sink));
            let item = match outcome {
                Ok(report) => BatchItem {
                    descriptor: input.clone(),
                    status: ItemStatus::Harvested,
                    report: Some(report),
                    error: None,
                    failure: None,
                },
                Err(err) => {
                    let status = match err {
                        HarvestError::NotFound(_) => ItemStatus::NotFound,
                        _ => ItemStatus::Failed,
                    };
                    tracing::warn!(descriptor = %input, error = %err, "descriptor skipped");
                    sink.event(ProgressEvent {
                        message: format!("phase=Done; {input}: {err}"),
                        elapsed: None,
                    });
                    BatchItem {
                        descriptor: input.clone(),
                        status,
                        report: None,
                        error: Some(err.to_string()),
                        failure: err.kind(),
                    }
                }
            };
            items.push(item);
        }
        BatchResult { items }
    }

    pub fn harvest(
        &self,
        descriptor: &Descriptor,
        options: HarvestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestReport, HarvestError> {
        let start = Instant::now();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; searching by {}: {}",
                descriptor.mode(),
                descriptor.as_str()
            ),
            elapsed: None,
        });
        let compound = Resolver::new(&self.pubchem).resolve(descriptor)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} is CID {} ({})",
                compound.display_name, compound.identifier, compound.structure
            ),
            elapsed: Some(start.elapsed()),
        });

        let table = self.search_pubchem(&compound, sink)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Search; {} substructures found on PubChem",
                table.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        let zinc_rows = if options.skip_zinc {
            None
        } else {
            Some(self.search_zinc(&compound, sink)?)
        };
        if let Some(rows) = &zinc_rows {
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Search; {} similar substances found on ZINC15",
                    rows.len()
                ),
                elapsed: Some(start.elapsed()),
            });
        }

        let quota = Quota::split(options.max, !options.skip_zinc);
        if let Some(max) = options.max {
            sink.event(ProgressEvent {
                message: format!("phase=Store; download limited to {max} molecules"),
                elapsed: None,
            });
        }
        sink.event(ProgressEvent {
            message: "phase=Store; writing files".to_string(),
            elapsed: None,
        });
        let files = self.materializer.write(&table, zinc_rows.as_deref(), quota)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {} structure files for {}",
                files.structures.len(),
                compound.display_name
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok(HarvestReport {
            descriptor: descriptor.as_str().to_string(),
            mode: descriptor.mode().to_string(),
            pubchem_rows: table.len(),
            zinc_rows: zinc_rows.as_ref().map(Vec::len),
            compound,
            files,
            harvested_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn search_pubchem(
        &self,
        compound: &Compound,
        sink: &dyn ProgressSink,
    ) -> Result<CanonicalTable, HarvestError> {
        sink.event(ProgressEvent {
            message: "pubchem.substructure.submit".to_string(),
            elapsed: None,
        });
        let handle = SearchSubmitter::new(&self.pubchem).submit(&compound.structure)?;

        let poller = PollController::new(&self.pubchem, self.poll);
        sink.event(ProgressEvent {
            message: format!(
                "pubchem.substructure.poll list_key={handle} first_wait_ms={}",
                poller.policy().initial_wait.as_millis()
            ),
            elapsed: None,
        });
        let started = Instant::now();
        let rows = poller.redeem(handle)?;
        sink.event(ProgressEvent {
            message: format!(
                "pubchem.substructure.ready latency_ms={}",
                started.elapsed().as_millis()
            ),
            elapsed: None,
        });

        normalize_for(compound, rows)
    }

    fn search_zinc(
        &self,
        compound: &Compound,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<ResultRow>, HarvestError> {
        sink.event(ProgressEvent {
            message: "zinc.request".to_string(),
            elapsed: None,
        });
        let started = Instant::now();
        let rows = self
            .zinc
            .similar(&compound.structure)
            .map_err(|err| match err {
                HarvestError::SearchUnavailable(_) => err,
                other => HarvestError::SearchUnavailable(other.to_string()),
            })?;
        sink.event(ProgressEvent {
            message: format!("zinc.response latency_ms={}", started.elapsed().as_millis()),
            elapsed: None,
        });
        Ok(rows)
    }
}
