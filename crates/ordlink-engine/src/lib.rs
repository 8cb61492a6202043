//! Pipeline jobs wiring the pure crates to the provider and store seams.
//!
//! Three long-running jobs, each tolerant of per-item failure and
//! cancellable between items: [`EmbedBackfill`] fills missing vectors,
//! [`LinkageBuilder`] connects regulations to the statute articles they are
//! grounded in, and [`RevisionImpactJob`] turns one statute revision into
//! persisted impact verdicts for the linked regulation articles.

mod backfill;
mod impact;
mod linker;

pub use backfill::{EmbedBackfill, EmbedStats};
pub use impact::{ImpactJobConfig, ImpactRunSummary, RevisionImpactJob, RevisionTrigger};
pub use linker::{LinkRunSummary, LinkageBuilder, LinkerConfig};
