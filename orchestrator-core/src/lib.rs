//! Orchestrator Core: the distributed job queue and robot-fleet
//! coordinator behind a desktop/RPA automation platform.
//!
//! This crate is the hardest engineering part of the platform: it
//! guarantees at-least-once execution of each job under worker
//! crashes, provides fair priority-ordered dispatch across
//! heterogeneous environments, reliably detects dead workers, and
//! streams status to live dashboards. It has no opinion on what a
//! workflow *does* — the execution engine that interprets a node
//! graph inside a robot is an external collaborator this crate treats
//! as an opaque payload consumer that eventually calls `complete` or
//! `fail`.
//!
//! ```rust
//! use orchestrator_core::{Config, OrchestratorEngine, RequestCtx};
//! use orchestrator_core::dispatch::SubmitRequest;
//!
//! # async fn run() -> orchestrator_core::error::OrchestratorResult<()> {
//! let engine = OrchestratorEngine::new(Config::from_env());
//! let ctx = RequestCtx::new("tenant_123");
//!
//! let job_id = engine
//!     .submit(&ctx, SubmitRequest {
//!         workflow_ref: "wf_invoice_ocr".to_string(),
//!         payload: b"{}".to_vec(),
//!         input: serde_json::json!({ "invoice_url": "https://example.com/i.pdf" }),
//!         ..Default::default()
//!     })
//!     .await?;
//! # let _ = job_id;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod notify;
pub mod policy;
pub mod types;
pub mod workflow;

pub use backend::{JobFilter, JobStore, RobotStore};
pub use config::Config;
pub use dispatch::{DispatchDefaults, Dispatcher, SubmitRequest};
pub use engine::OrchestratorEngine;
pub use error::{FailureHint, OrchestratorError, OrchestratorResult};
pub use notify::{LiveMetrics, MetricsSnapshot, NotificationBus};
pub use types::{
    EventKind, IdempotencyKey, JobId, JobRecord, JobSpec, JobStatus, LeaseToken, OrchestratorEvent,
    Priority, RequestCtx, ResourceSample, RobotId, RobotRecord, RobotStatus, SubjectId, SubjectKind,
};
pub use workflow::{NodeConfig, WorkflowConnection, WorkflowDocument, WorkflowNode};

/// Common imports for building an API surface or a robot client over
/// this crate.
pub mod prelude {
    pub use crate::backend::{JobFilter, JobStore, RobotStore};
    pub use crate::dispatch::SubmitRequest;
    pub use crate::error::{FailureHint, OrchestratorError, OrchestratorResult};
    pub use crate::types::{JobId, JobRecord, JobStatus, Priority, RequestCtx, RobotId, RobotRecord, RobotStatus};
    pub use crate::OrchestratorEngine;
    pub use async_trait::async_trait;
}
