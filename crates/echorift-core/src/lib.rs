//! Zone lifecycle, registry and scheduling for the EchoRift event.
//!
//! While the event is active, temporary echo points appear in the world,
//! each carrying one distortion. Actor activity inside a point accumulates
//! until the point collapses; points also collapse when their time runs
//! out or the event ends.
//!
//! # Modules
//!
//! - [`clock`] -- Wall clocks, tick conversion and the event time zone.
//! - [`config`] -- Configuration loading from `echorift-config.yaml`.
//! - [`distortion`] -- Weighted distortion selection.
//! - [`host`] -- [`WorldHost`] and [`MessageSink`], the host world surfaces.
//! - [`jobs`] -- Periodic and delayed job bodies.
//! - [`lifecycle`] -- [`EchoEvent`], the event state machine.
//! - [`listener`] -- Actor event handlers and their verdicts.
//! - [`notifier`] -- Collapse messages.
//! - [`operator`] -- Operator commands.
//! - [`persist`] -- [`StatePersistence`], the save/load boundary.
//! - [`placement`] -- Candidate generation and spawn validation.
//! - [`registry`] -- [`ZoneRegistry`], live zones and memberships.
//! - [`scheduler`] -- Tick-based job scheduling.
//! - [`zone`] -- A single echo point.
//!
//! [`WorldHost`]: host::WorldHost
//! [`MessageSink`]: host::MessageSink
//! [`EchoEvent`]: lifecycle::EchoEvent
//! [`StatePersistence`]: persist::StatePersistence
//! [`ZoneRegistry`]: registry::ZoneRegistry

pub mod clock;
pub mod config;
pub mod distortion;
pub mod host;
pub mod jobs;
pub mod lifecycle;
pub mod listener;
pub mod notifier;
pub mod operator;
pub mod persist;
pub mod placement;
pub mod registry;
pub mod scheduler;
pub mod zone;

#[cfg(test)]
mod test_support;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use config::{EchoConfig, SharedConfig};
pub use host::{HostError, MessageSink, WorldHost};
pub use lifecycle::{AutoStart, EchoEvent, EventError, EventParts, EventStatus};
pub use listener::{Denial, DropShift, Knockback, Substitute, Verdict};
pub use operator::OperatorCommand;
pub use persist::{StatePersistence, StoreError};
pub use registry::{ActivityOutcome, CollapseObserver, ZoneRegistry};
pub use zone::Zone;
