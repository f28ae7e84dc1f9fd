//! Client core for the ShieldEye SurfaceScan backend.
//!
//! [`Gateway`] is the only component that performs network I/O. The
//! [`ScanController`] runs one scan at a time on top of it and reports
//! progress to its host over a channel.
#![allow(missing_docs)]

pub mod analysis;
pub mod backend;
pub mod controller;
pub mod error;
pub mod export;
pub mod gateway;
pub mod hardening;
pub mod lab;
pub mod monitor;

pub use backend::ScanBackend;
pub use controller::{ControllerEvent, RunId, ScanController, ScanPhase};
pub use error::{GatewayError, LabError, ScanError};
pub use export::ExportFormat;
pub use gateway::{ApiPayload, ConnectionCheck, ConnectionSubscription, Gateway};
pub use monitor::{HealthEvent, HealthMonitor};
