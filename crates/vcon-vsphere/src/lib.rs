//! # vcon – vSphere VM orchestration core
//!
//! Resolves a VM by logical path or id and runs one deadline-bounded
//! lifecycle verb against it.
//!
//! ## Modules
//!
//! - **types** – Shared data structures (references, property snapshots, reports, devices)
//! - **error** – Crate-specific error type and exit-code mapping
//! - **platform** – The `Platform` trait every remote interaction goes through
//! - **vsphere** – `Platform` over the vSphere VI/JSON API
//! - **deadline** – Per-operation deadline scopes
//! - **task** – Waiting on host-side tasks
//! - **inventory** – Logical vs. inventory path translation
//! - **devices** – Moving network adapters between networks
//! - **resolver** – Path / id → VM handle
//! - **session** – Authenticated session + datacenter / datastore scope
//! - **vm** – VM lifecycle (clone, configure, power, note, relocate, destroy, report)
//! - **snapshot** – Snapshot create, list, find, remove, revert

pub mod types;
pub mod error;
pub mod platform;
pub mod vsphere;
pub mod deadline;
pub mod task;
pub mod inventory;
pub mod devices;
pub mod resolver;
pub mod session;
pub mod vm;
pub mod snapshot;

pub use error::{VsphereError, VsphereErrorKind, VsphereResult};
pub use platform::Platform;
pub use resolver::VirtualMachine;
pub use session::{Session, SessionOptions};
