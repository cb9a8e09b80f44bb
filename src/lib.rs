//! Vivify - hot reload for declarative UI definitions.
//!
//! Watches definition sources, parses them through a host-injected parser
//! and reconciles every registered live node tree against the result: nodes
//! in a first pass, constraints in a second, with the constraint set swapped
//! atomically. A failed pass leaves the previous live state standing.
//!
//! ```text
//! sources --watch--> registry --refresh notes--> pipeline --LiveHost--> live tree
//!                       ^                            |
//!                    preload                      report (error feed)
//! ```
//!
//! Hosts integrate through the capability traits in [`host`] and drive the
//! engine from [`session::ReloadSession`]; nothing in here links against a
//! UI toolkit.

pub mod config;
pub mod constraint;
pub mod definition;
pub mod environment;
pub mod error;
pub mod host;
pub mod logger;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod session;
pub mod style;

pub use error::ApplyError;
pub use pipeline::{InstanceId, Registration, SessionEvent};
pub use session::{InstanceToken, ReloadSession};
