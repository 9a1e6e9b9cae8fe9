//! The concurrent, multi-connection switching fabric for the message bus
//!: admission, identity assignment, subscription tracking,
//! forwarding, BLOB relay, and the `"eagiMsgBus"` control-plane table.

mod admission;
mod auth;
mod config;
mod control;
mod dispatch;
mod endpoint_info;
mod error;
mod forward;
mod ids;
mod node;
mod parent;
mod pending;
mod registry;
mod router;
mod stats;

pub use auth::{encrypt_nonce, matches_encrypted_shared_password, random_nonce, NONCE_LEN};
pub use config::RouterConfig;
pub use endpoint_info::EndpointInfo;
pub use error::RouterError;
pub use forward::DropReason;
pub use ids::ControlIds;
pub use node::{NodeFilters, RoutedNode};
pub use parent::{ParentLink, CONFIRM_TIMEOUT};
pub use pending::PendingConnection;
pub use registry::{RouterDescriptor, RouterRegistry};
pub use router::Router;
pub use stats::{AgeTracker, RouterStats, STATS_WINDOW};
