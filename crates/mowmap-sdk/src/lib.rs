//! Mowmap SDK - backend integration for mower map editing
//!
//! Talks to the mower backend over HTTP and WebSocket and keeps a live
//! feature store in sync with its telemetry.

pub mod client;
pub mod notify;
pub mod stream;
pub mod sync;

pub use client::MowerClient;
pub use notify::{Level, Notification, Notifier};
pub use stream::{Topic, TopicStream};
pub use sync::{MapSyncService, SaveError, SaveReport, SyncConfig};
