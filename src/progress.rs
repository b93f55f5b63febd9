//! Progress streaming to subscribed connections.
//!
//! Connections subscribe either to individual jobs or to the broadcast channel
//! used by monitoring views. A connection subscribed only to job A never sees
//! events for job B, and job events are not copied to the broadcast channel by
//! the broadcaster itself (see [`crate::service::CleaningService`] for the
//! component that publishes to both).
//!
//! ```no_run
//! use neatdata::progress::{ChannelConnection, ProgressBroadcaster, ProgressEvent};
//! # async fn example() {
//! let broadcaster = ProgressBroadcaster::new();
//! let (conn, mut rx) = ChannelConnection::new();
//! let id = broadcaster.connect(conn);
//! broadcaster.subscribe(id, "job-1");
//!
//! broadcaster.publish("job-1", &ProgressEvent::not_found("job-1"));
//! while let Some(text) = rx.recv().await {
//!     println!("{text}");
//! }
//! # }
//! ```

pub mod broadcaster;
pub mod connection;
pub mod event;
pub mod session;

pub use broadcaster::ProgressBroadcaster;
pub use connection::{ChannelConnection, Connection, ConnectionId, DeliveryError};
pub use event::{ClientCommand, ProgressEvent};
pub use session::{SessionControl, SessionKind};
