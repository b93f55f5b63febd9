//! Helpers for transport layers that expose the broadcaster to clients.
//!
//! A websocket handler (or any other transport) calls one of the `open_*`
//! functions when a client connects, feeds each incoming text frame to
//! [`handle_client_message`], and calls [`close`] when the transport goes away.

use super::broadcaster::ProgressBroadcaster;
use super::connection::{Connection, ConnectionId};
use super::event::{
    ClientCommand, ProgressEvent, connected_reply, pong_reply, unsubscribed_reply,
};
use crate::jobs::Job;
use std::sync::Arc;

/// Channel name used for the "all jobs" stream
pub const BROADCAST_CHANNEL: &str = "all";

/// What the transport should do after a client message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Continue,
    Close,
}

/// Which stream a connection was opened for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Job(String),
    Broadcast,
}

/// Subscribe `connection` to one job and send it the job's current state,
/// or a not-found event when `snapshot` yields `None`.
///
/// `snapshot` runs after the subscription is in place, so a transition published
/// in between reaches the client either as an event or in the snapshot.
pub fn open_job_stream(
    broadcaster: &ProgressBroadcaster,
    connection: Arc<dyn Connection>,
    job_id: &str,
    snapshot: impl FnOnce() -> Option<Job>,
) -> ConnectionId {
    let id = broadcaster.connect(connection);
    broadcaster.subscribe(id, job_id);

    let event = match snapshot() {
        Some(job) => ProgressEvent::from_job(&job),
        None => {
            tracing::debug!("Stream opened for unknown job {job_id}");
            ProgressEvent::not_found(job_id)
        }
    };
    match event.to_json() {
        Ok(text) => {
            broadcaster.send_to(id, &text);
        }
        Err(e) => tracing::error!("Failed to serialise snapshot for job {job_id}: {e}"),
    }
    id
}

/// Join the broadcast channel and send the welcome message
pub fn open_broadcast_stream(
    broadcaster: &ProgressBroadcaster,
    connection: Arc<dyn Connection>,
) -> ConnectionId {
    let id = broadcaster.connect(connection);
    broadcaster.subscribe_all(id);
    broadcaster.send_to(id, &connected_reply(BROADCAST_CHANNEL).to_string());
    id
}

/// React to one text message from a client. Invalid or unknown messages are ignored.
pub fn handle_client_message(
    broadcaster: &ProgressBroadcaster,
    connection: ConnectionId,
    kind: &SessionKind,
    text: &str,
) -> SessionControl {
    match ClientCommand::parse(text) {
        Some(ClientCommand::Ping) => {
            broadcaster.send_to(connection, &pong_reply().to_string());
            SessionControl::Continue
        }
        Some(ClientCommand::Unsubscribe) => {
            let job_id = match kind {
                SessionKind::Job(job_id) => {
                    broadcaster.unsubscribe(connection, job_id);
                    Some(job_id.as_str())
                }
                SessionKind::Broadcast => {
                    broadcaster.unsubscribe_all(connection);
                    None
                }
            };
            broadcaster.send_to(connection, &unsubscribed_reply(job_id).to_string());
            SessionControl::Close
        }
        None => SessionControl::Continue,
    }
}

/// Tear down a connection when its transport closes
pub fn close(broadcaster: &ProgressBroadcaster, connection: ConnectionId) {
    broadcaster.disconnect(connection);
}
