//! In-process fabric routing commands between endpoints.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use zsync_primitives::SessionId;

use crate::events::{GroupCommand, GroupEndpoint, GroupEvent};

struct Member {
    events: mpsc::UnboundedSender<GroupEvent>,
    groups: BTreeSet<String>,
}

#[derive(Default)]
struct Hub {
    members: HashMap<SessionId, Member>,
}

impl Hub {
    fn emit(&self, to: &SessionId, event: GroupEvent) {
        if let Some(member) = self.members.get(to) {
            // Receiver gone means the member is shutting down; its exit is
            // handled when its command channel closes.
            let _ = member.events.send(event);
        }
    }

    fn others<'a>(&'a self, me: &'a SessionId) -> impl Iterator<Item = &'a SessionId> + 'a {
        self.members.keys().filter(move |session| *session != me)
    }

    fn enter(&mut self, session: SessionId, events: mpsc::UnboundedSender<GroupEvent>) {
        let existing: Vec<(SessionId, Vec<String>)> = self
            .members
            .iter()
            .map(|(s, m)| (s.clone(), m.groups.iter().cloned().collect()))
            .collect();

        self.members.insert(
            session.clone(),
            Member {
                events,
                groups: BTreeSet::new(),
            },
        );

        for (other, groups) in existing {
            self.emit(
                &other,
                GroupEvent::Enter {
                    session: session.clone(),
                },
            );
            self.emit(
                &session,
                GroupEvent::Enter {
                    session: other.clone(),
                },
            );
            for group in groups {
                self.emit(
                    &session,
                    GroupEvent::Join {
                        session: other.clone(),
                        group,
                    },
                );
            }
        }
    }

    fn join(&mut self, session: &SessionId, group: String) {
        let Some(member) = self.members.get_mut(session) else {
            return;
        };
        if !member.groups.insert(group.clone()) {
            return;
        }
        for other in self.others(session) {
            self.emit(
                other,
                GroupEvent::Join {
                    session: session.clone(),
                    group: group.clone(),
                },
            );
        }
    }

    fn leave(&mut self, session: &SessionId, group: String) {
        let Some(member) = self.members.get_mut(session) else {
            return;
        };
        if !member.groups.remove(&group) {
            return;
        }
        for other in self.others(session) {
            self.emit(
                other,
                GroupEvent::Leave {
                    session: session.clone(),
                    group: group.clone(),
                },
            );
        }
    }

    fn whisper(&self, from: &SessionId, to: &SessionId, payload: Bytes) {
        if !self.members.contains_key(to) {
            debug!(%from, %to, "whisper to unknown session dropped");
            return;
        }
        self.emit(
            to,
            GroupEvent::Whisper {
                session: from.clone(),
                payload,
            },
        );
    }

    fn shout(&self, from: &SessionId, group: String, payload: Bytes) {
        for (other, member) in &self.members {
            if other == from || !member.groups.contains(&group) {
                continue;
            }
            let _ = member.events.send(GroupEvent::Shout {
                session: from.clone(),
                group: group.clone(),
                payload: payload.clone(),
            });
        }
    }

    fn exit(&mut self, session: &SessionId) {
        if self.members.remove(session).is_none() {
            return;
        }
        for other in self.members.keys() {
            self.emit(
                other,
                GroupEvent::Exit {
                    session: session.clone(),
                },
            );
        }
    }
}

/// In-process messaging fabric.
///
/// Cheap to clone; all clones route through the same hub.
#[derive(Clone, Default)]
pub struct LocalFabric {
    hub: Arc<Mutex<Hub>>,
}

impl std::fmt::Debug for LocalFabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFabric")
            .field("members", &self.hub.lock().members.len())
            .finish()
    }
}

impl LocalFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a new member under a fresh random session id.
    ///
    /// Must be called from within a tokio runtime: the member's command router
    /// runs as a spawned task until the member stops or drops its endpoint.
    pub fn connect(&self) -> GroupEndpoint {
        self.connect_as(SessionId::random())
    }

    /// Connect a new member under the given session id.
    pub fn connect_as(&self, session: SessionId) -> GroupEndpoint {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        self.hub.lock().enter(session.clone(), event_tx);
        tokio::spawn(route(self.hub.clone(), session.clone(), command_rx));

        GroupEndpoint::new(session, command_tx, event_rx)
    }

    /// Number of connected members.
    pub fn len(&self) -> usize {
        self.hub.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn route(
    hub: Arc<Mutex<Hub>>,
    session: SessionId,
    mut command_rx: mpsc::UnboundedReceiver<GroupCommand>,
) {
    while let Some(command) = command_rx.recv().await {
        trace!(%session, ?command, "fabric command");
        let mut guard = hub.lock();
        match command {
            GroupCommand::Join { group } => guard.join(&session, group),
            GroupCommand::Leave { group } => guard.leave(&session, group),
            GroupCommand::Whisper {
                session: to,
                payload,
            } => guard.whisper(&session, &to, payload),
            GroupCommand::Shout { group, payload } => guard.shout(&session, group, payload),
            GroupCommand::Stop => break,
        }
    }
    debug!(%session, "fabric member stopped");
    hub.lock().exit(&session);
}
