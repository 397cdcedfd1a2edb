//! Protocol command handlers.

use bytes::Bytes;
use tracing::{debug, info, trace, warn};
use zsync_net_peers::{LinkResult, Peer};
use zsync_net_proto::{Command, Message};
use zsync_primitives::{FileMeta, NodeId, SessionId, State};

use super::{CREDIT, TRANSFER, ZsyncNode};
use crate::agent::AgentRequest;
use crate::error::EngineError;
use crate::workers::{CreditCommand, FileTransferCommand};

impl ZsyncNode {
    /// Handle one decoded message received on `session`.
    pub(super) async fn dispatch(
        &mut self,
        session: SessionId,
        message: Message,
    ) -> Result<(), EngineError> {
        let command = message.command();
        trace!(%session, %command, "dispatching message");

        match message {
            Message::Greet { node_id, state } => self.on_greet(session, node_id, state),
            Message::LastState { state } => {
                self.linked_sender(&session, command)?;
                self.on_last_state(&session, state).await
            }
            Message::Update { state, files } => {
                let sender = self.linked_sender(&session, command)?;
                self.on_update(sender, state, files)
            }
            Message::RequestFiles { paths } => {
                let peer = self.linked_sender(&session, command)?;
                debug!(%peer, files = paths.len(), "peer requested files");
                self.transfer
                    .send(FileTransferCommand::Request { peer, paths })
                    .map_err(|_| EngineError::WorkerClosed(TRANSFER))
            }
            Message::GiveCredit { amount } => {
                let peer = self.linked_sender(&session, command)?;
                trace!(%peer, amount, "peer gave credit");
                self.transfer
                    .send(FileTransferCommand::Credit { peer, amount })
                    .map_err(|_| EngineError::WorkerClosed(TRANSFER))
            }
            Message::SendChunk {
                sequence,
                path,
                offset,
                data,
            } => {
                let sender = self.linked_sender(&session, command)?;
                self.on_chunk(sender, sequence, path, offset, data)
            }
            Message::Abort => {
                let peer = self.linked_sender(&session, command)?;
                // TODO: cancel the peer's in-flight transfers once the file
                // transfer manager accepts an abort command.
                info!(%peer, "peer aborted transfer, ignoring");
                Ok(())
            }
        }
    }

    fn linked_sender(&self, session: &SessionId, command: Command) -> Result<NodeId, EngineError> {
        self.registry
            .resolve_peer(session)
            .ok_or_else(|| EngineError::UnknownSender {
                session: session.clone(),
                command,
            })
    }

    fn on_greet(
        &mut self,
        session: SessionId,
        node_id: NodeId,
        remote_state: State,
    ) -> Result<(), EngineError> {
        if node_id == self.node_id {
            warn!(%session, "greeting carries our own node id, ignoring");
            return Ok(());
        }

        match self.registry.link(session.clone(), node_id) {
            LinkResult::New => info!(peer = %node_id, %session, remote_state, "peer greeted"),
            LinkResult::Replaced { old_session } => {
                info!(peer = %node_id, %session, %old_session, "peer reconnected on new session")
            }
            LinkResult::SamePeer => debug!(peer = %node_id, %session, "duplicate greeting"),
        }

        let known = self
            .registry
            .get(&node_id)
            .map(Peer::known_state)
            .unwrap_or_default();
        if remote_state < known {
            debug!(peer = %node_id, remote_state, known, "peer is behind our snapshot");
            return Ok(());
        }
        self.whisper(&session, &Message::LastState { state: known })
    }

    async fn on_last_state(&mut self, session: &SessionId, since: State) -> Result<(), EngineError> {
        let update = self
            .query_agent("update", |response_tx| AgentRequest::Update {
                since,
                response_tx,
            })
            .await?;
        debug!(%session, since, state = update.state, files = update.files.len(), "sending update");
        self.whisper(
            session,
            &Message::Update {
                state: update.state,
                files: update.files,
            },
        )
    }

    fn on_update(
        &mut self,
        sender: NodeId,
        state: State,
        files: Vec<FileMeta>,
    ) -> Result<(), EngineError> {
        let known = self
            .registry
            .get(&sender)
            .map(Peer::known_state)
            .unwrap_or_default();
        if !self.config.state_policy.accepts(known, state) {
            return Err(EngineError::StateRegression {
                peer: sender,
                known,
                received: state,
            });
        }

        debug!(peer = %sender, known, state, files = files.len(), "applying peer update");
        self.registry.set_state(&sender, state);
        self.persist_states();
        self.notify_agent(AgentRequest::PeerUpdate {
            sender,
            state,
            files,
        })
    }

    fn on_chunk(
        &mut self,
        sender: NodeId,
        sequence: u64,
        path: String,
        offset: u64,
        data: Bytes,
    ) -> Result<(), EngineError> {
        trace!(peer = %sender, %path, sequence, offset, len = data.len(), "chunk received");
        let consumed = self
            .credit
            .send(CreditCommand::Consume {
                peer: sender,
                bytes: data.len() as u64,
            })
            .map_err(|_| EngineError::WorkerClosed(CREDIT));

        self.notify_agent(AgentRequest::ChunkReceived {
            sender,
            data,
            path,
            sequence,
            offset,
        })?;
        consumed
    }
}
