//! The node engine: one owned context driven by a single `select!` loop.

mod dispatch;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};
use zsync_net_local::{GroupCommand, GroupEndpoint, GroupEvent};
use zsync_net_peers::PeerRegistry;
use zsync_net_proto::{Message, decode, encode};
use zsync_primitives::{NodeId, SessionId};
use zsync_storage::{FilePeerStateStore, IdentityStore, PeerStateStore};

use crate::agent::{AgentCommand, AgentRequest};
use crate::config::NodeConfig;
use crate::error::{EngineError, NodeError};
use crate::metrics::NodeMetrics;
use crate::pipe::{NodeChannels, Pipe};
use crate::workers::{CreditCommand, CreditEvent, FileTransferCommand, FileTransferEvent};

const TRANSFER: &str = "file transfer";
const CREDIT: &str = "credit";

/// A zsync node.
///
/// Owns the peer registry, the snapshot store, the fabric endpoint and the
/// engine ends of the control pipes. Built with [`ZsyncNode::new`], then
/// driven to completion with [`ZsyncNode::run`].
pub struct ZsyncNode {
    config: NodeConfig,
    node_id: NodeId,
    registry: PeerRegistry,
    store: Arc<dyn PeerStateStore>,
    transport: GroupEndpoint,
    agent: Pipe<AgentRequest, AgentCommand>,
    transfer: Pipe<FileTransferCommand, FileTransferEvent>,
    credit: Pipe<CreditCommand, CreditEvent>,
    transfer_open: bool,
    credit_open: bool,
    terminated: bool,
    metrics: NodeMetrics,
}

impl std::fmt::Debug for ZsyncNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZsyncNode")
            .field("node_id", &self.node_id)
            .field("group", &self.config.group)
            .field("peers", &self.registry.len())
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl ZsyncNode {
    /// Create a node persisting its peer snapshot under `config.data_dir`.
    ///
    /// Loads (or creates) the node identity, loads the snapshot and joins the
    /// configured group.
    pub fn new(
        config: NodeConfig,
        transport: GroupEndpoint,
        channels: NodeChannels,
    ) -> Result<Self, NodeError> {
        let store = Arc::new(FilePeerStateStore::new(&config.data_dir));
        Self::with_store(config, store, transport, channels)
    }

    /// Like [`ZsyncNode::new`], with a caller supplied snapshot store.
    pub fn with_store(
        config: NodeConfig,
        store: Arc<dyn PeerStateStore>,
        transport: GroupEndpoint,
        channels: NodeChannels,
    ) -> Result<Self, NodeError> {
        let node_id = IdentityStore::new(&config.data_dir).load_or_create()?;
        let registry = PeerRegistry::from_states(store.load()?);
        info!(%node_id, session = %transport.session, peers = registry.len(), "node initialized");

        transport
            .command_tx
            .send(GroupCommand::Join {
                group: config.group.clone(),
            })
            .map_err(|_| NodeError::TransportClosed)?;

        let NodeChannels {
            agent,
            transfer,
            credit,
        } = channels;

        Ok(Self {
            config,
            node_id,
            registry,
            store,
            transport,
            agent,
            transfer,
            credit,
            transfer_open: true,
            credit_open: true,
            terminated: false,
            metrics: NodeMetrics::default(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Run the event loop.
    ///
    /// Returns once the agent terminates the node or drops its pipe. A closed
    /// fabric endpoint is an error.
    pub async fn run(mut self) -> Result<(), NodeError> {
        // Give the fabric time to interconnect before handling traffic.
        tokio::time::sleep(self.config.interconnect_delay()).await;
        info!(node_id = %self.node_id, group = %self.config.group, "node running");

        while !self.terminated {
            tokio::select! {
                event = self.transport.event_rx.recv() => {
                    let Some(event) = event else {
                        warn!(node_id = %self.node_id, "group transport closed, stopping node");
                        return Err(NodeError::TransportClosed);
                    };
                    self.metrics.inc_events();
                    let result = self.handle_group_event(event).await;
                    self.record(result);
                }
                command = self.agent.recv() => {
                    let Some(command) = command else {
                        warn!(node_id = %self.node_id, "sync agent pipe closed, stopping node");
                        break;
                    };
                    let result = self.handle_agent_command(command).await;
                    self.record(result);
                }
                event = self.transfer.recv(), if self.transfer_open => match event {
                    Some(event) => {
                        let result = self.handle_transfer_event(event).await;
                        self.record(result);
                    }
                    None => {
                        warn!("file transfer pipe closed");
                        self.transfer_open = false;
                    }
                },
                event = self.credit.recv(), if self.credit_open => match event {
                    Some(event) => {
                        let result = self.handle_credit_event(event);
                        self.record(result);
                    }
                    None => {
                        warn!("credit pipe closed");
                        self.credit_open = false;
                    }
                },
            }
        }

        info!(node_id = %self.node_id, "node stopped");
        Ok(())
    }

    fn record(&self, result: Result<(), EngineError>) {
        let Err(e) = result else { return };
        self.metrics.inc_event_errors();
        match e {
            EngineError::Timeout { .. } => {
                self.metrics.inc_reply_timeouts();
                warn!(error = %e, "collaborator did not reply, event dropped");
            }
            EngineError::Decode(_)
            | EngineError::UnknownSender { .. }
            | EngineError::StateRegression { .. } => {
                warn!(error = %e, "dropping message");
            }
            _ => error!(error = %e, "failed to handle event"),
        }
    }

    async fn handle_group_event(&mut self, event: GroupEvent) -> Result<(), EngineError> {
        match event {
            GroupEvent::Enter { session } => {
                if self.registry.register_session(session.clone()) {
                    debug!(%session, "peer entered");
                }
                Ok(())
            }
            GroupEvent::Join { session, group } => {
                if group != self.config.group {
                    trace!(%session, %group, "ignoring join to other group");
                    return Ok(());
                }
                debug!(%session, %group, "peer joined");
                let state = self
                    .query_agent("state", |response_tx| AgentRequest::State { response_tx })
                    .await?;
                self.whisper(
                    &session,
                    &Message::Greet {
                        node_id: self.node_id,
                        state,
                    },
                )
            }
            GroupEvent::Leave { session, group } => {
                if group == self.config.group
                    && let Some(peer) = self.registry.mark_left(&session)
                {
                    debug!(%peer, %session, "peer left group");
                }
                Ok(())
            }
            GroupEvent::Exit { session } => {
                match self.registry.remove_session(&session) {
                    Some(peer) => info!(%peer, %session, "peer exited"),
                    None => debug!(%session, "unlinked session exited"),
                }
                Ok(())
            }
            GroupEvent::Whisper { session, payload } | GroupEvent::Shout { session, payload, .. } => {
                let message = decode(&payload).map_err(EngineError::Decode)?;
                self.metrics.inc_received(message.command());
                self.dispatch(session, message).await
            }
        }
    }

    async fn handle_agent_command(&mut self, command: AgentCommand) -> Result<(), EngineError> {
        match command {
            AgentCommand::RequestFiles { peer, paths, size } => {
                let Some(session) = self.resolve(&peer) else {
                    return Ok(());
                };
                debug!(%peer, files = paths.len(), size, "requesting files");
                self.whisper(&session, &Message::RequestFiles { paths })?;
                self.credit
                    .send(CreditCommand::Request { peer, size })
                    .map_err(|_| EngineError::WorkerClosed(CREDIT))
            }
            AgentCommand::Update { state, files } => {
                debug!(state, files = files.len(), "announcing update");
                self.shout(&Message::Update { state, files })
            }
            AgentCommand::Terminate { ack_tx } => {
                self.terminate(ack_tx).await;
                Ok(())
            }
        }
    }

    async fn handle_transfer_event(&mut self, event: FileTransferEvent) -> Result<(), EngineError> {
        match event {
            FileTransferEvent::ChunkReady {
                peer,
                path,
                sequence,
                chunk_size,
                offset,
            } => {
                let Some(session) = self.resolve(&peer) else {
                    return Ok(());
                };
                let data = self
                    .query_agent("chunk", |response_tx| AgentRequest::Chunk {
                        path: path.clone(),
                        size: chunk_size,
                        offset,
                        response_tx,
                    })
                    .await?;
                trace!(%peer, %path, sequence, offset, len = data.len(), "sending chunk");
                self.whisper(
                    &session,
                    &Message::SendChunk {
                        sequence,
                        path,
                        offset,
                        data,
                    },
                )
            }
        }
    }

    fn handle_credit_event(&mut self, event: CreditEvent) -> Result<(), EngineError> {
        match event {
            CreditEvent::Grant { peer, message } => {
                let Some(session) = self.resolve(&peer) else {
                    return Ok(());
                };
                self.whisper(&session, &message)
            }
        }
    }

    /// Stop the fabric endpoint, then each worker in turn, then ack the agent.
    async fn terminate(&mut self, ack_tx: oneshot::Sender<()>) {
        info!(node_id = %self.node_id, "terminating node");
        if self.transport.command_tx.send(GroupCommand::Stop).is_err() {
            debug!("group transport already closed");
        }

        let (tx, rx) = oneshot::channel();
        let _ = self.transfer.send(FileTransferCommand::Terminate { ack_tx: tx });
        self.await_ack(TRANSFER, rx).await;

        let (tx, rx) = oneshot::channel();
        let _ = self.credit.send(CreditCommand::Terminate { ack_tx: tx });
        self.await_ack(CREDIT, rx).await;

        if ack_tx.send(()).is_err() {
            debug!("agent dropped terminate ack");
        }
        self.terminated = true;
    }

    async fn await_ack(&self, worker: &'static str, rx: oneshot::Receiver<()>) {
        match timeout(self.config.reply_timeout(), rx).await {
            Ok(Ok(())) => debug!(worker, "worker stopped"),
            Ok(Err(_)) => warn!(worker, "worker went away without acking terminate"),
            Err(_) => {
                self.metrics.inc_reply_timeouts();
                warn!(worker, timeout = ?self.config.reply_timeout(), "worker terminate ack timed out");
            }
        }
    }

    /// Ask the agent something and wait for the reply, bounded by
    /// `reply_timeout`.
    async fn query_agent<T>(
        &self,
        request: &'static str,
        make: impl FnOnce(oneshot::Sender<T>) -> AgentRequest,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.agent
            .send(make(tx))
            .map_err(|_| EngineError::AgentClosed)?;

        let after = self.config.reply_timeout();
        match timeout(after, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(EngineError::NoReply(request)),
            Err(_) => Err(EngineError::Timeout { request, after }),
        }
    }

    fn notify_agent(&self, request: AgentRequest) -> Result<(), EngineError> {
        self.agent.send(request).map_err(|_| EngineError::AgentClosed)
    }

    /// Live session for `peer`, or `None` (logged) if it has none.
    fn resolve(&self, peer: &NodeId) -> Option<SessionId> {
        let session = self.registry.resolve_session(peer).cloned();
        if session.is_none() {
            debug!(%peer, "no live session for peer, dropping");
            self.metrics.inc_unresolved();
        }
        session
    }

    fn whisper(&self, session: &SessionId, message: &Message) -> Result<(), EngineError> {
        let payload = encode_message(message)?;
        trace!(%session, command = %message.command(), "whisper");
        self.transport
            .command_tx
            .send(GroupCommand::Whisper {
                session: session.clone(),
                payload,
            })
            .map_err(|_| EngineError::TransportClosed)?;
        self.metrics.inc_sent();
        Ok(())
    }

    fn shout(&self, message: &Message) -> Result<(), EngineError> {
        let payload = encode_message(message)?;
        trace!(group = %self.config.group, command = %message.command(), "shout");
        self.transport
            .command_tx
            .send(GroupCommand::Shout {
                group: self.config.group.clone(),
                payload,
            })
            .map_err(|_| EngineError::TransportClosed)?;
        self.metrics.inc_sent();
        Ok(())
    }

    /// Rewrite the whole snapshot. Failures are logged; the next state change
    /// writes it again.
    fn persist_states(&self) {
        if let Err(e) = self.store.save(&self.registry.states()) {
            self.metrics.inc_persist_failures();
            error!(error = %e, "failed to persist peer states");
        }
    }
}

fn encode_message(message: &Message) -> Result<Bytes, EngineError> {
    encode(message).map_err(|source| EngineError::Encode {
        command: message.command(),
        source,
    })
}
