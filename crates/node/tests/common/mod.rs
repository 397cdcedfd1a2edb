#![allow(dead_code, unreachable_pub)]

use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use zsync_net_local::{GroupCommand, GroupEndpoint, GroupEvent};
use zsync_net_proto::{Message, decode, encode};
use zsync_node::{
    AgentCommand, AgentHandle, AgentRequest, AgentUpdate, CreditCommand, CreditEvent,
    FileTransferCommand, FileTransferEvent, NodeChannels, NodeConfig, NodeError, Pipe, ZsyncNode,
};
use zsync_primitives::{FileMeta, NodeId, SessionId, State};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// What the scripted agent was asked or told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSeen {
    State,
    Update {
        since: State,
    },
    Chunk {
        path: String,
        size: u64,
        offset: u64,
    },
    PeerUpdate {
        sender: NodeId,
        state: State,
        files: Vec<FileMeta>,
    },
    ChunkReceived {
        sender: NodeId,
        data: Bytes,
        path: String,
        sequence: u64,
        offset: u64,
    },
}

/// How the scripted agent answers.
#[derive(Debug, Clone, Default)]
pub struct AgentScript {
    /// Reported local state.
    pub state: State,
    /// Number of leading State queries left unanswered.
    pub silent_state_queries: usize,
}

fn spawn_agent(
    mut pipe: Pipe<AgentCommand, AgentRequest>,
    mut script: AgentScript,
) -> mpsc::UnboundedReceiver<AgentSeen> {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // Unanswered replies are parked here so they never resolve.
        let mut parked: Vec<oneshot::Sender<State>> = Vec::new();
        while let Some(request) = pipe.recv().await {
            let seen = match request {
                AgentRequest::State { response_tx } => {
                    if script.silent_state_queries > 0 {
                        script.silent_state_queries -= 1;
                        parked.push(response_tx);
                    } else {
                        let _ = response_tx.send(script.state);
                    }
                    AgentSeen::State
                }
                AgentRequest::Update { since, response_tx } => {
                    let _ = response_tx.send(AgentUpdate {
                        state: script.state,
                        files: vec![],
                    });
                    AgentSeen::Update { since }
                }
                AgentRequest::Chunk {
                    path,
                    size,
                    offset,
                    response_tx,
                } => {
                    let len = usize::try_from(size).unwrap();
                    let _ = response_tx.send(Bytes::from(vec![0xAB; len]));
                    AgentSeen::Chunk { path, size, offset }
                }
                AgentRequest::PeerUpdate {
                    sender,
                    state,
                    files,
                } => AgentSeen::PeerUpdate {
                    sender,
                    state,
                    files,
                },
                AgentRequest::ChunkReceived {
                    sender,
                    data,
                    path,
                    sequence,
                    offset,
                } => AgentSeen::ChunkReceived {
                    sender,
                    data,
                    path,
                    sequence,
                    offset,
                },
            };
            if seen_tx.send(seen).is_err() {
                break;
            }
        }
    });
    seen_rx
}

/// A running node with a scripted agent and test-owned worker pipes.
pub struct TestNode {
    pub node_id: NodeId,
    pub task: JoinHandle<Result<(), NodeError>>,
    pub agent: AgentHandle,
    pub agent_seen: mpsc::UnboundedReceiver<AgentSeen>,
    pub transfer: Pipe<FileTransferEvent, FileTransferCommand>,
    pub credit: Pipe<CreditEvent, CreditCommand>,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> NodeConfig {
    NodeConfig {
        reply_timeout_ms: 100,
        interconnect_delay_ms: 0,
        ..NodeConfig::with_data_dir(dir.path())
    }
}

pub fn start_node(endpoint: GroupEndpoint, script: AgentScript) -> TestNode {
    let dir = tempfile::tempdir().unwrap();
    start_node_with(endpoint, script, test_config(&dir), dir)
}

pub fn start_node_with(
    endpoint: GroupEndpoint,
    script: AgentScript,
    config: NodeConfig,
    dir: TempDir,
) -> TestNode {
    let (channels, collaborators) = NodeChannels::new();
    let node = ZsyncNode::new(config, endpoint, channels).unwrap();
    let node_id = node.node_id();
    let task = tokio::spawn(node.run());

    let agent = collaborators.agent_handle();
    let agent_seen = spawn_agent(collaborators.agent, script);

    TestNode {
        node_id,
        task,
        agent,
        agent_seen,
        transfer: collaborators.transfer,
        credit: collaborators.credit,
        dir,
    }
}

impl TestNode {
    pub async fn next_seen(&mut self) -> AgentSeen {
        tokio::time::timeout(WAIT, self.agent_seen.recv())
            .await
            .expect("agent saw nothing")
            .expect("agent task ended")
    }

    /// Wait until the agent sees something matching `pred`, skipping the rest.
    pub async fn wait_seen(&mut self, pred: impl Fn(&AgentSeen) -> bool) -> AgentSeen {
        loop {
            let seen = self.next_seen().await;
            if pred(&seen) {
                return seen;
            }
        }
    }
}

/// Test side of a fabric endpoint: inject events, observe commands.
pub struct RawTransport {
    pub events: mpsc::UnboundedSender<GroupEvent>,
    pub commands: mpsc::UnboundedReceiver<GroupCommand>,
}

pub fn raw_endpoint() -> (GroupEndpoint, RawTransport) {
    let (command_tx, commands) = mpsc::unbounded_channel();
    let (events, event_rx) = mpsc::unbounded_channel();
    (
        GroupEndpoint::new(SessionId::from("local"), command_tx, event_rx),
        RawTransport { events, commands },
    )
}

impl RawTransport {
    pub fn send(&self, event: GroupEvent) {
        self.events.send(event).unwrap();
    }

    pub fn whisper(&self, from: &str, message: &Message) {
        self.send(GroupEvent::Whisper {
            session: SessionId::from(from),
            payload: encode(message).unwrap(),
        });
    }

    /// Greet as `id` from `from` and wait for the LAST_STATE reply.
    pub async fn link(&mut self, from: &str, id: NodeId) {
        self.send(GroupEvent::Enter {
            session: SessionId::from(from),
        });
        self.whisper(
            from,
            &Message::Greet {
                node_id: id,
                state: 0,
            },
        );
        let (session, message) = self.next_whisper().await;
        assert_eq!(session, SessionId::from(from));
        assert_eq!(message, Message::LastState { state: 0 });
    }

    pub async fn next_command(&mut self) -> GroupCommand {
        tokio::time::timeout(WAIT, self.commands.recv())
            .await
            .expect("no command from node")
            .expect("node dropped its endpoint")
    }

    /// Next whisper, skipping nothing: any other command fails the test.
    pub async fn next_whisper(&mut self) -> (SessionId, Message) {
        match self.next_command().await {
            GroupCommand::Whisper { session, payload } => (session, decode(&payload).unwrap()),
            other => panic!("expected whisper, got {other:?}"),
        }
    }
}

pub fn node(n: u8) -> NodeId {
    NodeId::new([n; 16])
}

/// Start a node on a raw endpoint and consume its initial group join.
pub async fn start_raw(script: AgentScript) -> (TestNode, RawTransport) {
    let (endpoint, mut raw) = raw_endpoint();
    let node = start_node(endpoint, script);
    assert_eq!(
        raw.next_command().await,
        GroupCommand::Join {
            group: "ZSYNC".to_string()
        }
    );
    (node, raw)
}
