//! Startup, failure isolation and shutdown.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{AgentScript, AgentSeen, init_tracing, node, start_raw};
use tokio::sync::mpsc;
use zsync_net_local::{GroupCommand, GroupEvent};
use zsync_net_proto::Message;
use zsync_net_peers::ConnectionStatus;
use zsync_node::{
    CollaboratorChannels, CreditCommand, FileTransferCommand, NodeChannels, NodeError, ZsyncNode,
};
use zsync_primitives::SessionId;
use zsync_storage::{FilePeerStateStore, PeerStateStore};

#[tokio::test]
async fn termination_stops_workers_in_order() {
    init_tracing();
    let (n, mut raw) = start_raw(AgentScript::default()).await;
    let (log_tx, mut log) = mpsc::unbounded_channel();

    let mut transfer = n.transfer;
    let transfer_log = log_tx.clone();
    tokio::spawn(async move {
        while let Some(command) = transfer.recv().await {
            if let FileTransferCommand::Terminate { ack_tx } = command {
                transfer_log.send("transfer signalled").unwrap();
                // A slow worker must still be acked before credit is told.
                tokio::time::sleep(Duration::from_millis(30)).await;
                transfer_log.send("transfer acked").unwrap();
                ack_tx.send(()).unwrap();
            }
        }
    });

    let mut credit = n.credit;
    let credit_log = log_tx.clone();
    tokio::spawn(async move {
        while let Some(command) = credit.recv().await {
            if let CreditCommand::Terminate { ack_tx } = command {
                credit_log.send("credit signalled").unwrap();
                credit_log.send("credit acked").unwrap();
                ack_tx.send(()).unwrap();
            }
        }
    });

    n.agent.terminate().await.unwrap();
    log_tx.send("agent acked").unwrap();

    let mut order = Vec::new();
    while let Ok(entry) = log.try_recv() {
        order.push(entry);
    }
    assert_eq!(
        order,
        [
            "transfer signalled",
            "transfer acked",
            "credit signalled",
            "credit acked",
            "agent acked",
        ]
    );
    assert_eq!(raw.next_command().await, GroupCommand::Stop);
    assert_matches!(n.task.await.unwrap(), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn termination_proceeds_past_silent_workers() {
    init_tracing();
    let (n, _raw) = start_raw(AgentScript::default()).await;

    // Pipes stay open but nobody answers.
    let _transfer = n.transfer;
    let _credit = n.credit;

    n.agent.terminate().await.unwrap();
    assert_matches!(n.task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn malformed_payload_does_not_stop_the_node() {
    init_tracing();
    let (_n, mut raw) = start_raw(AgentScript::default()).await;

    raw.send(GroupEvent::Whisper {
        session: SessionId::from("s1"),
        payload: bytes::Bytes::from_static(b"not a frame"),
    });
    raw.send(GroupEvent::Whisper {
        session: SessionId::from("s1"),
        payload: bytes::Bytes::from_static(&[0xAA, 0x55, 0x07, 0x00]),
    });

    raw.link("s1", node(1)).await;
}

#[tokio::test]
async fn agent_timeout_does_not_stall_the_loop() {
    init_tracing();
    let (mut n, mut raw) = start_raw(AgentScript {
        state: 4,
        silent_state_queries: 1,
    })
    .await;

    raw.send(GroupEvent::Join {
        session: SessionId::from("s1"),
        group: "ZSYNC".to_string(),
    });
    raw.link("s2", node(2)).await;
    assert_eq!(n.next_seen().await, AgentSeen::State);

    // The next join is answered normally.
    raw.send(GroupEvent::Join {
        session: SessionId::from("s3"),
        group: "ZSYNC".to_string(),
    });
    let (session, message) = raw.next_whisper().await;
    assert_eq!(session, SessionId::from("s3"));
    assert_matches!(message, Message::Greet { state: 4, .. });
}

#[tokio::test]
async fn closed_worker_pipe_is_tolerated() {
    init_tracing();
    let (n, mut raw) = start_raw(AgentScript::default()).await;
    drop(n.transfer);

    raw.link("s1", node(1)).await;
    raw.whisper(
        "s1",
        &Message::RequestFiles {
            paths: vec!["a.txt".to_string()],
        },
    );
    raw.link("s2", node(2)).await;
}

#[tokio::test]
async fn closed_transport_stops_the_node() {
    init_tracing();
    let (n, raw) = start_raw(AgentScript::default()).await;
    drop(raw.events);

    assert_matches!(n.task.await.unwrap(), Err(NodeError::TransportClosed));
}

#[tokio::test]
async fn closed_agent_pipe_stops_the_node() {
    init_tracing();
    let (endpoint, _raw) = common::raw_endpoint();
    let dir = tempfile::tempdir().unwrap();
    let (channels, collaborators) = NodeChannels::new();
    let node = ZsyncNode::new(common::test_config(&dir), endpoint, channels).unwrap();
    let task = tokio::spawn(node.run());

    let CollaboratorChannels {
        agent,
        transfer: _transfer,
        credit: _credit,
    } = collaborators;
    drop(agent);

    assert_matches!(task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn state_updates_survive_restart() {
    init_tracing();
    let (n, mut raw) = start_raw(AgentScript::default()).await;
    raw.link("s1", node(1)).await;
    raw.link("s2", node(2)).await;

    raw.whisper(
        "s1",
        &Message::Update {
            state: 5,
            files: vec![],
        },
    );
    raw.whisper(
        "s2",
        &Message::Update {
            state: 12,
            files: vec![],
        },
    );
    // A third link is a sync point for the two updates.
    raw.link("s3", node(3)).await;

    let states = FilePeerStateStore::new(n.dir.path()).load().unwrap();
    assert_eq!(states.get(&node(1)), Some(&5));
    assert_eq!(states.get(&node(2)), Some(&12));

    n.task.abort();
    assert!(n.task.await.unwrap_err().is_cancelled());

    let (endpoint, _raw) = common::raw_endpoint();
    let (channels, _collaborators) = NodeChannels::new();
    let restarted = ZsyncNode::new(common::test_config(&n.dir), endpoint, channels).unwrap();
    let registry = restarted.registry();

    for (id, state) in [(node(1), 5), (node(2), 12)] {
        let peer = registry.get(&id).unwrap();
        assert_eq!(peer.known_state(), state);
        assert_eq!(peer.status(), ConnectionStatus::Unseen);
        assert_eq!(registry.resolve_session(&id), None);
    }
    assert_eq!(registry.session_count(), 0);
}
