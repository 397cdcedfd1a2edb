//! Node engine metrics.

use metrics::Counter;
use zsync_net_proto::Command;

/// Counters updated by the engine loop.
#[derive(Clone, Debug)]
pub(crate) struct NodeMetrics {
    /// Fabric events processed
    pub(crate) events_total: Counter,
    /// Protocol messages decoded
    pub(crate) messages_received_total: Counter,
    /// Protocol messages sent (whisper or shout)
    pub(crate) messages_sent_total: Counter,
    /// Events dropped because of an error
    pub(crate) event_errors_total: Counter,
    /// Relays dropped because the peer had no live session
    pub(crate) unresolved_total: Counter,
    /// Snapshot writes that failed
    pub(crate) persist_failures_total: Counter,
    /// Agent or worker replies that missed the deadline
    pub(crate) reply_timeouts_total: Counter,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            events_total: metrics::counter!("zsync.node.events_total"),
            messages_received_total: metrics::counter!("zsync.node.messages_received_total"),
            messages_sent_total: metrics::counter!("zsync.node.messages_sent_total"),
            event_errors_total: metrics::counter!("zsync.node.event_errors_total"),
            unresolved_total: metrics::counter!("zsync.node.unresolved_total"),
            persist_failures_total: metrics::counter!("zsync.node.persist_failures_total"),
            reply_timeouts_total: metrics::counter!("zsync.node.reply_timeouts_total"),
        }
    }
}

impl NodeMetrics {
    pub(crate) fn inc_events(&self) {
        self.events_total.increment(1);
    }

    /// Counts a decoded message, also per command.
    pub(crate) fn inc_received(&self, command: Command) {
        self.messages_received_total.increment(1);
        metrics::counter!("zsync.node.messages_received", "command" => command.to_string())
            .increment(1);
    }

    pub(crate) fn inc_sent(&self) {
        self.messages_sent_total.increment(1);
    }

    pub(crate) fn inc_event_errors(&self) {
        self.event_errors_total.increment(1);
    }

    pub(crate) fn inc_unresolved(&self) {
        self.unresolved_total.increment(1);
    }

    pub(crate) fn inc_persist_failures(&self) {
        self.persist_failures_total.increment(1);
    }

    pub(crate) fn inc_reply_timeouts(&self) {
        self.reply_timeouts_total.increment(1);
    }
}
