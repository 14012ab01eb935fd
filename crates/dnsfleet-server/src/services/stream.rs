// ============================================
// File: crates/dnsfleet-server/src/services/stream.rs
// ============================================
//! # Subscriber Event Stream
//!
//! Wraps one broker subscription for a long-lived push connection:
//! events as they arrive, a comment heartbeat when idle, and termination
//! on shutdown. Frames render as server-sent-events text.
//!
//! ## Last Modified
//! v0.1.0 - Initial event stream

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::services::broker::{Event, Subscription, TOPIC_HEALTH_SUMMARY, TOPIC_NODE_HEALTH};

/// Written once when a stream opens: keeps proxies from buffering and sets
/// the client reconnect delay.
pub const SSE_PREAMBLE: &str = ": hello\nretry: 3000\n\n";

/// One unit written to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A published event
    Event(Event),
    /// Keep-alive
    Heartbeat,
}

impl Frame {
    /// Renders the frame as server-sent-events text.
    #[must_use]
    pub fn to_sse(&self) -> String {
        match self {
            Self::Heartbeat => ": ping\n\n".to_owned(),
            Self::Event(event) => {
                let mut out = String::with_capacity(event.topic.len() + event.payload.len() + 16);
                if !event.topic.is_empty() {
                    out.push_str("event: ");
                    out.push_str(&event.topic);
                    out.push('\n');
                }
                for line in event.payload.split('\n') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                out
            }
        }
    }
}

/// Parses a comma separated topic list.
///
/// Blank input selects the health topics.
#[must_use]
pub fn parse_topics(value: Option<&str>) -> Vec<String> {
    let topics: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect();
    if topics.is_empty() {
        vec![TOPIC_HEALTH_SUMMARY.to_owned(), TOPIC_NODE_HEALTH.to_owned()]
    } else {
        topics
    }
}

/// A subscription paced for a push connection.
pub struct EventStream {
    subscription: Subscription,
    heartbeat: Interval,
    shutdown: broadcast::Receiver<()>,
    finished: bool,
}

impl EventStream {
    /// Wraps `subscription`, emitting a heartbeat every `heartbeat`.
    #[must_use]
    pub fn new(subscription: Subscription, heartbeat: Duration, shutdown: broadcast::Receiver<()>) -> Self {
        let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            subscription,
            heartbeat: ticker,
            shutdown,
            finished: false,
        }
    }

    /// Next frame, or `None` once the stream ended.
    ///
    /// The stream ends on shutdown or when the subscription is cancelled,
    /// and stays ended.
    pub async fn next(&mut self) -> Option<Frame> {
        if self.finished {
            return None;
        }
        tokio::select! {
            _ = self.shutdown.recv() => {
                debug!("Event stream closed by shutdown");
                self.finish();
                None
            }
            event = self.subscription.recv() => match event {
                Some(event) => Some(Frame::Event(event)),
                None => {
                    self.finish();
                    None
                }
            },
            _ = self.heartbeat.tick() => Some(Frame::Heartbeat),
        }
    }

    /// Topics this stream receives.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        self.subscription.topics()
    }

    fn finish(&mut self) {
        self.finished = true;
        self.subscription.cancel();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("topics", &self.subscription.topics())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::broker::EventBroker;

    #[test]
    fn test_parse_topics() {
        assert_eq!(parse_topics(None), vec!["health_summary", "node_health"]);
        assert_eq!(parse_topics(Some("  , ")), vec!["health_summary", "node_health"]);
        assert_eq!(parse_topics(Some("node_health, custom ,")), vec!["node_health", "custom"]);
    }

    #[test]
    fn test_sse_rendering() {
        let event = Event {
            topic: Arc::from("health_summary"),
            payload: Arc::from(r#"{"online":2}"#),
        };
        assert_eq!(
            Frame::Event(event).to_sse(),
            "event: health_summary\ndata: {\"online\":2}\n\n"
        );
        assert_eq!(Frame::Heartbeat.to_sse(), ": ping\n\n");

        let multiline = Event {
            topic: Arc::from(""),
            payload: Arc::from("a\nb"),
        };
        assert_eq!(Frame::Event(multiline).to_sse(), "data: a\ndata: b\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_and_heartbeat() {
        let broker = EventBroker::default();
        let (_tx, rx) = broadcast::channel(1);
        let mut stream = EventStream::new(broker.subscribe(["node_health"]), Duration::from_secs(20), rx);

        broker.publish("node_health", "[]");
        match stream.next().await {
            Some(Frame::Event(event)) => assert_eq!(&*event.payload, "[]"),
            other => panic!("expected event, got {other:?}"),
        }

        let started = Instant::now();
        assert_eq!(stream.next().await, Some(Frame::Heartbeat));
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_stream_and_unsubscribes() {
        let broker = EventBroker::default();
        let (tx, rx) = broadcast::channel(1);
        let mut stream = EventStream::new(broker.subscribe(["node_health"]), Duration::from_secs(20), rx);
        assert_eq!(broker.subscriber_count(), 1);

        tx.send(()).unwrap();
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.next().await, None);
        assert_eq!(broker.subscriber_count(), 0);
    }
}
