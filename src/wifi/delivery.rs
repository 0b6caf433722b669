//! Event-delivery queue.
//!
//! The station manager never runs user code itself. Resolved completions and
//! topic notifications go into an [`EventSink`]; the default sink is a tokio
//! unbounded channel drained by a [`Dispatcher`] on the caller's context.
//! Sending never blocks, so it is safe from the driver's event task.
//!
//! ```
//! use esp32_wifi_station::wifi::delivery::{channel, Notification, Topic};
//! use esp32_wifi_station::wifi::EventSink;
//! use std::sync::{Arc, Mutex};
//!
//! let (sink, mut dispatcher) = channel();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&seen);
//! dispatcher.on(Topic::DhcpTimeout, move |n| log.lock().unwrap().push(n.topic()));
//!
//! sink.notify(Notification::DhcpTimeout);
//! assert_eq!(dispatcher.dispatch_pending(), 1);
//! assert_eq!(*seen.lock().unwrap(), vec![Topic::DhcpTimeout]);
//! ```

use super::completion::{CompletionHandle, Outcome};
use super::types::{AuthMode, DisconnectReason, MacAddr};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Destination for resolved completions and notifications.
pub trait EventSink: Send + Sync {
    /// Queue `handle` to be invoked with `outcome` exactly once, later.
    fn enqueue(&self, handle: CompletionHandle, outcome: Outcome);

    /// Queue a topic notification for listeners.
    fn notify(&self, notification: Notification);
}

/// Notification topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Disconnected,
    Associated,
    Connected,
    StaJoined,
    StaLeft,
    AuthChange,
    DhcpTimeout,
    ProbeRecv,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Self::Disconnected,
        Self::Associated,
        Self::Connected,
        Self::StaJoined,
        Self::StaLeft,
        Self::AuthChange,
        Self::DhcpTimeout,
        Self::ProbeRecv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Associated => "associated",
            Self::Connected => "connected",
            Self::StaJoined => "sta_joined",
            Self::StaLeft => "sta_left",
            Self::AuthChange => "auth_change",
            Self::DhcpTimeout => "dhcp_timeout",
            Self::ProbeRecv => "probe_recv",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A topic notification and its detail fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Disconnected {
        ssid: String,
        mac: MacAddr,
        reason: DisconnectReason,
    },
    Associated {
        ssid: String,
        mac: MacAddr,
        channel: u8,
    },
    Connected {
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
        gw: Ipv4Addr,
    },
    StaJoined {
        mac: MacAddr,
    },
    StaLeft {
        mac: MacAddr,
    },
    AuthChange {
        #[serde(rename = "oldMode")]
        old_mode: AuthMode,
        #[serde(rename = "newMode")]
        new_mode: AuthMode,
    },
    DhcpTimeout,
    ProbeRecv {
        mac: MacAddr,
        rssi: i32,
    },
}

impl Notification {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Disconnected { .. } => Topic::Disconnected,
            Self::Associated { .. } => Topic::Associated,
            Self::Connected { .. } => Topic::Connected,
            Self::StaJoined { .. } => Topic::StaJoined,
            Self::StaLeft { .. } => Topic::StaLeft,
            Self::AuthChange { .. } => Topic::AuthChange,
            Self::DhcpTimeout => Topic::DhcpTimeout,
            Self::ProbeRecv { .. } => Topic::ProbeRecv,
        }
    }

    /// JSON rendering, e.g. `{"event":"connected","ip":"10.0.0.5",...}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            warn!("Failed to serialize {} notification: {}", self.topic(), e);
            format!("{{\"event\":\"{}\"}}", self.topic())
        })
    }
}

/// An item on the delivery queue.
#[derive(Debug)]
pub enum Delivery {
    Completion {
        handle: CompletionHandle,
        outcome: Outcome,
    },
    Notification(Notification),
}

/// [`EventSink`] backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Delivery>,
}

impl ChannelSink {
    fn send(&self, delivery: Delivery) {
        if let Err(e) = self.tx.send(delivery) {
            debug!("Dispatcher gone, dropping {:?}", e.0);
        }
    }
}

impl EventSink for ChannelSink {
    fn enqueue(&self, handle: CompletionHandle, outcome: Outcome) {
        self.send(Delivery::Completion { handle, outcome });
    }

    fn notify(&self, notification: Notification) {
        self.send(Delivery::Notification(notification));
    }
}

/// Create a connected sink / dispatcher pair.
pub fn channel() -> (ChannelSink, Dispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelSink { tx },
        Dispatcher {
            rx,
            listeners: HashMap::new(),
        },
    )
}

type Listener = Box<dyn FnMut(&Notification) + Send + 'static>;

/// Drains the delivery queue, invoking completions and topic listeners in
/// queue order.
pub struct Dispatcher {
    rx: UnboundedReceiver<Delivery>,
    listeners: HashMap<Topic, Vec<Listener>>,
}

impl Dispatcher {
    /// Register a listener for `topic`. Listeners for one topic run in
    /// registration order.
    pub fn on<F>(&mut self, topic: Topic, listener: F)
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.listeners
            .entry(topic)
            .or_default()
            .push(Box::new(listener));
    }

    /// Register the same listener for every topic.
    pub fn on_any<F>(&mut self, listener: F)
    where
        F: FnMut(&Notification) + Clone + Send + 'static,
    {
        for topic in Topic::ALL {
            self.on(topic, listener.clone());
        }
    }

    /// Deliver everything currently queued without waiting. Returns the number
    /// of items delivered.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            match self.rx.try_recv() {
                Ok(delivery) => {
                    self.deliver(delivery);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }

    /// Deliver items as they arrive until `cancel` fires or every sink is
    /// dropped.
    pub async fn run(&mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Dispatcher cancelled");
                    break;
                }
                delivery = self.rx.recv() => match delivery {
                    Some(delivery) => self.deliver(delivery),
                    None => {
                        debug!("All sinks dropped, dispatcher exiting");
                        break;
                    }
                },
            }
        }
    }

    fn deliver(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Completion { handle, outcome } => handle.invoke(outcome),
            Delivery::Notification(notification) => {
                let topic = notification.topic();
                match self.listeners.get_mut(&topic) {
                    Some(listeners) => {
                        for listener in listeners.iter_mut() {
                            listener(&notification);
                        }
                    }
                    None => debug!("No listeners for {}", topic),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::types::ScanBatch;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce(Outcome) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for = Arc::clone(&log);
        let make = move |name: &str| {
            let log = Arc::clone(&log_for);
            let name = name.to_string();
            Box::new(move |outcome: Outcome| {
                log.lock().unwrap().push(format!("{}:{:?}", name, outcome));
            }) as Box<dyn FnOnce(Outcome) + Send>
        };
        (log, make)
    }

    #[test]
    fn test_completions_delivered_in_order_once() {
        let (sink, mut dispatcher) = channel();
        let (log, make) = recorder();

        sink.enqueue(CompletionHandle::new(make("a")), Outcome::Success);
        sink.enqueue(CompletionHandle::new(make("b")), Outcome::failed("nope"));
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(dispatcher.dispatch_pending(), 2);
        assert_eq!(dispatcher.dispatch_pending(), 0);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("a:Success"));
        assert!(log[1].starts_with("b:Failed"));
    }

    #[test]
    fn test_listeners_by_topic() {
        let (sink, mut dispatcher) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let connected = Arc::clone(&seen);
        dispatcher.on(Topic::Connected, move |n| {
            connected.lock().unwrap().push(format!("first {}", n.topic()))
        });
        let connected = Arc::clone(&seen);
        dispatcher.on(Topic::Connected, move |n| {
            connected.lock().unwrap().push(format!("second {}", n.topic()))
        });

        sink.notify(Notification::StaLeft {
            mac: MacAddr::default(),
        });
        sink.notify(Notification::Connected {
            ip: Ipv4Addr::new(10, 0, 0, 5),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gw: Ipv4Addr::new(10, 0, 0, 1),
        });
        dispatcher.dispatch_pending();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first connected".to_string(), "second connected".to_string()]
        );
    }

    #[test]
    fn test_on_any_sees_every_topic() {
        let (sink, mut dispatcher) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let all = Arc::clone(&seen);
        dispatcher.on_any(move |n: &Notification| all.lock().unwrap().push(n.topic()));

        sink.notify(Notification::DhcpTimeout);
        sink.notify(Notification::ProbeRecv {
            mac: MacAddr::default(),
            rssi: -40,
        });
        dispatcher.dispatch_pending();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Topic::DhcpTimeout, Topic::ProbeRecv]
        );
    }

    #[test]
    fn test_send_after_dispatcher_dropped_is_silent() {
        let (sink, dispatcher) = channel();
        drop(dispatcher);
        sink.enqueue(CompletionHandle::noop(), Outcome::Success);
        sink.notify(Notification::DhcpTimeout);
    }

    #[test]
    fn test_notification_json() {
        let n = Notification::Disconnected {
            ssid: "home".to_string(),
            mac: MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            reason: DisconnectReason::NO_AP_FOUND,
        };
        let json: serde_json::Value = serde_json::from_str(&n.to_json()).unwrap();
        assert_eq!(json["event"], "disconnected");
        assert_eq!(json["ssid"], "home");
        assert_eq!(json["mac"], "aa:bb:cc:dd:ee:ff");
        assert_eq!(json["reason"], "201");

        let n = Notification::AuthChange {
            old_mode: AuthMode::Wpa2,
            new_mode: AuthMode::Open,
        };
        let json: serde_json::Value = serde_json::from_str(&n.to_json()).unwrap();
        assert_eq!(json["oldMode"], "wpa2");
        assert_eq!(json["newMode"], "open");
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let (sink, mut dispatcher) = channel();
        let (log, make) = recorder();
        let cancel = CancellationToken::new();

        sink.enqueue(
            CompletionHandle::new(make("scan")),
            Outcome::Networks(ScanBatch::default()),
        );
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                dispatcher.run(cancel).await;
            })
        };

        // Let the dispatcher drain the queue before stopping it.
        tokio::task::yield_now().await;
        while log.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(log.lock().unwrap().len(), 1);
        drop(sink);
    }

    #[tokio::test]
    async fn test_run_exits_when_sinks_dropped() {
        let (sink, mut dispatcher) = channel();
        sink.notify(Notification::DhcpTimeout);
        drop(sink);
        dispatcher.run(CancellationToken::new()).await;
    }
}
