//! Service Worker Events
//!
//! Page messages, push payloads, notification clicks and the worker's view
//! of its clients.

use serde::{Deserialize, Serialize};

/// Messages pages post to the worker, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate a waiting worker now
    SkipWaiting,
    /// Performance mark echoed to the worker log
    PerformanceMark {
        name: String,
        #[serde(default)]
        value: Option<f64>,
    },
}

impl WorkerMessage {
    /// Parse a posted JSON message
    pub fn parse(data: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Message handling errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Not JSON, or an unknown `type`
    #[error("unrecognised worker message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// `SKIP_WAITING` started activation and it failed
    #[error("activation after SKIP_WAITING failed: {0}")]
    Activation(#[from] super::ServiceWorkerError),
}

/// What a message caused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The waiting worker was activated
    Activated(super::ActivationReport),
    /// Written to the log only
    Logged,
    /// Valid but not applicable in the current state
    Ignored,
}

/// Push message as delivered by the push service
#[derive(Debug, Clone, Default)]
pub struct PushEvent {
    data: Option<Vec<u8>>,
}

impl PushEvent {
    pub fn new(data: Option<Vec<u8>>) -> Self {
        Self { data }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(Some(text.as_bytes().to_vec()))
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Payload as UTF-8, if it is
    pub fn text(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| std::str::from_utf8(d).ok().map(|s| s.to_string()))
    }

    /// Structured payload; plain text becomes the body.
    pub fn payload(&self) -> PushPayload {
        let Some(text) = self.text() else {
            return PushPayload::default();
        };
        match serde_json::from_str::<PushPayload>(&text) {
            Ok(payload) => payload,
            Err(_) => PushPayload {
                body: Some(text),
                ..Default::default()
            },
        }
    }
}

/// Optional JSON form of a push message
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Notification action button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// A shown notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub actions: Vec<NotificationAction>,
    /// URL opened on click
    pub url: String,
}

/// Notification click event
#[derive(Debug, Clone, Default)]
pub struct NotificationClickEvent {
    notification_id: u64,
    action: Option<String>,
}

impl NotificationClickEvent {
    /// Click on the notification body
    pub fn new(notification_id: u64) -> Self {
        Self {
            notification_id,
            action: None,
        }
    }

    /// Click on one of the action buttons
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn notification_id(&self) -> u64 {
        self.notification_id
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

/// Result of a notification click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Notification closed and a window opened at this URL
    Opened(String),
    /// Notification closed only
    Closed,
    /// No such notification
    Unknown,
}

/// Notifications currently on screen
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: Vec<Notification>,
    next_id: u64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notification, assigning its id
    pub fn show(&mut self, mut notification: Notification) -> Notification {
        self.next_id += 1;
        notification.id = self.next_id;
        self.shown.push(notification.clone());
        notification
    }

    /// Close and return a notification
    pub fn close(&mut self, id: u64) -> Option<Notification> {
        let pos = self.shown.iter().position(|n| n.id == id)?;
        Some(self.shown.remove(pos))
    }

    pub fn active(&self) -> &[Notification] {
        &self.shown
    }
}

/// An open page the worker knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: String,
    pub url: String,
    /// Whether this worker controls the client
    pub controlled: bool,
}

/// Open pages within the scope
#[derive(Debug, Default)]
pub struct Clients {
    clients: Vec<ClientInfo>,
    next_id: u64,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ClientInfo> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// All clients, optionally including ones not controlled by this worker
    pub fn match_all(&self, include_uncontrolled: bool) -> Vec<&ClientInfo> {
        self.clients
            .iter()
            .filter(|c| include_uncontrolled || c.controlled)
            .collect()
    }

    /// Register an open page
    pub fn add(&mut self, url: impl Into<String>) -> ClientInfo {
        self.next_id += 1;
        let client = ClientInfo {
            id: format!("client-{}", self.next_id),
            url: url.into(),
            controlled: false,
        };
        self.clients.push(client.clone());
        client
    }

    /// Open a window (a new controlled client)
    pub fn open_window(&mut self, url: &str) -> ClientInfo {
        let mut client = self.add(url);
        client.controlled = true;
        if let Some(last) = self.clients.last_mut() {
            last.controlled = true;
        }
        client
    }

    /// Take control of every client. Returns how many changed controller.
    pub fn claim(&mut self) -> usize {
        let mut claimed = 0;
        for client in self.clients.iter_mut().filter(|c| !c.controlled) {
            client.controlled = true;
            claimed += 1;
        }
        claimed
    }

    /// Forget a closed page
    pub fn remove(&mut self, id: &str) -> bool {
        let len_before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        self.clients.len() != len_before
    }
}
