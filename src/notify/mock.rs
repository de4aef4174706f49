// src/notify/mock.rs
use std::collections::HashMap;
use std::sync::Mutex;

use tokio::time::Instant;

use super::{Notifier, PublishResponse};
use crate::error::{IndexerError, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Status(u16),
    TransportError(String),
}

/// Test helper: answers 200 unless told otherwise and records every call.
#[derive(Debug, Default)]
pub struct ScriptedNotifier {
    script: HashMap<String, Scripted>,
    pub calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.script.insert(url.to_string(), Scripted::Status(status));
        self
    }

    pub fn with_transport_error(mut self, url: &str, msg: &str) -> Self {
        self.script
            .insert(url.to_string(), Scripted::TransportError(msg.to_string()));
        self
    }

    pub fn published(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .collect()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for ScriptedNotifier {
    async fn publish(&self, url: &str) -> Result<PublishResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        match self.script.get(url) {
            Some(Scripted::Status(status)) => Ok(PublishResponse { status: *status }),
            Some(Scripted::TransportError(msg)) => Err(IndexerError::Transport(msg.clone())),
            None => Ok(PublishResponse { status: 200 }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
