// src/notify/mod.rs
pub mod google;
pub mod mock;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};

/// What the remote service is told about a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    #[default]
    UrlUpdated,
    UrlDeleted,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlUpdated => "URL_UPDATED",
            Self::UrlDeleted => "URL_DELETED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "URL_UPDATED" => Ok(Self::UrlUpdated),
            "URL_DELETED" => Ok(Self::UrlDeleted),
            other => Err(IndexerError::Config(format!(
                "unknown notification type {other:?} (expected URL_UPDATED or URL_DELETED)"
            ))),
        }
    }
}

/// Answer from the remote service for one publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishResponse {
    pub status: u16,
}

impl PublishResponse {
    /// Only a plain 200 counts; any other status is a per-URL failure.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Remote indexing boundary. `Err` means the call itself failed (network, auth).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, url: &str) -> Result<PublishResponse>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_type_parses_case_insensitively() {
        assert_eq!(
            "url_deleted".parse::<NotificationType>().unwrap(),
            NotificationType::UrlDeleted
        );
        assert_eq!(
            " URL_UPDATED ".parse::<NotificationType>().unwrap(),
            NotificationType::UrlUpdated
        );
        assert!("URL_MOVED".parse::<NotificationType>().is_err());
    }

    #[test]
    fn notification_type_serializes_as_api_constant() {
        let s = serde_json::to_string(&NotificationType::UrlUpdated).unwrap();
        assert_eq!(s, r#""URL_UPDATED""#);
    }

    #[test]
    fn only_200_is_success() {
        assert!(PublishResponse { status: 200 }.is_success());
        assert!(!PublishResponse { status: 204 }.is_success());
        assert!(!PublishResponse { status: 429 }.is_success());
    }
}
