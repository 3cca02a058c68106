//! War Room presets and actions
//!
//! The concrete queries each board subscribes to, and the handful of
//! writes operators issue from the dashboard.

use crate::config::Preset;
use crate::error::{InvalidMutation, MutationError, StoreError};
use crate::gateway::{AppendWrite, MutationGateway};
use crate::status::{BlockerStatus, BoardStatus};
use crate::store::SetMode;
use crate::types::{CollectionRef, Direction, DocumentId, QueryOptions};
use crate::value::{StoreFields, StoreValue};
use crate::view::{SortKey, SortKeys, ViewSettings};
use chrono::Utc;
use std::collections::BTreeMap;

/// Collection names used by the dashboard
pub mod collections {
    /// Operational blockers board
    pub const BLOCKERS: &str = "blockers";
    /// Sales pipeline board
    pub const PIPELINE: &str = "pipeline";
    /// Client network
    pub const NETWORK: &str = "network";
    /// Agent roster
    pub const AGENTS: &str = "agents";
    /// Chat display log
    pub const CHAT_HISTORY: &str = "chat_history";
    /// Command queue consumed by the agent backend
    pub const COMMANDS: &str = "commands";
    /// Activity log
    pub const LOGS: &str = "logs";
    /// Operator settings
    pub const SETTINGS: &str = "settings";
    /// Headline metrics
    pub const STATS: &str = "stats";
    /// Long-form knowledge documents
    pub const KNOWLEDGE: &str = "knowledge";
}

/// Document holding operator settings
pub const SETTINGS_DOCUMENT: &str = "config";

/// Document holding headline metrics
pub const STATS_DOCUMENT: &str = "current";

/// Document holding the agent memory core
pub const MEMORY_DOCUMENT: &str = "memory_core";

/// Chat history window
pub const CHAT_HISTORY_LIMIT: usize = 50;

/// Activity feed window
pub const LOG_FEED_LIMIT: usize = 10;

/// Built-in presets keyed by board name
#[must_use]
pub fn default_presets() -> BTreeMap<String, Preset> {
    [
        (
            "blockers",
            Preset::new(
                collections::BLOCKERS,
                QueryOptions::new().order_by("impact", Direction::Desc),
            ),
        ),
        (
            "pipeline",
            Preset::new(
                collections::PIPELINE,
                QueryOptions::new().order_by("value", Direction::Desc),
            ),
        ),
        (
            "network",
            Preset::new(
                collections::NETWORK,
                QueryOptions::new().order_by("ltv", Direction::Desc),
            ),
        ),
        (
            "agents",
            Preset::new(
                collections::AGENTS,
                QueryOptions::new().order_by("name", Direction::Asc),
            ),
        ),
        (
            "chat",
            Preset::new(
                collections::CHAT_HISTORY,
                QueryOptions::new()
                    .order_by("timestamp", Direction::Asc)
                    .with_limit(CHAT_HISTORY_LIMIT),
            ),
        ),
        (
            "logs",
            Preset::new(
                collections::LOGS,
                QueryOptions::new()
                    .order_by("time_string", Direction::Desc)
                    .with_limit(LOG_FEED_LIMIT),
            ),
        ),
        (
            "stats",
            Preset::new(
                collections::STATS,
                QueryOptions::for_document(&DocumentId::new(STATS_DOCUMENT)),
            ),
        ),
        (
            "memory",
            Preset::new(
                collections::KNOWLEDGE,
                QueryOptions::for_document(&DocumentId::new(MEMORY_DOCUMENT)),
            ),
        ),
    ]
    .into_iter()
    .map(|(name, preset)| (name.to_string(), preset))
    .collect()
}

/// Blockers board: search title and client, toggle impact then age
#[must_use]
pub fn blocker_view() -> ViewSettings {
    ViewSettings::new(
        &["title", "client"],
        SortKeys {
            primary: SortKey::new("impact", Direction::Desc),
            secondary: SortKey::new("overdueDays", Direction::Desc),
        },
    )
}

/// Pipeline board: search client and project, toggle value then probability
#[must_use]
pub fn pipeline_view() -> ViewSettings {
    ViewSettings::new(
        &["client", "projectTitle"],
        SortKeys {
            primary: SortKey::new("value", Direction::Desc),
            secondary: SortKey::new("probability", Direction::Desc),
        },
    )
}

/// Network board: search name and role, toggle lifetime value then name
#[must_use]
pub fn network_view() -> ViewSettings {
    ViewSettings::new(
        &["name", "role"],
        SortKeys {
            primary: SortKey::new("ltv", Direction::Desc),
            secondary: SortKey::new("name", Direction::Asc),
        },
    )
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatRole {
    /// Operator
    User,
    /// Agent backend
    Assistant,
}

impl ChatRole {
    /// Stored label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Ids written by a chat send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReceipt {
    /// Entry in the command queue
    pub command: DocumentId,
    /// Entry in the chat display log
    pub message: DocumentId,
}

/// Operator actions against the War Room collections
#[derive(Debug, Clone)]
pub struct WarRoom {
    gateway: MutationGateway,
}

impl WarRoom {
    /// Create action set over a gateway
    #[inline]
    #[must_use]
    pub fn new(gateway: MutationGateway) -> Self {
        Self { gateway }
    }

    /// Move a blocker to another column
    ///
    /// # Errors
    /// Any [`MutationError`] from the gateway
    pub async fn move_blocker(&self, id: &DocumentId, status: BlockerStatus) -> Result<(), MutationError> {
        let mut fields = StoreFields::new();
        fields.insert("status".to_string(), status.label().into());

        tracing::info!("Moving blocker {} to {}", id, status);
        self.gateway
            .update(&CollectionRef::new(collections::BLOCKERS), id, fields)
            .await
    }

    /// Snooze a blocker, stamping when it was snoozed
    ///
    /// # Errors
    /// Any [`MutationError`] from the gateway
    pub async fn snooze_blocker(&self, id: &DocumentId) -> Result<(), MutationError> {
        let mut fields = StoreFields::new();
        fields.insert("status".to_string(), BlockerStatus::Snoozed.label().into());
        fields.insert("snoozedAt".to_string(), StoreValue::server_timestamp());

        tracing::info!("Snoozing blocker {}", id);
        self.gateway
            .update(&CollectionRef::new(collections::BLOCKERS), id, fields)
            .await
    }

    /// Queue an operator command and echo it to the chat log
    ///
    /// # Errors
    /// - `MutationError::Invalid(InvalidMutation::BlankMessage)` for blank text
    /// - `MutationError::PartialWrite` if only one of the two writes landed
    /// - `MutationError::Failed` if neither landed
    pub async fn send_chat(&self, text: &str) -> Result<ChatReceipt, MutationError> {
        if text.trim().is_empty() {
            return Err(InvalidMutation::BlankMessage.into());
        }

        let role = ChatRole::User.label();

        let mut command = StoreFields::new();
        command.insert("text".to_string(), text.into());
        command.insert("timestamp".to_string(), StoreValue::server_timestamp());
        command.insert("status".to_string(), "pending".into());
        command.insert("role".to_string(), role.into());

        let mut message = StoreFields::new();
        message.insert("text".to_string(), text.into());
        message.insert("role".to_string(), role.into());
        message.insert("timestamp".to_string(), StoreValue::server_timestamp());

        let ids = self
            .gateway
            .append_dual(vec![
                AppendWrite::new(collections::COMMANDS, command),
                AppendWrite::new(collections::CHAT_HISTORY, message),
            ])
            .await?;

        let mut ids = ids.into_iter();
        match (ids.next(), ids.next()) {
            (Some(command), Some(message)) => Ok(ChatReceipt { command, message }),
            _ => Err(MutationError::Failed {
                cause: StoreError::Internal("append returned too few document ids".to_string()),
            }),
        }
    }

    /// Replace operator settings
    ///
    /// # Errors
    /// Any [`MutationError`] from the gateway
    pub async fn save_settings(&self, settings: StoreFields) -> Result<(), MutationError> {
        let mut fields = settings;
        fields.insert("updatedAt".to_string(), Utc::now().into());

        tracing::info!("Saving settings ({} fields)", fields.len());
        self.gateway
            .set(
                &CollectionRef::new(collections::SETTINGS),
                &DocumentId::new(SETTINGS_DOCUMENT),
                fields,
                SetMode::Overwrite,
            )
            .await
    }
}
