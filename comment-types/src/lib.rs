//! Shared types between the widget and the thread API
//!
//! These types are used by both:
//! - the browser widget (WASM, Dioxus components)
//! - any native consumer of the thread API wire format
//!
//! Serializable with serde for JSON over WebSocket/HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Anchors
// ============================================================================

/// Absolute page coordinates, scroll offset included.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

/// The spatial identity of a UI-context comment.
///
/// `selector` is preferred when it still resolves; `coordinates` is the
/// durable fallback once the element has moved on. Superseded wholesale on
/// reposition, never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, TS)]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub struct Anchor {
    pub selector: Option<String>,
    pub xpath: Option<String>,
    pub coordinates: Option<PagePoint>,
}

impl Anchor {
    pub fn from_drop(coordinates: PagePoint, selector: Option<String>) -> Self {
        Self {
            selector,
            xpath: None,
            coordinates: Some(coordinates),
        }
    }

    /// A UI thread needs at least one way back to the page.
    pub fn is_resolvable(&self) -> bool {
        self.selector.is_some() || self.xpath.is_some() || self.coordinates.is_some()
    }
}

// ============================================================================
// Threads
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub enum ContextType {
    Code,
    Ui,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub enum ThreadStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A conversation anchored to a repo+branch and either a code location or a
/// UI anchor. The thread API is the source of truth; the widget holds a
/// client-side cache that converges via reload + realtime events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub struct Thread {
    pub id: String,
    pub repo: String,
    pub branch: String,
    pub context_type: ContextType,

    // UI context
    pub selector: Option<String>,
    pub xpath: Option<String>,
    pub coordinates: Option<PagePoint>,

    // Code context
    pub file_path: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,

    pub status: ThreadStatus,
    pub priority: Priority,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Summary fields for list rendering without a full fetch
    #[serde(default)]
    pub message_count: u32,
    pub first_message_content: Option<String>,

    // Populated by GET /threads/:id only
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn is_open(&self) -> bool {
        self.status == ThreadStatus::Open
    }

    /// The UI anchor of this thread, if it is a UI-context thread.
    pub fn ui_anchor(&self) -> Option<Anchor> {
        if self.context_type != ContextType::Ui {
            return None;
        }
        Some(Anchor {
            selector: self.selector.clone(),
            xpath: self.xpath.clone(),
            coordinates: self.coordinates,
        })
    }
}

/// Exactly-one-context invariant, checked before a create is submitted.
/// UI threads need a resolvable anchor; code threads need a file path.
pub fn validate_new_thread(
    context_type: ContextType,
    anchor: Option<&Anchor>,
    file_path: Option<&str>,
) -> Result<(), String> {
    match context_type {
        ContextType::Ui => {
            if file_path.is_some() {
                return Err("ui thread must not carry a file path".to_string());
            }
            match anchor {
                Some(anchor) if anchor.is_resolvable() => Ok(()),
                _ => Err("ui thread requires a selector, xpath or coordinates".to_string()),
            }
        }
        ContextType::Code => {
            if anchor.is_some_and(Anchor::is_resolvable) {
                return Err("code thread must not carry a ui anchor".to_string());
            }
            if file_path.is_none() {
                return Err("code thread requires a file path".to_string());
            }
            Ok(())
        }
    }
}

// ============================================================================
// Messages & reactions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub struct Reaction {
    pub emoji: String,
    pub user_id: String,
}

/// One post within a thread. Replies reference a top-level message through
/// `parent_message_id`; nesting is exactly one level deep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub content: String,
    pub parent_message_id: Option<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub edited: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.parent_message_id.is_some()
    }

    /// Reactions are unique per (message, user, emoji).
    pub fn has_reaction(&self, user_id: &str, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.user_id == user_id && r.emoji == emoji)
    }
}

/// Resolve the top-level parent a reply should attach to. A reply submitted
/// against another reply re-parents to that reply's own top-level ancestor,
/// keeping threading one level deep.
pub fn clamp_reply_parent(messages: &[Message], parent_id: Option<&str>) -> Option<String> {
    let parent_id = parent_id?;
    let parent = messages.iter().find(|m| m.id == parent_id)?;
    match &parent.parent_message_id {
        Some(top_level) => Some(top_level.clone()),
        None => Some(parent.id.clone()),
    }
}

/// Extract `@name` mention tokens from message content, in order, deduped.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let mut chars = content.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '@' {
            continue;
        }
        // An @ glued to the end of a word is an email, not a mention.
        let preceded_by_word = content[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric());
        if preceded_by_word {
            continue;
        }
        let mut name = String::new();
        while let Some((_, c)) = chars.peek() {
            if c.is_alphanumeric() || *c == '_' || *c == '-' {
                name.push(*c);
                chars.next();
            } else {
                break;
            }
        }
        if !name.is_empty() && !mentions.contains(&name) {
            mentions.push(name);
        }
    }

    mentions
}

// ============================================================================
// Realtime protocol
// ============================================================================

/// Channel messages, JSON over WebSocket, discriminated by `type`.
///
/// All server pushes are merged idempotently client-side: the local session
/// may have already applied the change its own POST caused before the echo
/// arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type")]
#[ts(export, export_to = "../../comment-widget/js/types/generated.ts")]
pub enum RealtimeMsg {
    /// Client → Server: join the room for a repo (optionally repo:branch).
    #[serde(rename = "subscribe")]
    Subscribe { repo: String, branch: Option<String> },

    /// Server → Client: subscription acknowledged.
    #[serde(rename = "subscribed")]
    Subscribed { room: String },

    #[serde(rename = "message:added")]
    MessageAdded { thread_id: String, message: Message },

    #[serde(rename = "message:edited")]
    MessageEdited {
        thread_id: String,
        message_id: String,
        content: String,
    },

    #[serde(rename = "message:deleted")]
    MessageDeleted {
        thread_id: String,
        message_id: String,
    },

    #[serde(rename = "reaction:added")]
    ReactionAdded {
        thread_id: String,
        message_id: String,
        reaction: Reaction,
    },

    #[serde(rename = "reaction:removed")]
    ReactionRemoved {
        thread_id: String,
        message_id: String,
        reaction: Reaction,
    },

    /// Payload shape varies by cause; the widget reacts with a full reload.
    #[serde(rename = "thread:created")]
    ThreadCreated { thread_id: String },

    #[serde(rename = "thread:updated")]
    ThreadUpdated { thread_id: String },

    #[serde(rename = "error")]
    Error { message: String },
}

/// Room key for a realtime subscription: `repo` or `repo:branch`.
pub fn room_key(repo: &str, branch: Option<&str>) -> String {
    match branch {
        Some(branch) if !branch.is_empty() => format!("{repo}:{branch}"),
        _ => repo.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ts_rs::Config;

    fn message(id: &str, parent: Option<&str>) -> Message {
        Message {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            author_id: "u1".to_string(),
            content: "hello".to_string(),
            parent_message_id: parent.map(str::to_string),
            mentions: vec![],
            reactions: vec![],
            edited: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_anchor_resolvable() {
        assert!(!Anchor::default().is_resolvable());
        assert!(Anchor {
            coordinates: Some(PagePoint { x: 1.0, y: 2.0 }),
            ..Anchor::default()
        }
        .is_resolvable());
    }

    #[test]
    fn test_validate_new_thread_contexts() {
        let anchor = Anchor {
            selector: Some("#app".to_string()),
            ..Anchor::default()
        };

        assert!(validate_new_thread(ContextType::Ui, Some(&anchor), None).is_ok());
        assert!(validate_new_thread(ContextType::Ui, None, None).is_err());
        assert!(validate_new_thread(ContextType::Ui, Some(&anchor), Some("src/a.rs")).is_err());

        assert!(validate_new_thread(ContextType::Code, None, Some("src/a.rs")).is_ok());
        assert!(validate_new_thread(ContextType::Code, None, None).is_err());
        assert!(validate_new_thread(ContextType::Code, Some(&anchor), Some("src/a.rs")).is_err());
    }

    #[test]
    fn test_clamp_reply_parent_depth() {
        let messages = vec![message("top", None), message("reply", Some("top"))];

        // Reply to a top-level message keeps that parent.
        assert_eq!(
            clamp_reply_parent(&messages, Some("top")),
            Some("top".to_string())
        );
        // Reply to a reply re-parents to the top-level ancestor.
        assert_eq!(
            clamp_reply_parent(&messages, Some("reply")),
            Some("top".to_string())
        );
        // Unknown parent falls back to a top-level post.
        assert_eq!(clamp_reply_parent(&messages, Some("gone")), None);
        assert_eq!(clamp_reply_parent(&messages, None), None);
    }

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("ping @ana and @bo-b, also @ana again"),
            vec!["ana".to_string(), "bo-b".to_string()]
        );
        assert_eq!(extract_mentions("mail me at a@example.com"), Vec::<String>::new());
        assert_eq!(extract_mentions("@ lone at sign"), Vec::<String>::new());
    }

    #[test]
    fn test_reaction_membership() {
        let mut msg = message("m1", None);
        msg.reactions.push(Reaction {
            emoji: "👍".to_string(),
            user_id: "u1".to_string(),
        });

        assert!(msg.has_reaction("u1", "👍"));
        assert!(!msg.has_reaction("u2", "👍"));
        assert!(!msg.has_reaction("u1", "🎉"));
    }

    #[test]
    fn test_realtime_msg_tags() {
        let msg = RealtimeMsg::Subscribe {
            repo: "acme/site".to_string(),
            branch: Some("main".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"subscribe\""));

        let added: RealtimeMsg = serde_json::from_str(
            r#"{"type":"reaction:added","thread_id":"t1","message_id":"m1",
                "reaction":{"emoji":"👍","user_id":"u1"}}"#,
        )
        .unwrap();
        assert!(matches!(added, RealtimeMsg::ReactionAdded { .. }));
    }

    #[test]
    fn test_room_key() {
        assert_eq!(room_key("acme/site", None), "acme/site");
        assert_eq!(room_key("acme/site", Some("")), "acme/site");
        assert_eq!(room_key("acme/site", Some("main")), "acme/site:main");
    }

    #[test]
    fn test_thread_serialization() {
        let thread = Thread {
            id: "t1".to_string(),
            repo: "acme/site".to_string(),
            branch: "main".to_string(),
            context_type: ContextType::Ui,
            selector: Some("#hero > button".to_string()),
            xpath: None,
            coordinates: Some(PagePoint { x: 100.0, y: 200.0 }),
            file_path: None,
            line_start: None,
            line_end: None,
            status: ThreadStatus::Open,
            priority: Priority::High,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            message_count: 2,
            first_message_content: Some("hello".to_string()),
            messages: vec![],
        };

        let json = serde_json::to_string(&thread).unwrap();
        assert!(json.contains("\"context_type\":\"ui\""));
        assert!(json.contains("\"priority\":\"high\""));

        let back: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(back, thread);
    }

    #[test]
    fn export_types() {
        // Export all wire types to TypeScript for the embedding page.
        // The export_to attribute in each type's #[ts] macro specifies the
        // output file.
        let config = Config::default();
        PagePoint::export(&config).unwrap();
        Anchor::export(&config).unwrap();
        ContextType::export(&config).unwrap();
        ThreadStatus::export(&config).unwrap();
        Priority::export(&config).unwrap();
        Thread::export(&config).unwrap();
        Reaction::export(&config).unwrap();
        Message::export(&config).unwrap();
        RealtimeMsg::export(&config).unwrap();
    }
}
