//! Pure reducers over the widget's client-side cache.
//!
//! Every inbound realtime event is an idempotent merge, not a replacement:
//! the local session may itself have caused the event, and its own POST
//! already put the result in the cache before the echo arrives.

use comment_types::{Message, Reaction, Thread};

use crate::widget::ws::WsEvent;

/// What the caller must do after an event has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirective {
    None,
    /// Lower-frequency events whose payload shape varies by cause; the
    /// cache converges through a full reload instead of a patch.
    ReloadThreads,
}

pub fn apply_ws_event(
    event: WsEvent,
    threads: &mut Vec<Thread>,
    selected: &mut Option<Thread>,
    connected: &mut bool,
) -> SyncDirective {
    match event {
        WsEvent::Connected => {
            *connected = true;
            SyncDirective::None
        }
        WsEvent::Disconnected => {
            *connected = false;
            SyncDirective::None
        }
        WsEvent::Subscribed { .. } => SyncDirective::None,
        WsEvent::MessageAdded { thread_id, message } => {
            let mut merged = false;
            if let Some(thread) = selected_thread(selected, &thread_id) {
                merged = merge_message(&mut thread.messages, message);
                if merged {
                    thread.message_count = thread.messages.len() as u32;
                }
            }
            // The list summary count only moves when the detail actually
            // changed; a stale count self-corrects on the next reload.
            if merged {
                if let Some(entry) = threads.iter_mut().find(|t| t.id == thread_id) {
                    entry.message_count += 1;
                }
            }
            SyncDirective::None
        }
        WsEvent::MessageEdited {
            thread_id,
            message_id,
            content,
        } => {
            if let Some(thread) = selected_thread(selected, &thread_id) {
                apply_edit(&mut thread.messages, &message_id, content);
            }
            SyncDirective::None
        }
        WsEvent::MessageDeleted {
            thread_id,
            message_id,
        } => {
            let mut removed = false;
            if let Some(thread) = selected_thread(selected, &thread_id) {
                removed = remove_message(&mut thread.messages, &message_id);
                if removed {
                    thread.message_count = thread.messages.len() as u32;
                }
            }
            if removed {
                if let Some(entry) = threads.iter_mut().find(|t| t.id == thread_id) {
                    entry.message_count = entry.message_count.saturating_sub(1);
                }
            }
            SyncDirective::None
        }
        WsEvent::ReactionAdded {
            thread_id,
            message_id,
            reaction,
        } => {
            if let Some(message) = selected_message(selected, &thread_id, &message_id) {
                add_reaction(&mut message.reactions, reaction);
            }
            SyncDirective::None
        }
        WsEvent::ReactionRemoved {
            thread_id,
            message_id,
            reaction,
        } => {
            if let Some(message) = selected_message(selected, &thread_id, &message_id) {
                remove_reaction(&mut message.reactions, &reaction.user_id, &reaction.emoji);
            }
            SyncDirective::None
        }
        WsEvent::ThreadCreated { .. } | WsEvent::ThreadUpdated { .. } => {
            SyncDirective::ReloadThreads
        }
        WsEvent::Error(_) => SyncDirective::None,
    }
}

/// Append only if no message with this id exists yet.
pub fn merge_message(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    messages.push(message);
    true
}

/// Overwrite content and flag the message as edited. An edit that outraces
/// its add finds no target and is dropped; the next full reload converges
/// the cache.
pub fn apply_edit(messages: &mut [Message], message_id: &str, content: String) -> bool {
    match messages.iter_mut().find(|m| m.id == message_id) {
        Some(message) => {
            message.content = content;
            message.edited = true;
            true
        }
        None => false,
    }
}

pub fn remove_message(messages: &mut Vec<Message>, message_id: &str) -> bool {
    let before = messages.len();
    messages.retain(|m| m.id != message_id);
    messages.len() != before
}

/// Reactions are unique per (user, emoji); a duplicate add is a no-op.
pub fn add_reaction(reactions: &mut Vec<Reaction>, reaction: Reaction) -> bool {
    if reactions
        .iter()
        .any(|r| r.user_id == reaction.user_id && r.emoji == reaction.emoji)
    {
        return false;
    }
    reactions.push(reaction);
    true
}

/// Removing an absent reaction is a no-op, not an error.
pub fn remove_reaction(reactions: &mut Vec<Reaction>, user_id: &str, emoji: &str) -> bool {
    let before = reactions.len();
    reactions.retain(|r| !(r.user_id == user_id && r.emoji == emoji));
    reactions.len() != before
}

fn selected_thread<'a>(selected: &'a mut Option<Thread>, thread_id: &str) -> Option<&'a mut Thread> {
    selected.as_mut().filter(|t| t.id == thread_id)
}

fn selected_message<'a>(
    selected: &'a mut Option<Thread>,
    thread_id: &str,
    message_id: &str,
) -> Option<&'a mut Message> {
    selected_thread(selected, thread_id)?
        .messages
        .iter_mut()
        .find(|m| m.id == message_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use comment_types::{ContextType, PagePoint, Priority, ThreadStatus};

    fn thread(id: &str) -> Thread {
        Thread {
            id: id.to_string(),
            repo: "acme/site".to_string(),
            branch: "main".to_string(),
            context_type: ContextType::Ui,
            selector: None,
            xpath: None,
            coordinates: Some(PagePoint { x: 10.0, y: 20.0 }),
            file_path: None,
            line_start: None,
            line_end: None,
            status: ThreadStatus::Open,
            priority: Priority::Normal,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            message_count: 0,
            first_message_content: None,
            messages: vec![],
        }
    }

    fn message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            author_id: "u1".to_string(),
            content: "hello".to_string(),
            parent_message_id: None,
            mentions: vec![],
            reactions: vec![],
            edited: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_duplicate_message_added_applies_once() {
        let mut threads = vec![thread("t1")];
        let mut selected = Some(thread("t1"));
        let mut connected = true;

        for _ in 0..2 {
            apply_ws_event(
                WsEvent::MessageAdded {
                    thread_id: "t1".to_string(),
                    message: message("m1"),
                },
                &mut threads,
                &mut selected,
                &mut connected,
            );
        }

        let selected = selected.unwrap();
        assert_eq!(selected.messages.len(), 1);
        assert_eq!(selected.message_count, 1);
        assert_eq!(threads[0].message_count, 1);
    }

    #[test]
    fn test_reaction_merge_is_idempotent() {
        let mut reactions = vec![];
        let reaction = Reaction {
            emoji: "👍".to_string(),
            user_id: "u1".to_string(),
        };

        assert!(add_reaction(&mut reactions, reaction.clone()));
        assert!(!add_reaction(&mut reactions, reaction));
        assert_eq!(reactions.len(), 1);

        assert!(remove_reaction(&mut reactions, "u1", "👍"));
        assert!(!remove_reaction(&mut reactions, "u1", "👍"));
        assert!(reactions.is_empty());
    }

    #[test]
    fn test_edit_before_add_is_dropped() {
        let mut messages = vec![];
        assert!(!apply_edit(&mut messages, "m1", "late".to_string()));

        merge_message(&mut messages, message("m1"));
        assert!(apply_edit(&mut messages, "m1", "fixed".to_string()));
        assert_eq!(messages[0].content, "fixed");
        assert!(messages[0].edited);
    }

    #[test]
    fn test_delete_updates_counts() {
        let mut threads = vec![thread("t1")];
        threads[0].message_count = 2;
        let mut selected = Some(thread("t1"));
        if let Some(t) = selected.as_mut() {
            t.messages = vec![message("m1"), message("m2")];
            t.message_count = 2;
        }
        let mut connected = true;

        apply_ws_event(
            WsEvent::MessageDeleted {
                thread_id: "t1".to_string(),
                message_id: "m1".to_string(),
            },
            &mut threads,
            &mut selected,
            &mut connected,
        );

        assert_eq!(selected.as_ref().unwrap().messages.len(), 1);
        assert_eq!(threads[0].message_count, 1);
    }

    #[test]
    fn test_thread_events_request_reload() {
        let mut threads = vec![];
        let mut selected = None;
        let mut connected = true;

        let directive = apply_ws_event(
            WsEvent::ThreadUpdated {
                thread_id: "t1".to_string(),
            },
            &mut threads,
            &mut selected,
            &mut connected,
        );
        assert_eq!(directive, SyncDirective::ReloadThreads);
    }

    #[test]
    fn test_events_for_unselected_threads_leave_cache_alone() {
        let mut threads = vec![thread("t1")];
        let mut selected = Some(thread("other"));
        let mut connected = true;

        apply_ws_event(
            WsEvent::MessageAdded {
                thread_id: "t1".to_string(),
                message: message("m1"),
            },
            &mut threads,
            &mut selected,
            &mut connected,
        );

        assert!(selected.as_ref().unwrap().messages.is_empty());
        assert_eq!(threads[0].message_count, 0);
    }
}
