//! Overlay components: thread panel, thread detail, message list and
//! composers. Rendering is a function of (threads, selection, mode); the
//! imperative side lives in `position`/`drag`.

use chrono::{DateTime, Utc};
use comment_types::{clamp_reply_parent, Message, Priority, Reaction, Thread, ThreadStatus};
use dioxus::prelude::*;

pub const QUICK_REACTIONS: [&str; 5] = ["👍", "🎉", "❤️", "🚀", "👀"];

// ============================================================================
// Thread panel
// ============================================================================

#[component]
pub fn CommentPanel(
    threads: Vec<Thread>,
    connected: bool,
    loading: bool,
    error: Option<String>,
    adding: bool,
    on_select: Callback<String>,
    on_toggle_add: Callback<()>,
    on_retry: Callback<()>,
) -> Element {
    rsx! {
        div {
            class: "cw-panel",

            div {
                class: "cw-panel-header",
                div {
                    class: "cw-panel-title",
                    span { "Comments" }
                    span { class: "cw-panel-count", "{threads.len()}" }
                }
                div {
                    class: "cw-panel-tools",
                    ConnectionBadge { connected }
                    button {
                        class: if adding { "cw-add-btn cw-add-btn-active" } else { "cw-add-btn" },
                        title: "Comment on an element",
                        onclick: move |_| on_toggle_add.call(()),
                        if adding { "Cancel" } else { "+ Comment" }
                    }
                }
            }

            div {
                class: "cw-panel-body",
                if loading {
                    div { class: "cw-panel-note", "Loading comments..." }
                } else if let Some(error) = error {
                    div {
                        class: "cw-panel-error",
                        p { "Could not load comments" }
                        p { class: "cw-panel-error-detail", "{error}" }
                        button {
                            class: "cw-retry-btn",
                            onclick: move |_| on_retry.call(()),
                            "Retry"
                        }
                    }
                } else if threads.is_empty() {
                    div {
                        class: "cw-panel-note",
                        "No open comments on this branch yet."
                    }
                } else {
                    for (index, thread) in threads.iter().enumerate() {
                        ThreadListItem {
                            thread: thread.clone(),
                            ordinal: index + 1,
                            on_select,
                        }
                    }
                }
            }
        }
    }
}

#[component]
fn ThreadListItem(thread: Thread, ordinal: usize, on_select: Callback<String>) -> Element {
    let thread_id = thread.id.clone();
    let preview = thread
        .first_message_content
        .clone()
        .unwrap_or_else(|| "(no message)".to_string());

    rsx! {
        button {
            class: "cw-thread-item",
            onclick: move |_| on_select.call(thread_id.clone()),

            span { class: "cw-thread-ordinal", "{ordinal}" }
            div {
                class: "cw-thread-summary",
                span { class: "cw-thread-preview", "{preview}" }
                div {
                    class: "cw-thread-meta",
                    span { class: "cw-priority cw-priority-{priority_key(thread.priority)}",
                        "{priority_label(thread.priority)}"
                    }
                    span { "{thread.message_count} messages" }
                }
            }
        }
    }
}

#[component]
fn ConnectionBadge(connected: bool) -> Element {
    rsx! {
        span {
            class: if connected { "cw-conn cw-conn-live" } else { "cw-conn" },
            title: if connected { "Live updates" } else { "Polling for updates" },
            span { if connected { "●" } else { "◐" } }
            span { if connected { "Live" } else { "Polling" } }
        }
    }
}

// ============================================================================
// Thread detail
// ============================================================================

#[component]
pub fn ThreadDetail(
    thread: Thread,
    current_user: Option<String>,
    reply_draft: Signal<String>,
    on_close: Callback<()>,
    on_reply: Callback<Option<String>>,
    on_react: Callback<(String, String)>,
    on_resolve_toggle: Callback<()>,
    on_priority: Callback<Priority>,
    on_edit: Callback<(String, String)>,
    on_delete: Callback<String>,
) -> Element {
    let mut reply_draft = reply_draft;
    let mut reply_target = use_signal(|| None::<String>);
    let on_reply_to = use_callback(move |message_id: String| reply_target.set(Some(message_id)));
    let rows = message_rows(&thread.messages);
    let resolved = thread.status == ThreadStatus::Resolved;
    let reply_target_author = reply_target.read().as_ref().and_then(|id| {
        thread
            .messages
            .iter()
            .find(|m| m.id == *id)
            .map(|m| m.author_id.clone())
    });

    rsx! {
        div {
            class: "cw-detail",

            div {
                class: "cw-detail-header",
                div {
                    class: "cw-detail-title",
                    span {
                        class: if resolved { "cw-status cw-status-resolved" } else { "cw-status" },
                        if resolved { "Resolved" } else { "Open" }
                    }
                    select {
                        class: "cw-priority-select",
                        onchange: move |e| {
                            if let Some(priority) = priority_from_key(&e.value()) {
                                on_priority.call(priority);
                            }
                        },
                        for priority in [Priority::Low, Priority::Normal, Priority::High, Priority::Critical] {
                            option {
                                value: priority_key(priority),
                                selected: thread.priority == priority,
                                "{priority_label(priority)}"
                            }
                        }
                    }
                }
                div {
                    class: "cw-detail-tools",
                    button {
                        class: "cw-resolve-btn",
                        onclick: move |_| on_resolve_toggle.call(()),
                        if resolved { "Reopen" } else { "Resolve" }
                    }
                    button {
                        class: "cw-close-btn",
                        onclick: move |_| on_close.call(()),
                        "×"
                    }
                }
            }

            div {
                class: "cw-messages",
                for row in rows {
                    MessageBlock {
                        message: row.message.clone(),
                        is_reply: row.is_reply,
                        compact: row.compact,
                        current_user: current_user.clone(),
                        on_react,
                        on_reply_to,
                        on_edit,
                        on_delete,
                    }
                }
            }

            div {
                class: "cw-reply-area",
                if let Some(author) = reply_target_author {
                    div {
                        class: "cw-reply-context",
                        span { "Replying to {author}" }
                        button {
                            class: "cw-reply-context-clear",
                            onclick: move |_| reply_target.set(None),
                            "×"
                        }
                    }
                }
                div {
                    class: "cw-reply-input",
                    textarea {
                        class: "cw-textarea",
                        placeholder: "Reply... use @name to mention",
                        value: "{reply_draft}",
                        rows: "2",
                        oninput: move |e| reply_draft.set(e.value()),
                        onkeydown: move |e| {
                            if e.key() == Key::Enter && !e.modifiers().shift() {
                                e.prevent_default();
                                on_reply.call(reply_target.read().clone());
                            }
                        },
                    }
                    button {
                        class: "cw-send-btn",
                        disabled: reply_draft.read().trim().is_empty(),
                        onclick: move |_| on_reply.call(reply_target.read().clone()),
                        "➤"
                    }
                }
            }
        }
    }
}

#[component]
fn MessageBlock(
    message: Message,
    is_reply: bool,
    compact: bool,
    current_user: Option<String>,
    on_react: Callback<(String, String)>,
    on_reply_to: Callback<String>,
    on_edit: Callback<(String, String)>,
    on_delete: Callback<String>,
) -> Element {
    let mut editing = use_signal(|| false);
    let mut edit_draft = use_signal(String::new);

    let is_mine = current_user.as_deref() == Some(message.author_id.as_str());
    let initial = message.author_id.chars().next().unwrap_or('?');
    let message_id = message.id.clone();
    let message_id_for_edit = message.id.clone();
    let message_id_for_delete = message.id.clone();
    let message_id_for_reply = message.id.clone();
    let content_for_edit = message.content.clone();

    let mut class = String::from("cw-message");
    if is_reply {
        class.push_str(" cw-message-reply");
    }
    if compact {
        class.push_str(" cw-message-compact");
    }

    rsx! {
        div {
            class: "{class}",

            if !compact {
                div {
                    class: "cw-message-header",
                    span { class: "cw-avatar", "{initial}" }
                    span { class: "cw-author", "{message.author_id}" }
                    span { class: "cw-time", "{format_timestamp(message.created_at)}" }
                    if message.edited {
                        span { class: "cw-edited", "(edited)" }
                    }
                }
            }

            if editing() {
                div {
                    class: "cw-edit-area",
                    textarea {
                        class: "cw-textarea",
                        value: "{edit_draft}",
                        rows: "2",
                        oninput: move |e| edit_draft.set(e.value()),
                    }
                    button {
                        class: "cw-small-btn",
                        onclick: move |_| {
                            on_edit.call((message_id_for_edit.clone(), edit_draft.to_string()));
                            editing.set(false);
                        },
                        "Save"
                    }
                    button {
                        class: "cw-small-btn",
                        onclick: move |_| editing.set(false),
                        "Cancel"
                    }
                }
            } else {
                div { class: "cw-message-body", "{message.content}" }
            }

            div {
                class: "cw-message-footer",
                ReactionPills {
                    message_id: message.id.clone(),
                    reactions: message.reactions.clone(),
                    current_user: current_user.clone(),
                    on_react,
                }
                div {
                    class: "cw-message-actions",
                    if !is_reply {
                        button {
                            class: "cw-small-btn",
                            onclick: move |_| on_reply_to.call(message_id_for_reply.clone()),
                            "Reply"
                        }
                    }
                    if is_mine {
                        button {
                            class: "cw-small-btn",
                            onclick: move |_| {
                                edit_draft.set(content_for_edit.clone());
                                editing.set(true);
                            },
                            "Edit"
                        }
                        button {
                            class: "cw-small-btn cw-danger",
                            onclick: move |_| on_delete.call(message_id_for_delete.clone()),
                            "Delete"
                        }
                    }
                }
            }
        }
    }
}

#[component]
fn ReactionPills(
    message_id: String,
    reactions: Vec<Reaction>,
    current_user: Option<String>,
    on_react: Callback<(String, String)>,
) -> Element {
    let groups = grouped_reactions(&reactions, current_user.as_deref());

    rsx! {
        div {
            class: "cw-reactions",
            for group in groups {
                ReactionPill {
                    message_id: message_id.clone(),
                    emoji: group.emoji.clone(),
                    label: format!("{} {}", group.emoji, group.count),
                    mine: group.mine,
                    on_react,
                }
            }
            for emoji in QUICK_REACTIONS {
                ReactionPill {
                    message_id: message_id.clone(),
                    emoji: emoji.to_string(),
                    label: emoji.to_string(),
                    mine: false,
                    extra_class: "cw-reaction-add".to_string(),
                    on_react,
                }
            }
        }
    }
}

#[component]
fn ReactionPill(
    message_id: String,
    emoji: String,
    label: String,
    mine: bool,
    #[props(default)] extra_class: String,
    on_react: Callback<(String, String)>,
) -> Element {
    let mut class = String::from("cw-reaction");
    if mine {
        class.push_str(" cw-reaction-mine");
    }
    if !extra_class.is_empty() {
        class.push(' ');
        class.push_str(&extra_class);
    }

    rsx! {
        button {
            class: "{class}",
            onclick: move |_| on_react.call((message_id.clone(), emoji.clone())),
            "{label}"
        }
    }
}

// ============================================================================
// New-comment composer
// ============================================================================

#[component]
pub fn NewCommentComposer(
    left: f64,
    top: f64,
    draft: Signal<String>,
    on_submit: Callback<()>,
    on_cancel: Callback<()>,
) -> Element {
    let mut draft = draft;

    rsx! {
        div {
            class: "cw-composer",
            style: "left: {left}px; top: {top}px;",

            textarea {
                class: "cw-textarea",
                placeholder: "Leave a comment... use @name to mention",
                value: "{draft}",
                rows: "3",
                autofocus: true,
                oninput: move |e| draft.set(e.value()),
                onkeydown: move |e| {
                    if e.key() == Key::Enter && !e.modifiers().shift() {
                        e.prevent_default();
                        on_submit.call(());
                    }
                },
            }
            div {
                class: "cw-composer-actions",
                button {
                    class: "cw-small-btn",
                    onclick: move |_| on_cancel.call(()),
                    "Cancel"
                }
                button {
                    class: "cw-send-btn",
                    disabled: draft.read().trim().is_empty(),
                    onclick: move |_| on_submit.call(()),
                    "Comment"
                }
            }
        }
    }
}

// ============================================================================
// View helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub message: Message,
    pub is_reply: bool,
    pub compact: bool,
}

/// Display order for a thread: top-level messages with their replies nested
/// exactly one level deep, plus the compact-grouping flag per row.
pub fn message_rows(messages: &[Message]) -> Vec<MessageRow> {
    let mut ordered: Vec<(Message, bool)> = Vec::new();
    for (top_level, replies) in threaded_view(messages) {
        ordered.push((top_level, false));
        for reply in replies {
            ordered.push((reply, true));
        }
    }

    let flat: Vec<Message> = ordered.iter().map(|(m, _)| m.clone()).collect();
    let flags = compact_flags(&flat);

    ordered
        .into_iter()
        .zip(flags)
        .map(|((message, is_reply), compact)| MessageRow {
            message,
            is_reply,
            compact,
        })
        .collect()
}

/// Group messages one level deep. A reply whose stored parent is itself a
/// reply hangs off the top-level ancestor; an orphan reply (parent not
/// loaded) renders as top-level rather than disappearing.
pub fn threaded_view(messages: &[Message]) -> Vec<(Message, Vec<Message>)> {
    let mut view: Vec<(Message, Vec<Message>)> = messages
        .iter()
        .filter(|m| !m.is_reply())
        .map(|m| (m.clone(), Vec::new()))
        .collect();

    for message in messages.iter().filter(|m| m.is_reply()) {
        let parent = clamp_reply_parent(messages, message.parent_message_id.as_deref());
        let slot = parent.and_then(|pid| view.iter_mut().find(|(top, _)| top.id == pid));
        match slot {
            Some((_, replies)) => replies.push(message.clone()),
            None => view.push((message.clone(), Vec::new())),
        }
    }

    view
}

/// Consecutive messages from the same author collapse into a compact form
/// when the gap is under five minutes and neither is a reply. Purely
/// time+author based.
pub fn compact_flags(messages: &[Message]) -> Vec<bool> {
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            if i == 0 || message.is_reply() {
                return false;
            }
            let prev = &messages[i - 1];
            if prev.is_reply() || prev.author_id != message.author_id {
                return false;
            }
            let gap = message.created_at - prev.created_at;
            gap >= chrono::Duration::zero() && gap < chrono::Duration::minutes(5)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub mine: bool,
}

/// Group reactions by emoji in first-seen order; `mine` marks groups the
/// current session's user is part of, which drives the toggle.
pub fn grouped_reactions(reactions: &[Reaction], current_user: Option<&str>) -> Vec<ReactionGroup> {
    let mut groups: Vec<ReactionGroup> = Vec::new();
    for reaction in reactions {
        let mine = current_user == Some(reaction.user_id.as_str());
        match groups.iter_mut().find(|g| g.emoji == reaction.emoji) {
            Some(group) => {
                group.count += 1;
                group.mine |= mine;
            }
            None => groups.push(ReactionGroup {
                emoji: reaction.emoji.clone(),
                count: 1,
                mine,
            }),
        }
    }
    groups
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%H:%M").to_string()
}

pub fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "Low",
        Priority::Normal => "Normal",
        Priority::High => "High",
        Priority::Critical => "Critical",
    }
}

pub fn priority_key(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Normal => "normal",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

pub fn priority_from_key(key: &str) -> Option<Priority> {
    match key {
        "low" => Some(Priority::Low),
        "normal" => Some(Priority::Normal),
        "high" => Some(Priority::High),
        "critical" => Some(Priority::Critical),
        _ => None,
    }
}

// ============================================================================
// Widget CSS tokens (the embedder can override the variables)
// ============================================================================

pub const WIDGET_STYLES: &str = r#"
:root {
    --cw-bg: #0f172a;
    --cw-bg-raised: #1e293b;
    --cw-text: #f8fafc;
    --cw-text-dim: #94a3b8;
    --cw-text-muted: #64748b;
    --cw-accent: #3b82f6;
    --cw-accent-hover: #2563eb;
    --cw-border: #334155;
    --cw-danger: #ef4444;
    --cw-success: #10b981;
    --cw-warning: #f59e0b;
    --cw-radius-sm: 4px;
    --cw-radius-md: 8px;
    --cw-radius-lg: 12px;
    --cw-shadow: 0 10px 40px rgba(0, 0, 0, 0.5);
    --cw-z: 2147483000;
}

.cw-root {
    position: absolute;
    top: 0;
    left: 0;
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    font-size: 14px;
    color: var(--cw-text);
}

/* Marker layer covers the page but never intercepts; only markers do. */
.cw-marker-layer {
    position: absolute;
    top: 0;
    left: 0;
    pointer-events: none;
    z-index: var(--cw-z);
}

.cw-marker {
    position: absolute;
    display: flex;
    align-items: center;
    justify-content: center;
    background: var(--cw-accent);
    color: white;
    border: 2px solid white;
    border-radius: 50% 50% 50% 4px;
    font-weight: 600;
    font-size: 13px;
    cursor: grab;
    box-shadow: 0 2px 8px rgba(0, 0, 0, 0.35);
    user-select: none;
}

.cw-marker:active {
    cursor: grabbing;
}

.cw-marker-resolved {
    background: var(--cw-success);
    opacity: 0.6;
}

.cw-marker-selected {
    outline: 2px solid var(--cw-warning);
}

.cw-click-catcher {
    position: fixed;
    inset: 0;
    cursor: crosshair;
    z-index: calc(var(--cw-z) + 1);
}

.cw-pending-dot {
    position: absolute;
    width: 12px;
    height: 12px;
    margin: -6px 0 0 -6px;
    background: var(--cw-warning);
    border: 2px solid white;
    border-radius: 50%;
    z-index: calc(var(--cw-z) + 2);
    pointer-events: none;
}

.cw-panel {
    position: fixed;
    right: 16px;
    bottom: 16px;
    width: 320px;
    max-height: 50vh;
    display: flex;
    flex-direction: column;
    background: var(--cw-bg);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-lg);
    box-shadow: var(--cw-shadow);
    overflow: hidden;
    z-index: calc(var(--cw-z) + 3);
}

.cw-panel-header {
    display: flex;
    align-items: center;
    justify-content: space-between;
    padding: 10px 12px;
    background: var(--cw-bg-raised);
    border-bottom: 1px solid var(--cw-border);
}

.cw-panel-title {
    display: flex;
    align-items: center;
    gap: 6px;
    font-weight: 600;
}

.cw-panel-count {
    padding: 1px 7px;
    background: var(--cw-accent);
    border-radius: 9px;
    font-size: 11px;
}

.cw-panel-tools {
    display: flex;
    align-items: center;
    gap: 8px;
}

.cw-conn {
    display: flex;
    align-items: center;
    gap: 4px;
    font-size: 11px;
    color: var(--cw-warning);
}

.cw-conn-live {
    color: var(--cw-success);
}

.cw-add-btn {
    padding: 4px 10px;
    background: var(--cw-accent);
    color: white;
    border: none;
    border-radius: var(--cw-radius-md);
    font-size: 12px;
    cursor: pointer;
}

.cw-add-btn:hover {
    background: var(--cw-accent-hover);
}

.cw-add-btn-active {
    background: var(--cw-danger);
}

.cw-panel-body {
    overflow-y: auto;
    padding: 6px;
}

.cw-panel-note {
    padding: 18px 10px;
    text-align: center;
    color: var(--cw-text-muted);
    font-size: 13px;
}

.cw-panel-error {
    padding: 14px 10px;
    text-align: center;
    color: var(--cw-danger);
}

.cw-panel-error-detail {
    font-size: 12px;
    color: var(--cw-text-dim);
}

.cw-retry-btn {
    margin-top: 6px;
    padding: 4px 14px;
    background: var(--cw-bg-raised);
    color: var(--cw-text);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-md);
    cursor: pointer;
}

.cw-thread-item {
    display: flex;
    gap: 10px;
    width: 100%;
    padding: 8px;
    background: transparent;
    color: var(--cw-text);
    border: none;
    border-radius: var(--cw-radius-md);
    text-align: left;
    cursor: pointer;
}

.cw-thread-item:hover {
    background: var(--cw-bg-raised);
}

.cw-thread-ordinal {
    flex-shrink: 0;
    width: 22px;
    height: 22px;
    display: flex;
    align-items: center;
    justify-content: center;
    background: var(--cw-accent);
    border-radius: 50%;
    font-size: 12px;
    font-weight: 600;
}

.cw-thread-summary {
    min-width: 0;
    display: flex;
    flex-direction: column;
    gap: 2px;
}

.cw-thread-preview {
    overflow: hidden;
    text-overflow: ellipsis;
    white-space: nowrap;
    font-size: 13px;
}

.cw-thread-meta {
    display: flex;
    gap: 8px;
    font-size: 11px;
    color: var(--cw-text-muted);
}

.cw-priority-high {
    color: var(--cw-warning);
}

.cw-priority-critical {
    color: var(--cw-danger);
}

.cw-detail {
    position: fixed;
    right: 16px;
    bottom: 16px;
    width: 360px;
    max-height: 70vh;
    display: flex;
    flex-direction: column;
    background: var(--cw-bg);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-lg);
    box-shadow: var(--cw-shadow);
    overflow: hidden;
    z-index: calc(var(--cw-z) + 4);
}

.cw-detail-header {
    display: flex;
    align-items: center;
    justify-content: space-between;
    padding: 10px 12px;
    background: var(--cw-bg-raised);
    border-bottom: 1px solid var(--cw-border);
}

.cw-detail-title {
    display: flex;
    align-items: center;
    gap: 8px;
}

.cw-status {
    padding: 2px 8px;
    background: var(--cw-accent);
    border-radius: var(--cw-radius-sm);
    font-size: 11px;
}

.cw-status-resolved {
    background: var(--cw-success);
}

.cw-priority-select {
    background: var(--cw-bg);
    color: var(--cw-text);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-sm);
    font-size: 12px;
    padding: 2px 4px;
}

.cw-detail-tools {
    display: flex;
    align-items: center;
    gap: 6px;
}

.cw-resolve-btn {
    padding: 4px 10px;
    background: var(--cw-success);
    color: white;
    border: none;
    border-radius: var(--cw-radius-md);
    font-size: 12px;
    cursor: pointer;
}

.cw-close-btn {
    width: 24px;
    height: 24px;
    background: transparent;
    color: var(--cw-text-dim);
    border: none;
    font-size: 18px;
    cursor: pointer;
}

.cw-messages {
    flex: 1;
    overflow-y: auto;
    padding: 10px 12px;
    display: flex;
    flex-direction: column;
    gap: 10px;
}

.cw-message-reply {
    margin-left: 26px;
}

.cw-message-compact {
    margin-top: -6px;
}

.cw-message-header {
    display: flex;
    align-items: center;
    gap: 6px;
    margin-bottom: 3px;
    font-size: 12px;
}

.cw-avatar {
    width: 20px;
    height: 20px;
    display: flex;
    align-items: center;
    justify-content: center;
    background: var(--cw-bg-raised);
    border: 1px solid var(--cw-border);
    border-radius: 50%;
    font-size: 10px;
    font-weight: 600;
    text-transform: uppercase;
}

.cw-author {
    font-weight: 500;
    color: var(--cw-text-dim);
}

.cw-time, .cw-edited {
    color: var(--cw-text-muted);
    font-size: 11px;
}

.cw-message-body {
    line-height: 1.45;
    word-wrap: break-word;
    white-space: pre-wrap;
}

.cw-message-footer {
    display: flex;
    align-items: center;
    justify-content: space-between;
    margin-top: 4px;
}

.cw-reactions {
    display: flex;
    flex-wrap: wrap;
    gap: 4px;
}

.cw-reaction {
    padding: 1px 6px;
    background: var(--cw-bg-raised);
    color: var(--cw-text);
    border: 1px solid var(--cw-border);
    border-radius: 10px;
    font-size: 11px;
    cursor: pointer;
}

.cw-reaction-mine {
    border-color: var(--cw-accent);
    background: rgba(59, 130, 246, 0.2);
}

.cw-reaction-add {
    opacity: 0;
    transition: opacity 0.15s;
}

.cw-message:hover .cw-reaction-add {
    opacity: 0.7;
}

.cw-message-actions {
    display: flex;
    gap: 4px;
    opacity: 0;
    transition: opacity 0.15s;
}

.cw-message:hover .cw-message-actions {
    opacity: 1;
}

.cw-small-btn {
    padding: 2px 8px;
    background: transparent;
    color: var(--cw-text-dim);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-sm);
    font-size: 11px;
    cursor: pointer;
}

.cw-small-btn:hover {
    background: var(--cw-bg-raised);
}

.cw-danger {
    color: var(--cw-danger);
}

.cw-reply-area {
    padding: 8px 12px;
    background: var(--cw-bg-raised);
    border-top: 1px solid var(--cw-border);
}

.cw-reply-context {
    display: flex;
    align-items: center;
    justify-content: space-between;
    margin-bottom: 6px;
    font-size: 11px;
    color: var(--cw-text-dim);
}

.cw-reply-context-clear {
    background: transparent;
    color: var(--cw-text-muted);
    border: none;
    cursor: pointer;
}

.cw-reply-input {
    display: flex;
    gap: 6px;
    align-items: flex-end;
}

.cw-textarea {
    flex: 1;
    padding: 7px 10px;
    background: var(--cw-bg);
    color: var(--cw-text);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-md);
    font-family: inherit;
    font-size: 13px;
    resize: none;
    outline: none;
}

.cw-textarea:focus {
    border-color: var(--cw-accent);
}

.cw-send-btn {
    padding: 6px 12px;
    background: var(--cw-accent);
    color: white;
    border: none;
    border-radius: var(--cw-radius-md);
    cursor: pointer;
}

.cw-send-btn:disabled {
    background: var(--cw-border);
    color: var(--cw-text-muted);
    cursor: not-allowed;
}

.cw-composer {
    position: absolute;
    width: 280px;
    padding: 10px;
    display: flex;
    flex-direction: column;
    gap: 8px;
    background: var(--cw-bg);
    border: 1px solid var(--cw-border);
    border-radius: var(--cw-radius-lg);
    box-shadow: var(--cw-shadow);
    z-index: calc(var(--cw-z) + 4);
}

.cw-composer-actions {
    display: flex;
    justify-content: flex-end;
    gap: 6px;
}

.cw-notice {
    position: fixed;
    left: 50%;
    bottom: 24px;
    transform: translateX(-50%);
    display: flex;
    align-items: center;
    gap: 10px;
    padding: 10px 14px;
    background: var(--cw-danger);
    color: white;
    border-radius: var(--cw-radius-md);
    box-shadow: var(--cw-shadow);
    font-size: 13px;
    z-index: calc(var(--cw-z) + 5);
}

.cw-notice button {
    background: transparent;
    color: white;
    border: none;
    font-size: 15px;
    cursor: pointer;
}
"#;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message_at(id: &str, author: &str, offset_secs: i64, parent: Option<&str>) -> Message {
        Message {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            author_id: author.to_string(),
            content: format!("message {id}"),
            parent_message_id: parent.map(str::to_string),
            mentions: vec![],
            reactions: vec![],
            edited: false,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_compact_flags_time_and_author_grouping() {
        let messages = vec![
            message_at("a", "x", 0, None),
            message_at("b", "x", 100, None),
            message_at("c", "y", 110, None),
        ];
        assert_eq!(compact_flags(&messages), vec![false, true, false]);
    }

    #[test]
    fn test_compact_flags_breaks_on_gap_and_replies() {
        let messages = vec![
            message_at("a", "x", 0, None),
            message_at("b", "x", 400, None), // > 5 min
        ];
        assert_eq!(compact_flags(&messages), vec![false, false]);

        let with_reply = vec![
            message_at("a", "x", 0, None),
            message_at("b", "x", 10, Some("a")),
            message_at("c", "x", 20, None),
        ];
        // Replies never group, and a message after a reply starts fresh.
        assert_eq!(compact_flags(&with_reply), vec![false, false, false]);
    }

    #[test]
    fn test_message_rows_clamp_reply_depth() {
        let messages = vec![
            message_at("top", "x", 0, None),
            message_at("reply", "y", 10, Some("top")),
            message_at("deep", "z", 20, Some("reply")),
        ];

        let rows = message_rows(&messages);
        let ids: Vec<&str> = rows.iter().map(|r| r.message.id.as_str()).collect();
        let reply_flags: Vec<bool> = rows.iter().map(|r| r.is_reply).collect();

        // The reply-to-a-reply nests directly under the top-level ancestor.
        assert_eq!(ids, vec!["top", "reply", "deep"]);
        assert_eq!(reply_flags, vec![false, true, true]);
    }

    #[test]
    fn test_orphan_reply_renders_top_level() {
        let messages = vec![message_at("r", "x", 0, Some("missing"))];
        let rows = message_rows(&messages);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_reply);
    }

    #[test]
    fn test_grouped_reactions() {
        let reactions = vec![
            Reaction {
                emoji: "👍".to_string(),
                user_id: "u1".to_string(),
            },
            Reaction {
                emoji: "👍".to_string(),
                user_id: "u2".to_string(),
            },
            Reaction {
                emoji: "🎉".to_string(),
                user_id: "u2".to_string(),
            },
        ];

        let groups = grouped_reactions(&reactions, Some("u1"));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].emoji, "👍");
        assert_eq!(groups[0].count, 2);
        assert!(groups[0].mine);
        assert!(!groups[1].mine);
    }

    #[test]
    fn test_priority_keys_round_trip() {
        for priority in [
            Priority::Low,
            Priority::Normal,
            Priority::High,
            Priority::Critical,
        ] {
            assert_eq!(priority_from_key(priority_key(priority)), Some(priority));
        }
        assert_eq!(priority_from_key("bogus"), None);
    }
}
