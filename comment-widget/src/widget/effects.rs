//! Async wiring between the API client, the realtime channel and the
//! widget's signals.
//!
//! None of these mutate local state before the server answers: every write
//! round-trips, then reloads what it touched. Each function re-checks the
//! liveness flag after awaiting so a late response never touches a disposed
//! widget.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use comment_types::{
    clamp_reply_parent, extract_mentions, validate_new_thread, Anchor, ContextType, Priority,
    Thread, ThreadStatus,
};
use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;

use crate::anchor;
use crate::api::{ApiClient, NewMessage, NewThread, RepositionBody, ThreadPatch};
use crate::interop;
use crate::position::{compute_markers, MarkerState};
use crate::widget::ws::{connect_realtime, RealtimeRuntime, WsEvent};
use crate::widget::PendingPosition;

/// Degraded-mode refresh cadence while the realtime channel is down.
pub const POLL_INTERVAL_MS: u32 = 5_000;
pub const RECONNECT_DELAY_MS: u32 = 3_000;

/// Marker preview while its thread is being dragged.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    pub thread_id: String,
    pub x: f64,
    pub y: f64,
}

/// Every signal the widget owns, bundled so effects and callbacks can take
/// one handle. Signals are Copy; so is the bundle.
#[derive(Clone, Copy)]
pub struct WidgetSignals {
    pub threads: Signal<Vec<Thread>>,
    pub selected: Signal<Option<Thread>>,
    pub markers: Signal<HashMap<String, MarkerState>>,
    pub loading: Signal<bool>,
    pub error: Signal<Option<String>>,
    pub notice: Signal<Option<String>>,
    pub ws_connected: Signal<bool>,
    pub adding: Signal<bool>,
    pub pending: Signal<Option<PendingPosition>>,
    pub reply_draft: Signal<String>,
    pub composer_draft: Signal<String>,
    pub drag_preview: Signal<Option<DragPreview>>,
}

/// Recompute every marker from the cached threads. The selected thread is
/// included even when it has dropped out of the open list (a just-resolved
/// thread keeps its check-mark marker while its detail stays open).
pub fn refresh_markers(mut ui: WidgetSignals) {
    let threads = ui.threads.peek();
    let selected = ui.selected.peek();

    let mut all: Vec<&Thread> = threads.iter().collect();
    if let Some(thread) = selected.as_ref() {
        if !threads.iter().any(|t| t.id == thread.id) {
            all.push(thread);
        }
    }

    let markers = compute_markers(all);
    drop(threads);
    drop(selected);
    ui.markers.set(markers);
}

/// Initial load and explicit retry. Wholesale replace: only realtime events
/// patch the cache incrementally.
pub async fn load_threads(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    ui.loading.set(true);

    match api.fetch_open_threads(&repo, &branch).await {
        Ok(threads) => {
            if !alive.get() {
                return;
            }
            ui.error.set(None);
            ui.threads.set(threads);
            refresh_markers(ui);
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            // Threads already in memory keep rendering; the list shows a
            // retry action.
            ui.error.set(Some(e.to_string()));
        }
    }

    ui.loading.set(false);
}

/// Background refresh after a mutation or realtime hint; no loading state.
pub async fn refresh_thread_list(
    api: Rc<ApiClient>,
    repo: &str,
    branch: &str,
    alive: &Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    match api.fetch_open_threads(repo, branch).await {
        Ok(threads) => {
            if !alive.get() {
                return;
            }
            ui.error.set(None);
            ui.threads.set(threads);
            refresh_markers(ui);
        }
        Err(e) => {
            dioxus_logger::tracing::warn!("Background thread refresh failed: {}", e);
        }
    }
}

/// Re-fetch the selected thread's detail, unless the user has moved on.
pub async fn refresh_selected_if(
    api: Rc<ApiClient>,
    thread_id: &str,
    alive: &Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    if ui.selected.peek().as_ref().map(|t| t.id.as_str()) != Some(thread_id) {
        return;
    }
    match api.fetch_thread(thread_id).await {
        Ok(thread) => {
            if !alive.get() {
                return;
            }
            if ui.selected.peek().as_ref().map(|t| t.id.as_str()) == Some(thread_id) {
                ui.selected.set(Some(thread));
                refresh_markers(ui);
            }
        }
        Err(e) => {
            dioxus_logger::tracing::warn!("Failed to refresh thread {}: {}", thread_id, e);
        }
    }
}

pub async fn open_thread(
    api: Rc<ApiClient>,
    thread_id: String,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    match api.fetch_thread(&thread_id).await {
        Ok(thread) => {
            if !alive.get() {
                return;
            }
            ui.selected.set(Some(thread));
            refresh_markers(ui);
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not open thread: {e}")));
        }
    }
}

/// Create a UI-context thread at the picked position. The composer draft is
/// only cleared once the server accepts.
pub async fn submit_thread(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    let Some(position) = ui.pending.peek().as_ref().cloned() else {
        return;
    };
    let content = ui.composer_draft.peek().trim().to_string();
    if content.is_empty() {
        return;
    }

    let anchor = Anchor::from_drop(position.point, position.selector.clone());
    if let Err(reason) = validate_new_thread(ContextType::Ui, Some(&anchor), None) {
        ui.notice.set(Some(reason));
        return;
    }

    let body = NewThread {
        repo: repo.clone(),
        branch: branch.clone(),
        context_type: ContextType::Ui,
        selector: anchor.selector,
        xpath: anchor.xpath,
        coordinates: anchor.coordinates,
        file_path: None,
        line_start: None,
        line_end: None,
        mentions: extract_mentions(&content),
        message: content,
    };

    match api.create_thread(&body).await {
        Ok(_) => {
            if !alive.get() {
                return;
            }
            ui.composer_draft.set(String::new());
            ui.pending.set(None);
            ui.adding.set(false);
            refresh_thread_list(api, &repo, &branch, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not create comment: {e}")));
        }
    }
}

/// Post a reply. A reply targeted at another reply is re-parented to the
/// top-level ancestor before it is sent.
pub async fn submit_reply(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    thread_id: String,
    parent_message_id: Option<String>,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    let content = ui.reply_draft.peek().trim().to_string();
    if content.is_empty() {
        return;
    }

    let parent_message_id = {
        let selected = ui.selected.peek();
        let messages = selected
            .as_ref()
            .filter(|t| t.id == thread_id)
            .map(|t| t.messages.as_slice())
            .unwrap_or(&[]);
        clamp_reply_parent(messages, parent_message_id.as_deref())
    };

    let body = NewMessage {
        mentions: extract_mentions(&content),
        content,
        parent_message_id,
    };

    match api.post_message(&thread_id, &body).await {
        Ok(_) => {
            if !alive.get() {
                return;
            }
            ui.reply_draft.set(String::new());
            refresh_selected_if(api.clone(), &thread_id, &alive, ui).await;
            refresh_thread_list(api, &repo, &branch, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            // The draft stays as typed; nothing was mutated locally.
            ui.notice.set(Some(format!("Could not post reply: {e}")));
        }
    }
}

pub async fn toggle_resolve(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    thread_id: String,
    current: ThreadStatus,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    let next = match current {
        ThreadStatus::Open => ThreadStatus::Resolved,
        ThreadStatus::Resolved => ThreadStatus::Open,
    };
    let patch = ThreadPatch {
        status: Some(next),
        ..ThreadPatch::default()
    };

    match api.update_thread(&thread_id, &patch).await {
        Ok(()) => {
            if !alive.get() {
                return;
            }
            refresh_selected_if(api.clone(), &thread_id, &alive, ui).await;
            refresh_thread_list(api, &repo, &branch, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not update thread: {e}")));
        }
    }
}

pub async fn set_priority(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    thread_id: String,
    priority: Priority,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    let patch = ThreadPatch {
        priority: Some(priority),
        ..ThreadPatch::default()
    };

    match api.update_thread(&thread_id, &patch).await {
        Ok(()) => {
            if !alive.get() {
                return;
            }
            refresh_selected_if(api.clone(), &thread_id, &alive, ui).await;
            refresh_thread_list(api, &repo, &branch, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not update priority: {e}")));
        }
    }
}

/// Toggle semantics: membership of (user, emoji) in the message's reactions
/// decides between add and remove.
pub async fn toggle_reaction(
    api: Rc<ApiClient>,
    thread_id: String,
    message_id: String,
    emoji: String,
    user_id: Option<String>,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    let already_mine = {
        let selected = ui.selected.peek();
        match (selected.as_ref(), user_id.as_deref()) {
            (Some(thread), Some(user_id)) if thread.id == thread_id => thread
                .messages
                .iter()
                .find(|m| m.id == message_id)
                .is_some_and(|m| m.has_reaction(user_id, &emoji)),
            _ => false,
        }
    };

    let result = if already_mine {
        api.remove_reaction(&thread_id, &message_id, &emoji).await
    } else {
        api.add_reaction(&thread_id, &message_id, &emoji).await
    };

    match result {
        Ok(()) => {
            if !alive.get() {
                return;
            }
            refresh_selected_if(api, &thread_id, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not update reaction: {e}")));
        }
    }
}

pub async fn edit_message(
    api: Rc<ApiClient>,
    thread_id: String,
    message_id: String,
    content: String,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    match api.edit_message(&thread_id, &message_id, &content).await {
        Ok(()) => {
            if !alive.get() {
                return;
            }
            refresh_selected_if(api, &thread_id, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not edit message: {e}")));
        }
    }
}

pub async fn delete_message(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    thread_id: String,
    message_id: String,
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    match api.delete_message(&thread_id, &message_id).await {
        Ok(()) => {
            if !alive.get() {
                return;
            }
            refresh_selected_if(api.clone(), &thread_id, &alive, ui).await;
            refresh_thread_list(api, &repo, &branch, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            ui.notice.set(Some(format!("Could not delete message: {e}")));
        }
    }
}

/// Finish a marker drag: derive the new anchor pair at the drop point and
/// submit both fields together, so a later resolve prefers the fresh
/// selector and still holds the fresh coordinates as fallback.
pub async fn submit_reposition(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    thread_id: String,
    drop_client: (f64, f64),
    alive: Rc<Cell<bool>>,
    mut ui: WidgetSignals,
) {
    let coordinates = interop::page_point_from_client(drop_client.0, drop_client.1);
    // The dragged marker is still pointer-events:none at this point, so the
    // hit test sees the page element underneath it. Elements of the widget
    // itself never become anchors.
    let selector = interop::element_at_client_point(drop_client.0, drop_client.1)
        .filter(|el| el.closest(".cw-root").ok().flatten().is_none())
        .and_then(|el| anchor::build_selector(&el));
    let body = RepositionBody {
        coordinates,
        selector,
    };

    match api.reposition_thread(&thread_id, &body).await {
        Ok(()) => {
            if !alive.get() {
                return;
            }
            refresh_thread_list(api.clone(), &repo, &branch, &alive, ui).await;
            refresh_selected_if(api, &thread_id, &alive, ui).await;
        }
        Err(e) => {
            if !alive.get() {
                return;
            }
            // The server never accepted the new position; recomputing from
            // the cache snaps the marker back to the confirmed anchor.
            ui.notice.set(Some(format!("Could not move comment: {e}")));
        }
    }

    if !alive.get() {
        return;
    }
    ui.drag_preview.set(None);
    refresh_markers(ui);
}

/// Degraded mode: realtime is an enhancement, not a dependency. While the
/// socket is down the open-thread list refreshes on a timer.
pub async fn poll_while_disconnected(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    alive: Rc<Cell<bool>>,
    ui: WidgetSignals,
) {
    loop {
        TimeoutFuture::new(POLL_INTERVAL_MS).await;
        if !alive.get() {
            return;
        }
        if *ui.ws_connected.peek() {
            continue;
        }
        refresh_thread_list(api.clone(), &repo, &branch, &alive, ui).await;
    }
}

/// Keep one live socket. Reconnects ride this loop: whenever the current
/// socket is gone or closed, a fresh connect (and with it a fresh
/// subscribe) is issued.
pub async fn maintain_realtime<F>(
    api: Rc<ApiClient>,
    repo: String,
    branch: String,
    alive: Rc<Cell<bool>>,
    mut runtime_slot: Signal<Option<RealtimeRuntime>>,
    on_event: F,
) where
    F: FnMut(WsEvent) + Clone + 'static,
{
    loop {
        if !alive.get() {
            return;
        }
        let needs_connect = runtime_slot.peek().as_ref().map_or(true, |r| !r.is_alive());
        if needs_connect {
            let runtime =
                connect_realtime(api.base(), api.token(), &repo, &branch, on_event.clone());
            runtime_slot.set(runtime);
        }
        TimeoutFuture::new(RECONNECT_DELAY_MS).await;
    }
}
