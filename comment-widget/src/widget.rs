//! The comment overlay: one explicit instance per page, owned by whatever
//! embeds it. Construction wires the API client, position tracking and the
//! realtime channel; unmounting tears all of it down.

pub mod effects;
pub mod state;
pub mod ws;

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use comment_types::{PagePoint, Priority, Thread, ThreadStatus};
use dioxus::prelude::*;

use crate::anchor;
use crate::api::{default_api_base, ApiClient};
use crate::auth;
use crate::components::{CommentPanel, NewCommentComposer, ThreadDetail, WIDGET_STYLES};
use crate::drag::{start_marker_drag, DragGesture, DragOutcome, DragRuntime};
use crate::interop;
use crate::marker::{CommentMarker, MARKER_SIZE_PX};
use crate::position::{MarkerState, PositionTracker};
use crate::widget::effects::{DragPreview, WidgetSignals};
use crate::widget::state::SyncDirective;
use crate::widget::ws::{RealtimeRuntime, WsEvent};

/// Everything the embedder decides. No module-global singleton: construct
/// one `CommentOverlay` with one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    pub repo: String,
    pub branch: String,
    /// Override the API origin; by default it is sniffed from the hostname.
    pub api_base: Option<String>,
    /// Local-storage key holding the bearer token.
    pub token_storage_key: String,
}

impl WidgetConfig {
    pub fn new(repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            branch: branch.into(),
            api_base: None,
            token_storage_key: auth::DEFAULT_TOKEN_KEY.to_string(),
        }
    }
}

/// The not-yet-submitted location picked in "add comment" mode, before the
/// thread exists server-side. View-only.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPosition {
    pub point: PagePoint,
    pub selector: Option<String>,
}

#[component]
pub fn CommentOverlay(config: WidgetConfig) -> Element {
    let threads = use_signal(Vec::<Thread>::new);
    let selected = use_signal(|| None::<Thread>);
    let markers = use_signal(HashMap::<String, MarkerState>::new);
    let loading = use_signal(|| true);
    let error = use_signal(|| None::<String>);
    let notice = use_signal(|| None::<String>);
    let ws_connected = use_signal(|| false);
    let adding = use_signal(|| false);
    let pending = use_signal(|| None::<PendingPosition>);
    let reply_draft = use_signal(String::new);
    let composer_draft = use_signal(String::new);
    let drag_preview = use_signal(|| None::<DragPreview>);

    let mut realtime = use_signal(|| None::<RealtimeRuntime>);
    let mut tracker = use_signal(|| None::<PositionTracker>);
    let mut drag_runtime = use_signal(|| None::<DragRuntime>);
    let mut sync_started = use_signal(|| false);
    let mut tracker_started = use_signal(|| false);

    let alive = use_hook(|| Rc::new(Cell::new(true)));
    let instance_id = use_hook(|| format!("cw-{}", uuid::Uuid::new_v4()));
    let api = use_hook({
        let api_base = config.api_base.clone();
        let token_key = config.token_storage_key.clone();
        move || {
            let base = api_base.unwrap_or_else(default_api_base);
            let token = auth::load_token(&token_key);
            Rc::new(ApiClient::new(base, token))
        }
    });
    let current_user: Option<String> =
        use_hook(|| api.token().and_then(auth::display_user_id));
    let repo = config.repo.clone();
    let branch = config.branch.clone();

    let ui = WidgetSignals {
        threads,
        selected,
        markers,
        loading,
        error,
        notice,
        ws_connected,
        adding,
        pending,
        reply_draft,
        composer_draft,
        drag_preview,
    };

    // Inbound realtime events: apply the idempotent merge, then act on the
    // directive. Runs from socket callbacks, so spawning goes through
    // wasm_bindgen_futures rather than the component scope.
    let ws_handler = {
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |event: WsEvent| {
            let directive = {
                let mut threads_sig = ui.threads;
                let mut selected_sig = ui.selected;
                let mut connected_sig = ui.ws_connected;
                let mut threads = threads_sig.write();
                let mut selected = selected_sig.write();
                let mut connected = connected_sig.write();
                state::apply_ws_event(event, &mut threads, &mut selected, &mut connected)
            };

            if directive == SyncDirective::ReloadThreads {
                let api = api.clone();
                let repo = repo.clone();
                let branch = branch.clone();
                let alive = alive.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    effects::refresh_thread_list(api.clone(), &repo, &branch, &alive, ui).await;
                    let selected_id = ui.selected.peek().as_ref().map(|t| t.id.clone());
                    if let Some(thread_id) = selected_id {
                        effects::refresh_selected_if(api, &thread_id, &alive, ui).await;
                    }
                });
            }

            effects::refresh_markers(ui);
        }
    };

    // Initial load
    {
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        use_effect(move || {
            spawn(effects::load_threads(
                api.clone(),
                repo.clone(),
                branch.clone(),
                alive.clone(),
                ui,
            ));
        });
    }

    // Realtime channel + degraded polling
    {
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        let ws_handler = ws_handler.clone();
        use_effect(move || {
            if sync_started() {
                return;
            }
            sync_started.set(true);
            spawn(effects::maintain_realtime(
                api.clone(),
                repo.clone(),
                branch.clone(),
                alive.clone(),
                realtime,
                ws_handler.clone(),
            ));
            spawn(effects::poll_while_disconnected(
                api.clone(),
                repo.clone(),
                branch.clone(),
                alive.clone(),
                ui,
            ));
        });
    }

    // Scroll/resize/mutation all funnel into one marker recompute.
    use_effect(move || {
        if tracker_started() {
            return;
        }
        tracker_started.set(true);
        let started = PositionTracker::start(move || effects::refresh_markers(ui));
        if started.is_none() {
            log::warn!("mutation observer unavailable; markers will not track layout changes");
        }
        tracker.set(started);
    });

    // Explicit invalidation: markers follow every thread cache change.
    use_effect(move || {
        let _ = ui.threads.read().len();
        let _ = ui.selected.read().is_some();
        effects::refresh_markers(ui);
    });

    // Dispose: close the channel, disconnect the observer, and flag any
    // in-flight responses as stale.
    {
        let alive = alive.clone();
        use_drop(move || {
            alive.set(false);
            realtime.set(None);
            tracker.set(None);
            drag_runtime.set(None);
        });
    }

    // Operations
    let on_select_thread = use_callback({
        let api = api.clone();
        let alive = alive.clone();
        move |thread_id: String| {
            spawn(effects::open_thread(api.clone(), thread_id, alive.clone(), ui));
        }
    });

    let on_retry = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |_: ()| {
            spawn(effects::load_threads(
                api.clone(),
                repo.clone(),
                branch.clone(),
                alive.clone(),
                ui,
            ));
        }
    });

    let on_toggle_add = use_callback(move |_: ()| {
        let mut adding = ui.adding;
        let mut pending = ui.pending;
        let next = !*adding.peek();
        adding.set(next);
        if !next {
            pending.set(None);
        }
    });

    let on_close_detail = use_callback(move |_: ()| {
        let mut selected = ui.selected;
        selected.set(None);
        effects::refresh_markers(ui);
    });

    let on_reply = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |parent_message_id: Option<String>| {
            let thread_id = ui.selected.peek().as_ref().map(|t| t.id.clone());
            if let Some(thread_id) = thread_id {
                spawn(effects::submit_reply(
                    api.clone(),
                    repo.clone(),
                    branch.clone(),
                    thread_id,
                    parent_message_id,
                    alive.clone(),
                    ui,
                ));
            }
        }
    });

    let on_react = use_callback({
        let api = api.clone();
        let alive = alive.clone();
        let current_user = current_user.clone();
        move |(message_id, emoji): (String, String)| {
            let thread_id = ui.selected.peek().as_ref().map(|t| t.id.clone());
            if let Some(thread_id) = thread_id {
                spawn(effects::toggle_reaction(
                    api.clone(),
                    thread_id,
                    message_id,
                    emoji,
                    current_user.clone(),
                    alive.clone(),
                    ui,
                ));
            }
        }
    });

    let on_resolve_toggle = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |_: ()| {
            let target = ui
                .selected
                .peek()
                .as_ref()
                .map(|t| (t.id.clone(), t.status));
            if let Some((thread_id, status)) = target {
                spawn(effects::toggle_resolve(
                    api.clone(),
                    repo.clone(),
                    branch.clone(),
                    thread_id,
                    status,
                    alive.clone(),
                    ui,
                ));
            }
        }
    });

    let on_priority = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |priority: Priority| {
            let thread_id = ui.selected.peek().as_ref().map(|t| t.id.clone());
            if let Some(thread_id) = thread_id {
                spawn(effects::set_priority(
                    api.clone(),
                    repo.clone(),
                    branch.clone(),
                    thread_id,
                    priority,
                    alive.clone(),
                    ui,
                ));
            }
        }
    });

    let on_edit = use_callback({
        let api = api.clone();
        let alive = alive.clone();
        move |(message_id, content): (String, String)| {
            let thread_id = ui.selected.peek().as_ref().map(|t| t.id.clone());
            if let Some(thread_id) = thread_id {
                spawn(effects::edit_message(
                    api.clone(),
                    thread_id,
                    message_id,
                    content,
                    alive.clone(),
                    ui,
                ));
            }
        }
    });

    let on_delete = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |message_id: String| {
            let thread_id = ui.selected.peek().as_ref().map(|t| t.id.clone());
            if let Some(thread_id) = thread_id {
                spawn(effects::delete_message(
                    api.clone(),
                    repo.clone(),
                    branch.clone(),
                    thread_id,
                    message_id,
                    alive.clone(),
                    ui,
                ));
            }
        }
    });

    let on_submit_new = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |_: ()| {
            spawn(effects::submit_thread(
                api.clone(),
                repo.clone(),
                branch.clone(),
                alive.clone(),
                ui,
            ));
        }
    });

    let on_cancel_new = use_callback(move |_: ()| {
        let mut pending = ui.pending;
        let mut adding = ui.adding;
        let mut composer_draft = ui.composer_draft;
        pending.set(None);
        adding.set(false);
        composer_draft.set(String::new());
    });

    let catcher_id = format!("{instance_id}-catcher");
    let on_page_pick = use_callback({
        let catcher_id = catcher_id.clone();
        move |e: Event<MouseData>| {
            let client = e.client_coordinates();
            let point = interop::page_point_from_client(client.x, client.y);
            let selector = interop::element_under_overlay(&catcher_id, client.x, client.y)
                .filter(|el| el.closest(".cw-root").ok().flatten().is_none())
                .and_then(|el| anchor::build_selector(&el));
            let mut pending = ui.pending;
            pending.set(Some(PendingPosition { point, selector }));
        }
    });

    let on_marker_press = use_callback({
        let api = api.clone();
        let repo = repo.clone();
        let branch = branch.clone();
        let alive = alive.clone();
        move |(thread_id, e): (String, Event<MouseData>)| {
            let client = e.client_coordinates();
            let grab = e.element_coordinates();
            let gesture =
                DragGesture::new(thread_id.clone(), (client.x, client.y), (grab.x, grab.y));

            let preview_thread = thread_id.clone();
            let on_preview = move |x: f64, y: f64| {
                let mut drag_preview = ui.drag_preview;
                drag_preview.set(Some(DragPreview {
                    thread_id: preview_thread.clone(),
                    x,
                    y,
                }));
            };

            let api = api.clone();
            let repo = repo.clone();
            let branch = branch.clone();
            let alive = alive.clone();
            let on_outcome = move |outcome: DragOutcome| {
                let api = api.clone();
                let repo = repo.clone();
                let branch = branch.clone();
                let alive = alive.clone();
                let mut drag_slot = drag_runtime;
                // Deferred a tick so the document listeners are never
                // dropped mid-dispatch.
                wasm_bindgen_futures::spawn_local(async move {
                    drag_slot.set(None);
                    match outcome {
                        DragOutcome::Click { thread_id } => {
                            effects::open_thread(api, thread_id, alive, ui).await;
                        }
                        DragOutcome::Drop { thread_id, x, y } => {
                            effects::submit_reposition(
                                api,
                                repo,
                                branch,
                                thread_id,
                                (x, y),
                                alive,
                                ui,
                            )
                            .await;
                        }
                    }
                });
            };

            drag_runtime.set(start_marker_drag(gesture, on_preview, on_outcome));
        }
    });

    // Render inputs
    let threads_now = ui.threads.read().clone();
    let selected_now = ui.selected.read().clone();
    let markers_now = ui.markers.read().clone();
    let preview_now = ui.drag_preview.read().clone();
    let adding_now = *ui.adding.read();
    let loading_now = *ui.loading.read();
    let connected_now = *ui.ws_connected.read();
    let error_now = ui.error.read().clone();
    let notice_now = ui.notice.read().clone();
    let pending_now = ui.pending.read().clone();
    let mut notice_sig = ui.notice;

    let views = marker_views(
        &threads_now,
        selected_now.as_ref(),
        &markers_now,
        preview_now.as_ref(),
    );

    rsx! {
        style { {WIDGET_STYLES} }

        div {
            class: "cw-root",

            div {
                class: "cw-marker-layer",
                for view in views {
                    CommentMarker {
                        thread_id: view.thread_id.clone(),
                        ordinal: view.ordinal,
                        resolved: view.resolved,
                        left: view.left,
                        top: view.top,
                        selected: view.selected,
                        dragging: view.dragging,
                        on_press: on_marker_press,
                    }
                }
            }

            if adding_now {
                div {
                    id: "{catcher_id}",
                    class: "cw-click-catcher",
                    onclick: move |e| on_page_pick.call(e),
                }
            }

            if let Some(position) = pending_now {
                div {
                    class: "cw-pending-dot",
                    style: "left: {position.point.x}px; top: {position.point.y}px;",
                }
                NewCommentComposer {
                    left: position.point.x + 12.0,
                    top: position.point.y + 12.0,
                    draft: ui.composer_draft,
                    on_submit: on_submit_new,
                    on_cancel: on_cancel_new,
                }
            }

            if let Some(thread) = selected_now {
                ThreadDetail {
                    thread,
                    current_user: current_user.clone(),
                    reply_draft: ui.reply_draft,
                    on_close: on_close_detail,
                    on_reply,
                    on_react,
                    on_resolve_toggle,
                    on_priority,
                    on_edit,
                    on_delete,
                }
            } else {
                CommentPanel {
                    threads: threads_now,
                    connected: connected_now,
                    loading: loading_now,
                    error: error_now,
                    adding: adding_now,
                    on_select: on_select_thread,
                    on_toggle_add,
                    on_retry,
                }
            }

            if let Some(message) = notice_now {
                div {
                    class: "cw-notice",
                    span { "{message}" }
                    button {
                        onclick: move |_| notice_sig.set(None),
                        "×"
                    }
                }
            }
        }
    }
}

// ============================================================================
// Marker view assembly
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkerView {
    pub thread_id: String,
    pub ordinal: usize,
    pub resolved: bool,
    pub left: f64,
    pub top: f64,
    pub selected: bool,
    pub dragging: bool,
}

/// Assemble the markers to paint this cycle. Open threads carry their
/// 1-based position in the loaded list; a marker without a resolvable
/// position is skipped entirely unless a drag preview overrides it. The
/// selected thread keeps its marker (check glyph) even after resolving
/// dropped it from the open list.
pub(crate) fn marker_views(
    threads: &[Thread],
    selected: Option<&Thread>,
    markers: &HashMap<String, MarkerState>,
    preview: Option<&DragPreview>,
) -> Vec<MarkerView> {
    fn view_for(
        thread: &Thread,
        ordinal: usize,
        selected_id: Option<&str>,
        markers: &HashMap<String, MarkerState>,
        preview: Option<&DragPreview>,
    ) -> Option<MarkerView> {
        let dragging = preview.filter(|p| p.thread_id == thread.id);
        let (left, top) = match (dragging, markers.get(&thread.id)) {
            (Some(p), _) => (p.x, p.y),
            (None, Some(m)) if m.visible => {
                (m.x - MARKER_SIZE_PX / 2.0, m.y - MARKER_SIZE_PX / 2.0)
            }
            _ => return None,
        };
        Some(MarkerView {
            thread_id: thread.id.clone(),
            ordinal,
            resolved: thread.status == ThreadStatus::Resolved,
            left,
            top,
            selected: selected_id == Some(thread.id.as_str()),
            dragging: dragging.is_some(),
        })
    }

    let selected_id = selected.map(|t| t.id.as_str());
    let mut views: Vec<MarkerView> = threads
        .iter()
        .enumerate()
        .filter_map(|(i, thread)| view_for(thread, i + 1, selected_id, markers, preview))
        .collect();

    if let Some(thread) = selected {
        let off_list = !threads.iter().any(|t| t.id == thread.id);
        if off_list && thread.status == ThreadStatus::Resolved {
            if let Some(view) = view_for(thread, 0, selected_id, markers, preview) {
                views.push(view);
            }
        }
    }

    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use comment_types::{ContextType, Priority};

    fn thread(id: &str, status: ThreadStatus) -> Thread {
        Thread {
            id: id.to_string(),
            repo: "acme/site".to_string(),
            branch: "main".to_string(),
            context_type: ContextType::Ui,
            selector: None,
            xpath: None,
            coordinates: Some(PagePoint { x: 50.0, y: 60.0 }),
            file_path: None,
            line_start: None,
            line_end: None,
            status,
            priority: Priority::Normal,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            message_count: 1,
            first_message_content: Some("hi".to_string()),
            messages: vec![],
        }
    }

    fn visible_marker(x: f64, y: f64) -> MarkerState {
        MarkerState { x, y, visible: true }
    }

    #[test]
    fn test_ordinals_follow_list_position() {
        let threads = vec![
            thread("a", ThreadStatus::Open),
            thread("b", ThreadStatus::Open),
        ];
        let mut markers = HashMap::new();
        markers.insert("a".to_string(), visible_marker(100.0, 100.0));
        markers.insert("b".to_string(), visible_marker(200.0, 200.0));

        let views = marker_views(&threads, None, &markers, None);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].ordinal, 1);
        assert_eq!(views[1].ordinal, 2);
        // Markers center on the anchor point.
        assert_eq!(views[0].left, 100.0 - MARKER_SIZE_PX / 2.0);
    }

    #[test]
    fn test_unresolvable_markers_are_suppressed() {
        let threads = vec![thread("a", ThreadStatus::Open)];
        let mut markers = HashMap::new();
        markers.insert(
            "a".to_string(),
            MarkerState {
                x: 0.0,
                y: 0.0,
                visible: false,
            },
        );

        // Not rendered at (0,0) or anywhere else.
        assert!(marker_views(&threads, None, &markers, None).is_empty());
    }

    #[test]
    fn test_drag_preview_overrides_position() {
        let threads = vec![thread("a", ThreadStatus::Open)];
        let mut markers = HashMap::new();
        markers.insert("a".to_string(), visible_marker(100.0, 100.0));
        let preview = DragPreview {
            thread_id: "a".to_string(),
            x: 300.0,
            y: 400.0,
        };

        let views = marker_views(&threads, None, &markers, Some(&preview));
        assert_eq!(views[0].left, 300.0);
        assert_eq!(views[0].top, 400.0);
        assert!(views[0].dragging);
    }

    #[test]
    fn test_resolved_selected_thread_keeps_check_marker() {
        let open = vec![thread("a", ThreadStatus::Open)];
        let resolved = thread("b", ThreadStatus::Resolved);
        let mut markers = HashMap::new();
        markers.insert("a".to_string(), visible_marker(100.0, 100.0));
        markers.insert("b".to_string(), visible_marker(200.0, 200.0));

        let views = marker_views(&open, Some(&resolved), &markers, None);
        assert_eq!(views.len(), 2);
        let check = views.iter().find(|v| v.thread_id == "b").unwrap();
        assert!(check.resolved);
        assert!(check.selected);
    }
}
