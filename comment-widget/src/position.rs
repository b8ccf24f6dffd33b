//! Live screen-space tracking of anchored markers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use comment_types::Thread;
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Event, MutationObserver, MutationObserverInit};

use crate::anchor;

/// Mutation bursts (animations, framework re-renders) are coalesced into
/// one recompute per window.
pub const MUTATION_DEBOUNCE_MS: u32 = 100;

/// Ephemeral per-render position of a thread's marker. Recomputed on every
/// scroll/mutation/resize tick; never a source of truth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerState {
    pub x: f64,
    pub y: f64,
    pub visible: bool,
}

/// Recompute marker positions for every UI-context thread. A thread whose
/// anchor no longer resolves is marked invisible — it is dropped from the
/// render entirely, not hidden via CSS, so it cannot take stale hits.
pub fn compute_markers<'a>(
    threads: impl IntoIterator<Item = &'a Thread>,
) -> HashMap<String, MarkerState> {
    let mut markers = HashMap::new();

    for thread in threads {
        let Some(anchor) = thread.ui_anchor() else {
            continue;
        };
        let state = match anchor::resolve(&anchor) {
            Some(resolved) => {
                let (x, y) = resolved.position();
                MarkerState {
                    x,
                    y,
                    visible: true,
                }
            }
            None => MarkerState {
                x: 0.0,
                y: 0.0,
                visible: false,
            },
        };
        markers.insert(thread.id.clone(), state);
    }

    markers
}

/// Watches everything that can move an anchor: window scroll, window
/// resize, and DOM mutations anywhere in the document (tab/accordion
/// toggling changes anchor visibility without navigation, so the observer
/// is document-wide). Dropping the tracker detaches all of it.
pub struct PositionTracker {
    observer: MutationObserver,
    on_scroll: Closure<dyn FnMut(Event)>,
    on_resize: Closure<dyn FnMut(Event)>,
    _on_mutations: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

impl PositionTracker {
    pub fn start(notify: impl FnMut() + 'static) -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        let root = document.document_element()?;

        let notify = Rc::new(RefCell::new(notify));

        let scroll_notify = notify.clone();
        let on_scroll = Closure::wrap(Box::new(move |_e: Event| {
            scroll_notify.borrow_mut()();
        }) as Box<dyn FnMut(Event)>);
        window
            .add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())
            .ok()?;

        let resize_notify = notify.clone();
        let on_resize = Closure::wrap(Box::new(move |_e: Event| {
            resize_notify.borrow_mut()();
        }) as Box<dyn FnMut(Event)>);
        window
            .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
            .ok()?;

        // Debounce: every burst bumps the generation; only the task that
        // still matches it after the window fires the notify.
        let generation = Rc::new(Cell::new(0u64));
        let mutation_notify = notify.clone();
        let on_mutations = Closure::wrap(Box::new(
            move |_records: js_sys::Array, _observer: MutationObserver| {
                generation.set(generation.get() + 1);
                let scheduled = generation.get();
                let generation = generation.clone();
                let notify = mutation_notify.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    TimeoutFuture::new(MUTATION_DEBOUNCE_MS).await;
                    if generation.get() == scheduled {
                        notify.borrow_mut()();
                    }
                });
            },
        )
            as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(on_mutations.as_ref().unchecked_ref()).ok()?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_attributes(true);
        let attribute_filter = js_sys::Array::new();
        attribute_filter.push(&"class".into());
        attribute_filter.push(&"style".into());
        init.set_attribute_filter(&attribute_filter);
        observer.observe_with_options(&root, &init).ok()?;

        Some(Self {
            observer,
            on_scroll,
            on_resize,
            _on_mutations: on_mutations,
        })
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        self.observer.disconnect();
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback(
                "scroll",
                self.on_scroll.as_ref().unchecked_ref(),
            );
            let _ = window.remove_event_listener_with_callback(
                "resize",
                self.on_resize.as_ref().unchecked_ref(),
            );
        }
    }
}
