//! The anchored marker: a numbered pin for open threads, a check for
//! resolved ones.

use dioxus::prelude::*;

pub const MARKER_SIZE_PX: f64 = 28.0;

/// Glyph shown inside a marker. Ordinals are 1-based positions in the
/// currently loaded open list — transient labels, not identifiers; the
/// anchor is the marker's identity.
pub fn marker_glyph(resolved: bool, ordinal: usize) -> String {
    if resolved {
        "✓".to_string()
    } else {
        ordinal.to_string()
    }
}

#[component]
pub fn CommentMarker(
    thread_id: String,
    ordinal: usize,
    resolved: bool,
    left: f64,
    top: f64,
    selected: bool,
    dragging: bool,
    on_press: Callback<(String, Event<MouseData>)>,
) -> Element {
    let glyph = marker_glyph(resolved, ordinal);
    let thread_id_for_press = thread_id.clone();

    let mut class = String::from("cw-marker");
    if resolved {
        class.push_str(" cw-marker-resolved");
    }
    if selected {
        class.push_str(" cw-marker-selected");
    }

    // Dragged markers let pointer events through so the drop hit test can
    // see the element underneath.
    let pointer_events = if dragging { "none" } else { "auto" };

    rsx! {
        button {
            class: "{class}",
            style: "left: {left}px; top: {top}px; width: {MARKER_SIZE_PX}px; height: {MARKER_SIZE_PX}px; pointer-events: {pointer_events};",
            onmousedown: move |e| {
                e.stop_propagation();
                on_press.call((thread_id_for_press.clone(), e));
            },
            "{glyph}"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_glyph() {
        assert_eq!(marker_glyph(false, 3), "3");
        assert_eq!(marker_glyph(true, 3), "✓");
    }
}
