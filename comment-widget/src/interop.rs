//! Small DOM helpers shared across the widget.

use comment_types::PagePoint;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Element, HtmlElement};

pub fn document() -> Option<Document> {
    window().and_then(|w| w.document())
}

/// Get the browser viewport dimensions.
pub fn viewport_size() -> (u32, u32) {
    let Some(window) = window() else {
        return (0, 0);
    };
    let width = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0) as u32;
    let height = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0) as u32;
    (width, height)
}

/// Current window scroll offsets.
pub fn scroll_offsets() -> (f64, f64) {
    window()
        .map(|w| (w.scroll_x().unwrap_or(0.0), w.scroll_y().unwrap_or(0.0)))
        .unwrap_or((0.0, 0.0))
}

/// Translate client (viewport) coordinates into absolute page coordinates.
pub fn page_point_from_client(client_x: f64, client_y: f64) -> PagePoint {
    let (sx, sy) = scroll_offsets();
    PagePoint {
        x: client_x + sx,
        y: client_y + sy,
    }
}

pub fn element_at_client_point(client_x: f64, client_y: f64) -> Option<Element> {
    document()?.element_from_point(client_x as f32, client_y as f32)
}

/// Hit-test through one of the widget's own overlay elements: pointer
/// events on the overlay are disabled for the duration of the query so the
/// page element underneath is returned instead of the overlay itself.
pub fn element_under_overlay(overlay_id: &str, client_x: f64, client_y: f64) -> Option<Element> {
    let document = document()?;
    let overlay = document
        .get_element_by_id(overlay_id)
        .and_then(|e| e.dyn_into::<HtmlElement>().ok());

    if let Some(overlay) = overlay.as_ref() {
        let _ = overlay.style().set_property("pointer-events", "none");
    }
    let hit = document.element_from_point(client_x as f32, client_y as f32);
    if let Some(overlay) = overlay.as_ref() {
        let _ = overlay.style().set_property("pointer-events", "auto");
    }
    hit
}

pub fn local_storage_get(key: &str) -> Option<String> {
    window()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|storage| storage.get_item(key).ok().flatten())
}
