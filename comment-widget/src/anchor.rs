//! Anchor resolution: map a persisted anchor back to a position on the
//! live page, and the inverse — derive a structural selector for a clicked
//! element.
//!
//! Selectors are a best-effort cache key over a page that keeps evolving;
//! the coordinate fallback is what makes an anchor durable.

use comment_types::{Anchor, PagePoint};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement};

use crate::interop::{document, scroll_offsets};

/// Class prefix used by the widget's own overlay DOM; never allowed into a
/// derived selector.
pub const INTERNAL_CLASS_PREFIX: &str = "cw-";

#[derive(Debug, Clone)]
pub enum ResolvedAnchor {
    /// The selector found a visible element; position is its live center.
    Element { element: Element, x: f64, y: f64 },
    /// Literal stored coordinates, no element reference.
    Point { x: f64, y: f64 },
}

impl ResolvedAnchor {
    pub fn position(&self) -> (f64, f64) {
        match self {
            ResolvedAnchor::Element { x, y, .. } => (*x, *y),
            ResolvedAnchor::Point { x, y } => (*x, *y),
        }
    }
}

/// Locate the current target of an anchor, or fall back gracefully.
///
/// Returns `None` when neither the selector nor the coordinates can place
/// the marker — the caller must suppress it entirely rather than render at
/// some default point.
pub fn resolve(anchor: &Anchor) -> Option<ResolvedAnchor> {
    let hit = anchor.selector.as_deref().and_then(query_visible);
    let center = hit.as_ref().map(element_center);

    match (hit, pick_position(center, anchor.coordinates)?) {
        (Some(element), (x, y, true)) => Some(ResolvedAnchor::Element { element, x, y }),
        (_, (x, y, _)) => Some(ResolvedAnchor::Point { x, y }),
    }
}

/// Fallback policy, separated from the DOM: a resolving selector wins, the
/// stored coordinates are next, otherwise nothing. The flag reports whether
/// the position came from a live element.
fn pick_position(
    selector_center: Option<(f64, f64)>,
    coordinates: Option<PagePoint>,
) -> Option<(f64, f64, bool)> {
    if let Some((x, y)) = selector_center {
        return Some((x, y, true));
    }
    coordinates.map(|p| (p.x, p.y, false))
}

/// Query the selector and gate on visibility. A malformed selector throws
/// in the browser; that is treated the same as "not found". An invisible
/// match (tab-hidden panel, collapsed accordion) is also "not found".
fn query_visible(selector: &str) -> Option<Element> {
    let element = document()?.query_selector(selector).ok().flatten()?;
    is_visible(&element).then_some(element)
}

fn is_visible(element: &Element) -> bool {
    let Some(html) = element.dyn_ref::<HtmlElement>() else {
        return false;
    };
    if html.offset_parent().is_none() {
        return false;
    }

    let Some(style) = web_sys::window().and_then(|w| w.get_computed_style(element).ok().flatten())
    else {
        return true;
    };
    let display = style.get_property_value("display").unwrap_or_default();
    let visibility = style.get_property_value("visibility").unwrap_or_default();
    let opacity = style.get_property_value("opacity").unwrap_or_default();

    display != "none"
        && visibility != "hidden"
        && opacity.parse::<f64>().map_or(true, |o| o != 0.0)
}

/// Center point of an element in page coordinates.
fn element_center(element: &Element) -> (f64, f64) {
    let rect = element.get_bounding_client_rect();
    let (sx, sy) = scroll_offsets();
    (
        rect.left() + rect.width() / 2.0 + sx,
        rect.top() + rect.height() / 2.0 + sy,
    )
}

/// Build a structural selector by walking from `element` up to (not
/// including) the page root. An id short-circuits the walk; otherwise each
/// level contributes tag + filtered classes + an nth-of-type disambiguator
/// when same-tag siblings exist. Best-effort, not guaranteed unique.
pub fn build_selector(element: &Element) -> Option<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = element.clone();

    loop {
        let tag = current.tag_name().to_lowercase();
        if tag == "html" || tag == "body" {
            break;
        }

        let id = current.id();
        if !id.is_empty() {
            segments.push(format!("#{id}"));
            break;
        }

        let classes = filter_classes(class_names(&current));
        let nth = sibling_index(&current, &tag);
        segments.push(selector_segment(&tag, &classes, nth));

        match current.parent_element() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    Some(segments.join(" > "))
}

fn class_names(element: &Element) -> Vec<String> {
    let list = element.class_list();
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

/// Drop widget-internal and build-tool-generated class names: they either
/// belong to the overlay itself or churn between deployments.
fn filter_classes(classes: Vec<String>) -> Vec<String> {
    classes
        .into_iter()
        .filter(|class| {
            !class.starts_with(INTERNAL_CLASS_PREFIX)
                && !class.starts_with("css-")
                && !class.contains(':')
        })
        .collect()
}

fn selector_segment(tag: &str, classes: &[String], nth: Option<usize>) -> String {
    let mut segment = tag.to_string();
    for class in classes {
        segment.push('.');
        segment.push_str(class);
    }
    if let Some(nth) = nth {
        segment.push_str(&format!(":nth-of-type({nth})"));
    }
    segment
}

/// 1-based nth-of-type index, only when the element actually has same-tag
/// siblings to disambiguate from.
fn sibling_index(element: &Element, tag: &str) -> Option<usize> {
    let mut index = 1;
    let mut has_same_tag = false;

    let mut prev = element.previous_element_sibling();
    while let Some(sibling) = prev {
        if sibling.tag_name().eq_ignore_ascii_case(tag) {
            index += 1;
            has_same_tag = true;
        }
        prev = sibling.previous_element_sibling();
    }

    let mut next = element.next_element_sibling();
    while let Some(sibling) = next {
        if sibling.tag_name().eq_ignore_ascii_case(tag) {
            has_same_tag = true;
            break;
        }
        next = sibling.next_element_sibling();
    }

    has_same_tag.then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_position_prefers_live_selector() {
        let coords = Some(PagePoint { x: 100.0, y: 200.0 });

        // Selector resolves: live position wins.
        assert_eq!(
            pick_position(Some((10.0, 20.0)), coords),
            Some((10.0, 20.0, true))
        );
        // Selector gone: literal coordinates.
        assert_eq!(pick_position(None, coords), Some((100.0, 200.0, false)));
        // Selector only.
        assert_eq!(
            pick_position(Some((10.0, 20.0)), None),
            Some((10.0, 20.0, true))
        );
        // Neither: suppress the marker.
        assert_eq!(pick_position(None, None), None);
    }

    #[test]
    fn test_filter_classes() {
        let classes = vec![
            "card".to_string(),
            "cw-marker".to_string(),
            "hover:underline".to_string(),
            "css-1q2w3e".to_string(),
            "primary".to_string(),
        ];
        assert_eq!(
            filter_classes(classes),
            vec!["card".to_string(), "primary".to_string()]
        );
    }

    #[test]
    fn test_selector_segment() {
        assert_eq!(selector_segment("div", &[], None), "div");
        assert_eq!(
            selector_segment("li", &["item".to_string()], Some(3)),
            "li.item:nth-of-type(3)"
        );
        assert_eq!(
            selector_segment(
                "button",
                &["btn".to_string(), "primary".to_string()],
                None
            ),
            "button.btn.primary"
        );
    }
}
