//! Marker drag gesture: click/drag disambiguation and reposition capture.
//!
//! The same pointer gesture means "open" below the movement threshold and
//! "move" above it, so the decision is deferred until release.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::MouseEvent;

use crate::interop::{document, scroll_offsets};

pub const DRAG_THRESHOLD_PX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragPhase {
    /// Mouse is down but movement has stayed within the threshold.
    Pending,
    Dragging,
}

#[derive(Debug)]
pub struct DragGesture {
    thread_id: String,
    origin: (f64, f64),
    grab_offset: (f64, f64),
    phase: DragPhase,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Movement stayed within the threshold: a plain click, open the thread.
    Click { thread_id: String },
    /// The marker was dropped at this pointer position (client coordinates).
    Drop { thread_id: String, x: f64, y: f64 },
}

impl DragGesture {
    /// `pointer` in client coordinates; `grab_offset` is where within the
    /// marker the pointer grabbed it, so the marker follows the pointer
    /// without jumping to center on the cursor.
    pub fn new(thread_id: String, pointer: (f64, f64), grab_offset: (f64, f64)) -> Self {
        Self {
            thread_id,
            origin: pointer,
            grab_offset,
            phase: DragPhase::Pending,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == DragPhase::Dragging
    }

    /// Feed a pointer move. Returns the marker's top-left (client
    /// coordinates) once the gesture has committed to a drag; `None` while
    /// still within the click threshold.
    pub fn pointer_moved(&mut self, pointer: (f64, f64)) -> Option<(f64, f64)> {
        if self.phase == DragPhase::Pending && self.distance_from_origin(pointer) > DRAG_THRESHOLD_PX
        {
            self.phase = DragPhase::Dragging;
        }
        match self.phase {
            DragPhase::Dragging => Some((
                pointer.0 - self.grab_offset.0,
                pointer.1 - self.grab_offset.1,
            )),
            DragPhase::Pending => None,
        }
    }

    pub fn pointer_released(mut self, pointer: (f64, f64)) -> DragOutcome {
        self.pointer_moved(pointer);
        match self.phase {
            DragPhase::Dragging => DragOutcome::Drop {
                thread_id: self.thread_id,
                x: pointer.0,
                y: pointer.1,
            },
            DragPhase::Pending => DragOutcome::Click {
                thread_id: self.thread_id,
            },
        }
    }

    fn distance_from_origin(&self, pointer: (f64, f64)) -> f64 {
        let dx = pointer.0 - self.origin.0;
        let dy = pointer.1 - self.origin.1;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Document-level listeners for one in-flight gesture. Dropping the runtime
/// detaches them.
pub struct DragRuntime {
    on_move: Closure<dyn FnMut(MouseEvent)>,
    on_up: Closure<dyn FnMut(MouseEvent)>,
}

impl Drop for DragRuntime {
    fn drop(&mut self) {
        if let Some(document) = document() {
            let _ = document.remove_event_listener_with_callback(
                "mousemove",
                self.on_move.as_ref().unchecked_ref(),
            );
            let _ = document.remove_event_listener_with_callback(
                "mouseup",
                self.on_up.as_ref().unchecked_ref(),
            );
        }
    }
}

/// Track a gesture started by a marker mousedown. `on_preview` receives the
/// marker's top-left in page coordinates while dragging; `on_outcome` fires
/// exactly once on release. The caller must keep the runtime alive until
/// the outcome arrives and must not drop it from inside `on_outcome`
/// (defer the cleanup a tick).
pub fn start_marker_drag(
    gesture: DragGesture,
    mut on_preview: impl FnMut(f64, f64) + 'static,
    on_outcome: impl FnMut(DragOutcome) + 'static,
) -> Option<DragRuntime> {
    let document = document()?;

    let gesture = Rc::new(RefCell::new(Some(gesture)));
    let on_outcome = Rc::new(RefCell::new(on_outcome));

    let move_gesture = gesture.clone();
    let on_move = Closure::wrap(Box::new(move |e: MouseEvent| {
        e.prevent_default();
        if let Some(gesture) = move_gesture.borrow_mut().as_mut() {
            let pointer = (e.client_x() as f64, e.client_y() as f64);
            if let Some((left, top)) = gesture.pointer_moved(pointer) {
                let (sx, sy) = scroll_offsets();
                on_preview(left + sx, top + sy);
            }
        }
    }) as Box<dyn FnMut(MouseEvent)>);

    let up_gesture = gesture.clone();
    let up_outcome = on_outcome.clone();
    let on_up = Closure::wrap(Box::new(move |e: MouseEvent| {
        if let Some(gesture) = up_gesture.borrow_mut().take() {
            let pointer = (e.client_x() as f64, e.client_y() as f64);
            let outcome = gesture.pointer_released(pointer);
            up_outcome.borrow_mut()(outcome);
        }
    }) as Box<dyn FnMut(MouseEvent)>);

    document
        .add_event_listener_with_callback("mousemove", on_move.as_ref().unchecked_ref())
        .ok()?;
    document
        .add_event_listener_with_callback("mouseup", on_up.as_ref().unchecked_ref())
        .ok()?;

    Some(DragRuntime { on_move, on_up })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_below_threshold() {
        let gesture = DragGesture::new("t1".to_string(), (10.0, 10.0), (4.0, 4.0));
        let outcome = gesture.pointer_released((13.0, 13.0));
        assert_eq!(
            outcome,
            DragOutcome::Click {
                thread_id: "t1".to_string()
            }
        );
    }

    #[test]
    fn test_drop_above_threshold() {
        let mut gesture = DragGesture::new("t1".to_string(), (10.0, 10.0), (4.0, 4.0));
        assert!(gesture.pointer_moved((12.0, 10.0)).is_none());
        assert!(!gesture.is_dragging());

        // Crossing the threshold commits to a drag; the marker tracks the
        // pointer minus the grab offset.
        assert_eq!(gesture.pointer_moved((20.0, 10.0)), Some((16.0, 6.0)));
        assert!(gesture.is_dragging());

        let outcome = gesture.pointer_released((40.0, 25.0));
        assert_eq!(
            outcome,
            DragOutcome::Drop {
                thread_id: "t1".to_string(),
                x: 40.0,
                y: 25.0
            }
        );
    }

    #[test]
    fn test_drag_sticks_after_returning_to_origin() {
        let mut gesture = DragGesture::new("t1".to_string(), (10.0, 10.0), (0.0, 0.0));
        gesture.pointer_moved((30.0, 30.0));

        // Returning to the start does not demote a committed drag.
        let outcome = gesture.pointer_released((10.0, 10.0));
        assert!(matches!(outcome, DragOutcome::Drop { .. }));
    }

    #[test]
    fn test_far_release_without_moves_is_a_drop() {
        let gesture = DragGesture::new("t1".to_string(), (0.0, 0.0), (0.0, 0.0));
        let outcome = gesture.pointer_released((50.0, 0.0));
        assert!(matches!(outcome, DragOutcome::Drop { .. }));
    }
}
