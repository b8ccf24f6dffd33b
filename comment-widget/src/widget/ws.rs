//! Realtime channel: one socket per widget instance, subscribed to the
//! repo (or repo:branch) room.
//!
//! Subscriptions are not persisted server-side across disconnects, so every
//! (re)connect sends the subscribe again.

use std::cell::RefCell;
use std::rc::Rc;

use comment_types::{Message, Reaction, RealtimeMsg};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, Event, MessageEvent, WebSocket};

#[derive(Debug, Clone)]
pub enum WsEvent {
    Connected,
    Disconnected,
    Subscribed {
        room: String,
    },
    MessageAdded {
        thread_id: String,
        message: Message,
    },
    MessageEdited {
        thread_id: String,
        message_id: String,
        content: String,
    },
    MessageDeleted {
        thread_id: String,
        message_id: String,
    },
    ReactionAdded {
        thread_id: String,
        message_id: String,
        reaction: Reaction,
    },
    ReactionRemoved {
        thread_id: String,
        message_id: String,
        reaction: Reaction,
    },
    ThreadCreated {
        thread_id: String,
    },
    ThreadUpdated {
        thread_id: String,
    },
    Error(String),
}

pub fn http_to_ws_url(http_url: &str) -> String {
    if http_url.starts_with("http://") {
        http_url.replace("http://", "ws://")
    } else if http_url.starts_with("https://") {
        http_url.replace("https://", "wss://")
    } else if http_url.is_empty() {
        // Same origin - use current protocol
        let protocol = web_sys::window()
            .and_then(|w| w.location().protocol().ok())
            .unwrap_or_else(|| "http:".to_string());
        let host = web_sys::window()
            .and_then(|w| w.location().host().ok())
            .unwrap_or_else(|| "localhost".to_string());

        if protocol == "https:" {
            format!("wss://{host}")
        } else {
            format!("ws://{host}")
        }
    } else {
        format!("ws://{http_url}")
    }
}

pub fn parse_ws_message(payload: &str) -> Option<WsEvent> {
    match serde_json::from_str::<RealtimeMsg>(payload).ok()? {
        // Client → server only; a server never sends this.
        RealtimeMsg::Subscribe { .. } => None,
        RealtimeMsg::Subscribed { room } => Some(WsEvent::Subscribed { room }),
        RealtimeMsg::MessageAdded { thread_id, message } => {
            Some(WsEvent::MessageAdded { thread_id, message })
        }
        RealtimeMsg::MessageEdited {
            thread_id,
            message_id,
            content,
        } => Some(WsEvent::MessageEdited {
            thread_id,
            message_id,
            content,
        }),
        RealtimeMsg::MessageDeleted {
            thread_id,
            message_id,
        } => Some(WsEvent::MessageDeleted {
            thread_id,
            message_id,
        }),
        RealtimeMsg::ReactionAdded {
            thread_id,
            message_id,
            reaction,
        } => Some(WsEvent::ReactionAdded {
            thread_id,
            message_id,
            reaction,
        }),
        RealtimeMsg::ReactionRemoved {
            thread_id,
            message_id,
            reaction,
        } => Some(WsEvent::ReactionRemoved {
            thread_id,
            message_id,
            reaction,
        }),
        RealtimeMsg::ThreadCreated { thread_id } => Some(WsEvent::ThreadCreated { thread_id }),
        RealtimeMsg::ThreadUpdated { thread_id } => Some(WsEvent::ThreadUpdated { thread_id }),
        RealtimeMsg::Error { message } => Some(WsEvent::Error(message)),
    }
}

/// Owns the socket and its handlers. Dropping it unhooks the handlers
/// first, then closes the socket, so teardown never echoes a Disconnected
/// back into the widget.
pub struct RealtimeRuntime {
    ws: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(ErrorEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl RealtimeRuntime {
    /// Connecting or open: no reconnect attempt needed yet.
    pub fn is_alive(&self) -> bool {
        matches!(
            self.ws.ready_state(),
            WebSocket::CONNECTING | WebSocket::OPEN
        )
    }
}

impl Drop for RealtimeRuntime {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}

/// Open the socket and wire the handlers. The subscribe for the current
/// room goes out on open. The bearer token travels as a query parameter —
/// the browser WebSocket API cannot set headers.
pub fn connect_realtime<F>(
    api_base: &str,
    token: Option<&str>,
    repo: &str,
    branch: &str,
    on_event: F,
) -> Option<RealtimeRuntime>
where
    F: FnMut(WsEvent) + 'static,
{
    let ws_base = http_to_ws_url(api_base);
    let ws_url = match token {
        Some(token) => format!(
            "{ws_base}/ws?token={}",
            String::from(js_sys::encode_uri_component(token))
        ),
        None => format!("{ws_base}/ws"),
    };

    dioxus_logger::tracing::info!("Connecting to realtime channel: {}/ws", ws_base);

    let ws = match WebSocket::new(&ws_url) {
        Ok(ws) => ws,
        Err(e) => {
            dioxus_logger::tracing::error!("Failed to create WebSocket: {:?}", e);
            return None;
        }
    };

    let on_event = Rc::new(RefCell::new(on_event));
    let on_event_open = on_event.clone();
    let on_event_close = on_event.clone();
    let ws_clone = ws.clone();
    let subscribe = RealtimeMsg::Subscribe {
        repo: repo.to_string(),
        branch: (!branch.is_empty()).then(|| branch.to_string()),
    };

    let on_open = Closure::wrap(Box::new(move |_e: Event| {
        dioxus_logger::tracing::info!("Realtime channel connected");
        on_event_open.borrow_mut()(WsEvent::Connected);

        if let Ok(payload) = serde_json::to_string(&subscribe) {
            let _ = ws_clone.send_with_str(&payload);
        }
    }) as Box<dyn FnMut(Event)>);
    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

    let on_event_message = on_event.clone();
    let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
        if let Ok(text) = e.data().dyn_into::<js_sys::JsString>() {
            let text_str = text.as_string().unwrap_or_default();
            dioxus_logger::tracing::debug!("Realtime message: {}", text_str);

            if let Some(event) = parse_ws_message(&text_str) {
                if let WsEvent::Error(message) = &event {
                    dioxus_logger::tracing::error!("Realtime error message: {}", message);
                }
                on_event_message.borrow_mut()(event);
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

    let on_error = Closure::wrap(Box::new(move |e: ErrorEvent| {
        dioxus_logger::tracing::error!("Realtime channel error: {}", e.message());
    }) as Box<dyn FnMut(ErrorEvent)>);
    ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
        dioxus_logger::tracing::info!("Realtime channel disconnected");
        on_event_close.borrow_mut()(WsEvent::Disconnected);
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    Some(RealtimeRuntime {
        ws,
        _on_open: on_open,
        _on_message: on_message,
        _on_error: on_error,
        _on_close: on_close,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_to_ws_url() {
        assert_eq!(http_to_ws_url("http://localhost:8787"), "ws://localhost:8787");
        assert_eq!(http_to_ws_url("https://crit.example"), "wss://crit.example");
        assert_eq!(http_to_ws_url("crit.example"), "ws://crit.example");
    }

    #[test]
    fn test_parse_ws_message() {
        let event = parse_ws_message(r#"{"type":"thread:updated","thread_id":"t1"}"#);
        assert!(matches!(
            event,
            Some(WsEvent::ThreadUpdated { thread_id }) if thread_id == "t1"
        ));

        assert!(parse_ws_message("not json").is_none());
        assert!(parse_ws_message(r#"{"type":"unknown:event"}"#).is_none());
        // A client-side subscribe echoed back is not an event.
        assert!(parse_ws_message(r#"{"type":"subscribe","repo":"r","branch":null}"#).is_none());
    }
}
