pub mod anchor;
pub mod api;
pub mod auth;
pub mod components;
pub mod drag;
pub mod interop;
pub mod marker;
pub mod position;
pub mod widget;

pub use api::*;
pub use components::*;
pub use marker::*;
pub use position::*;
pub use widget::*;
