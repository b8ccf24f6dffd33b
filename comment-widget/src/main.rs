use dioxus::launch;
use dioxus::prelude::*;
use dioxus_logger::tracing::Level;

use comment_widget::{CommentOverlay, WidgetConfig};

fn main() {
    // Initialize logging for WASM
    wasm_logger::init(wasm_logger::Config::default());
    dioxus_logger::init(Level::INFO).ok();

    launch(App);
}

/// Demo preview page with the overlay mounted on top of it.
#[component]
fn App() -> Element {
    rsx! {
        div {
            id: "demo-page",
            style: "min-height: 150vh; background: #f8fafc; color: #0f172a; padding: 3rem; font-family: sans-serif;",

            h1 { "Acme storefront preview" }
            p { "Drop a comment on anything that looks off." }

            div {
                class: "hero",
                style: "margin-top: 2rem; padding: 2rem; background: white; border-radius: 12px; max-width: 480px;",
                h2 { "Summer sale" }
                p { "Up to 40% off, this week only." }
                button {
                    id: "demo-cta",
                    style: "padding: 0.6rem 1.4rem; background: #2563eb; color: white; border: none; border-radius: 8px;",
                    "Shop now"
                }
            }
        }

        CommentOverlay {
            config: WidgetConfig::new("acme/storefront", "main"),
        }
    }
}
