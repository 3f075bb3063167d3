//! WASM module: browser glue for the session stack
//!
//! - `init`: panic hook, installed on module load
//! - `console_log` / `log!`: browser console output
//! - [`WebStorage`]: `localStorage`-backed [`KeyValueStore`](crate::storage::KeyValueStore)
//! - [`WalletSession`]: JS-facing wrapper over `WalletContext`
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      WalletSession (JS, Promises)       │
//! ├─────────────────────────────────────────┤
//! │   WalletContext (spawn_local poller)    │
//! └─────────────────┬───────────────────────┘
//!                   │ SelectionStore
//! ┌─────────────────▼───────────────────────┐
//! │      WebStorage (window.localStorage)   │
//! └─────────────────────────────────────────┘
//! ```

mod session;
mod storage;

pub use session::WalletSession;
pub use storage::WebStorage;

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
