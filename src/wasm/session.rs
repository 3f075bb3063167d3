//! WalletSession: the wallet context exposed to JavaScript
//!
//! Backed by `localStorage` for the remembered wallet and the simulated
//! wallet set. Every method resolves to plain JSON-shaped values; failures
//! reject with `{ kind, message }` so the page can branch on `kind`.

use serde::Serialize;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

use super::log;
use super::storage::WebStorage;
use crate::context::{ContextConfig, WalletContext};
use crate::core::TransactionPayload;
use crate::error::SessionError;
use crate::session::RestoreOutcome;
use crate::simulated::{demo_cluster, demo_registry};

#[wasm_bindgen]
pub struct WalletSession {
    ctx: WalletContext,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let raw = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&raw)
}

fn reject(err: SessionError) -> JsValue {
    let body = serde_json::json!({ "kind": err.kind(), "message": err.to_string() });
    to_js(&body).unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
impl WalletSession {
    /// Open the session for `app`. With `auto_connect`, the remembered
    /// wallet is silently reconnected before this resolves.
    #[wasm_bindgen(js_name = "open")]
    pub async fn open(app: &str, auto_connect: bool) -> Result<WalletSession, JsValue> {
        if !WebStorage::is_available() {
            log!("[WalletSession] localStorage unavailable, selection will not persist");
        }
        let config = ContextConfig::new(app).with_auto_connect(auto_connect);
        let ctx = WalletContext::init(
            config,
            demo_registry(),
            Arc::new(WebStorage::new()),
            Arc::new(demo_cluster()),
        )
        .await;
        log!("[WalletSession] opened '{}' ({})", app, ctx.state().status);
        Ok(WalletSession { ctx })
    }

    #[wasm_bindgen]
    pub fn wallets(&self) -> Result<JsValue, JsValue> {
        to_js(&self.ctx.wallets())
    }

    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.ctx.state())
    }

    #[wasm_bindgen]
    pub fn select(&self, name: &str) -> Result<JsValue, JsValue> {
        let descriptor = self.ctx.select(name).map_err(reject)?;
        to_js(&descriptor.info())
    }

    /// Resolves to the connected account.
    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<String, JsValue> {
        let account = self.ctx.connect().await.map_err(reject)?;
        Ok(account.to_string())
    }

    #[wasm_bindgen]
    pub async fn disconnect(&self) -> Result<(), JsValue> {
        self.ctx.disconnect().await.map_err(reject)
    }

    /// Resolves to the connected account, or `null`.
    #[wasm_bindgen]
    pub async fn restore(&self) -> Option<String> {
        match self.ctx.restore().await {
            RestoreOutcome::Restored(account) => Some(account.to_string()),
            _ => None,
        }
    }

    /// Hex signature over the UTF-8 bytes of `text`.
    #[wasm_bindgen(js_name = "signMessage")]
    pub async fn sign_message(&self, text: &str) -> Result<String, JsValue> {
        let signature = self.ctx.sign_text(text).await.map_err(reject)?;
        Ok(hex::encode(signature))
    }

    /// Quote, sign, submit and confirm a transaction carrying `memo`.
    #[wasm_bindgen(js_name = "sendTransaction")]
    pub async fn send_transaction(&self, memo: &str) -> Result<String, JsValue> {
        let payload = TransactionPayload::new(memo.as_bytes().to_vec());
        let id = self.ctx.send_transaction(payload).await.map_err(reject)?;
        Ok(id.to_string())
    }

    /// Current balance view: `{ snapshot, fetching, lastError }`.
    #[wasm_bindgen]
    pub fn balance(&self) -> Result<JsValue, JsValue> {
        to_js(&self.ctx.balance_view())
    }

    #[wasm_bindgen(js_name = "refreshBalance")]
    pub async fn refresh_balance(&self) -> Result<JsValue, JsValue> {
        to_js(&self.ctx.refresh_balance().await)
    }

    /// Call `callback(state)` on every session transition.
    #[wasm_bindgen(js_name = "onStateChange")]
    pub fn on_state_change(&self, callback: js_sys::Function) {
        let mut states = self.ctx.subscribe();
        wasm_bindgen_futures::spawn_local(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                if let Ok(value) = to_js(&state) {
                    let _ = callback.call1(&JsValue::NULL, &value);
                }
            }
        });
    }

    /// Stop polling, disconnect and forget the remembered wallet.
    #[wasm_bindgen]
    pub async fn teardown(&self) {
        self.ctx.teardown().await;
    }
}
