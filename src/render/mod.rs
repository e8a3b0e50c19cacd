//! Per-request streaming render.
//!
//! One logical task per inbound request. The engine matches routes through
//! the host's [`RouteHandler`], injects the matched routes' asset closure
//! into the HTML shell, then drives the host's [`AppRenderer`] through a
//! two-phase (shell + body) stream with a single cancellation token fed by
//! the abort timer and the transport-close signal.

mod cancel;
mod engine;
mod error;
mod router;
mod state;
mod transport;
mod writer;

pub use cancel::{CancelReason, CancelToken};
pub use engine::{AppRenderer, RenderEvent, RenderJob, render};
pub use error::{StreamErrorKind, StreamFault, classify_fault};
pub use router::{
    PageRequest, ResponseOverride, RouteError, RouteHandler, RouteMatch, RouterContext,
    RouterOutcome,
};
pub use state::{ROUTER_STATE_KEY, build_custom_state, build_router_state};
pub use transport::{CloseNotifier, CloseSignal, MemoryTransport, PeerHandle, Transport};

use anyhow::{Result, bail};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Marker splitting the HTML shell into header and footer halves.
pub const SHELL_OUTLET: &str = "<!--ssr-outlet-->";

/// The two halves of the HTML document wrapped around the streamed body.
#[derive(Debug, Clone, Default)]
pub struct HtmlShell {
    pub header: String,
    pub footer: String,
}

impl HtmlShell {
    /// Split a shell document on the outlet marker.
    pub fn split(html: &str) -> Result<Self> {
        match html.split_once(SHELL_OUTLET) {
            Some((header, footer)) => Ok(Self {
                header: header.to_string(),
                footer: footer.to_string(),
            }),
            None => bail!("html shell is missing the {SHELL_OUTLET} marker"),
        }
    }
}

/// Shared slot a component can fill with a response override mid-render.
///
/// Cloned into the renderer; the writer drains it before committing headers.
#[derive(Debug, Clone, Default)]
pub struct ResponseSlot(Arc<Mutex<Option<ResponseOverride>>>);

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, response: ResponseOverride) {
        *self.0.lock() = Some(response);
    }

    pub fn take(&self) -> Option<ResponseOverride> {
        self.0.lock().take()
    }
}

/// Per-request mutable state. Created at request entry, dropped when the
/// response ends; never shared across requests.
#[derive(Debug)]
pub struct RequestContext {
    pub request: PageRequest,
    /// App-level props forwarded to the renderer.
    pub app_props: Map<String, Value>,
    pub html: HtmlShell,
    pub router: Option<Arc<RouterContext>>,
    /// Response override settable by any component during render.
    pub server_response: ResponseSlot,
    pub is_stream: bool,
    pub has_early_hints: bool,
    /// Classification of the first stream fault, if any.
    pub did_error: Option<StreamErrorKind>,
}

impl RequestContext {
    pub fn new(request: PageRequest, html: HtmlShell) -> Self {
        Self {
            request,
            app_props: Map::new(),
            html,
            router: None,
            server_response: ResponseSlot::new(),
            is_stream: true,
            has_early_hints: false,
            did_error: None,
        }
    }
}

/// `on_router_ready` hook result.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterReady {
    pub is_stream: Option<bool>,
}

/// `on_shell_ready` hook result: replacement shell halves.
#[derive(Debug, Clone, Default)]
pub struct ShellOverride {
    pub header: Option<String>,
    pub footer: Option<String>,
}

type RouterReadyHook = dyn Fn(&RequestContext) -> RouterReady + Send + Sync;
type ShellReadyHook = dyn Fn(&RequestContext) -> ShellOverride + Send + Sync;
type ShellErrorHook = dyn Fn(&RequestContext, &StreamFault) -> Option<String> + Send + Sync;
type ErrorHook = dyn Fn(&RequestContext, &StreamFault) + Send + Sync;
type ChunkHook = dyn Fn(&RequestContext, &[u8]) -> Option<Vec<u8>> + Send + Sync;
type StateHook = dyn Fn(&RequestContext) -> Option<Map<String, Value>> + Send + Sync;

/// Render hook points and limits.
pub struct RenderOptions {
    /// How long the engine waits for the renderer before aborting.
    pub abort_delay: Duration,
    /// Emit `<link rel="modulepreload">` for preloadable scripts.
    pub module_preload: bool,
    /// Decide streaming vs. buffering after loaders resolve.
    pub on_router_ready: Option<Box<RouterReadyHook>>,
    /// Replace shell halves just before the first byte.
    pub on_shell_ready: Option<Box<ShellReadyHook>>,
    /// Produce a fallback error document (500) when the shell fails.
    pub on_shell_error: Option<Box<ShellErrorHook>>,
    /// Observe classified stream faults.
    pub on_error: Option<Box<ErrorHook>>,
    /// Inspect every raw chunk; returned markup is spliced in front of it.
    pub on_chunk: Option<Box<ChunkHook>>,
    /// Extra hydration payloads for the footer, keyed by window property.
    pub get_state: Option<Box<StateHook>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            abort_delay: Duration::from_millis(10_000),
            module_preload: true,
            on_router_ready: None,
            on_shell_ready: None,
            on_shell_error: None,
            on_error: None,
            on_chunk: None,
            get_state: None,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self {
            abort_delay: config.abort_delay(),
            module_preload: config.build.module_preload,
            ..Self::default()
        }
    }
}
