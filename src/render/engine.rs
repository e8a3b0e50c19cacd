//! The per-request render state machine.
//!
//! `Matching -> {ResponseOverridden | ShellPending} -> {Streaming |
//! Buffering} -> {ShellError | Complete | Aborted}`.
//!
//! The renderer runs in its own task and reports through an event channel;
//! the engine multiplexes those events against the abort-delay timer and
//! the transport-close signal. Whatever fires first decides the request's
//! fate, and the cancel token carries that decision back into the renderer.

use super::cancel::{CancelReason, CancelToken};
use super::error::{StreamErrorKind, StreamFault, classify_fault};
use super::router::{RouteHandler, RouterContext, RouterOutcome};
use super::transport::Transport;
use super::writer::{self, StatusDecision};
use super::{RenderOptions, RequestContext};
use crate::manifest::{self, AssetSource, InjectOptions};
use crate::{debug, log};
use anyhow::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events the renderer reports while producing the page.
///
/// Contract: `ShellReady` comes before any `Chunk`; `AllReady` or a closed
/// channel ends the stream; `ShellError` replaces `ShellReady` when the
/// shell itself fails.
#[derive(Debug)]
pub enum RenderEvent {
    /// The synchronously-available shell resolved; chunks follow.
    ShellReady,
    /// One raw chunk of rendered body.
    Chunk(Vec<u8>),
    /// The whole tree resolved.
    AllReady,
    /// The renderer failed before the first committable byte.
    ShellError(String),
    /// A fault after the shell; the stream may still continue.
    Error(String),
}

/// Everything a renderer invocation receives.
pub struct RenderJob {
    pub router: Arc<RouterContext>,
    pub app_props: Map<String, Value>,
    /// Slot components fill to override status/redirect mid-render.
    pub response: super::ResponseSlot,
    pub events: mpsc::Sender<RenderEvent>,
    /// Observed at every suspension point; satisfied by timer or disconnect.
    pub cancel: CancelToken,
}

/// The external tree-renderer. Spawns its own task and reports through the
/// job's event channel.
pub trait AppRenderer: Send + Sync {
    fn render(&self, job: RenderJob);
}

/// Render one request.
///
/// `Ok(())` means the request was handled - including the degenerate ends
/// (response override, shell error document, abort with no output). The
/// error classification, if any, is left in `ctx.did_error`.
pub async fn render<H, R, T>(
    handler: &H,
    renderer: &R,
    assets: &AssetSource<'_>,
    options: &RenderOptions,
    ctx: &mut RequestContext,
    transport: &mut T,
) -> Result<()>
where
    H: RouteHandler,
    R: AppRenderer,
    T: Transport,
{
    // Matching: loaders run first; a response-like loader result ends the
    // request without ever invoking the renderer.
    let router = match handler.query(&ctx.request).await? {
        RouterOutcome::Response(response) => {
            debug!("render"; "loader override: {} for {}", response.status, ctx.request.url);
            writer::apply_override(transport, &response).await?;
            return Ok(());
        }
        RouterOutcome::Context(context) => Arc::new(context),
    };

    let default_status = router.status;
    ctx.router = Some(Arc::clone(&router));

    // ShellPending: inject the matched routes' asset closure into the header
    // half, optionally pushing Early Hints ahead of the main response.
    let route_assets =
        assets.assets_for_routes(&router.route_ids(), &router.module_ids());
    ctx.html.header = manifest::inject_assets(
        &ctx.html.header,
        &route_assets,
        InjectOptions {
            module_preload: options.module_preload,
        },
    );
    if ctx.has_early_hints && !route_assets.is_empty() {
        transport
            .write_raw(&manifest::early_hints_block(&route_assets))
            .await?;
    }

    if let Some(hook) = &options.on_router_ready
        && let Some(is_stream) = hook(ctx).is_stream
    {
        ctx.is_stream = is_stream;
    }

    // Start the renderer; from here on the abort timer is live.
    let (events_tx, mut events) = mpsc::channel(16);
    let cancel = CancelToken::new();
    renderer.render(RenderJob {
        router: Arc::clone(&router),
        app_props: ctx.app_props.clone(),
        response: ctx.server_response.clone(),
        events: events_tx,
        cancel: cancel.clone(),
    });

    let abort_timer = tokio::time::sleep(options.abort_delay);
    tokio::pin!(abort_timer);
    let closed = transport.close_signal().closed();
    tokio::pin!(closed);

    // Await the shell (or its failure).
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(RenderEvent::ShellReady) => break,
                Some(RenderEvent::ShellError(message)) => {
                    return shell_error(ctx, options, transport, &message).await;
                }
                Some(RenderEvent::Error(message)) => {
                    // Pre-shell fault: record it, the renderer decides
                    // whether a shell can still be produced.
                    record_fault(ctx, options, classify_fault(&message));
                }
                Some(RenderEvent::Chunk(_)) | Some(RenderEvent::AllReady) => {}
                None => {
                    return shell_error(ctx, options, transport, "renderer exited before the shell resolved").await;
                }
            },
            () = &mut abort_timer => {
                abort(ctx, options, &cancel, CancelReason::Timeout);
                return Ok(());
            }
            () = &mut closed => {
                abort(ctx, options, &cancel, CancelReason::Closed);
                return Ok(());
            }
        }
    }

    if ctx.is_stream {
        stream_body(
            ctx,
            options,
            transport,
            &mut events,
            &cancel,
            abort_timer,
            closed,
            default_status,
        )
        .await
    } else {
        buffer_body(
            ctx,
            options,
            transport,
            &mut events,
            &cancel,
            abort_timer,
            closed,
            default_status,
        )
        .await
    }
}

/// Streaming: flush the header as soon as the shell resolves, pump chunks,
/// and append the footer even after a fault so a partially-flushed client
/// can hydrate what it received.
#[allow(clippy::too_many_arguments)]
async fn stream_body<T: Transport>(
    ctx: &mut RequestContext,
    options: &RenderOptions,
    transport: &mut T,
    events: &mut mpsc::Receiver<RenderEvent>,
    cancel: &CancelToken,
    mut abort_timer: std::pin::Pin<&mut tokio::time::Sleep>,
    mut closed: std::pin::Pin<&mut (impl Future<Output = ()> + Sized)>,
    default_status: u16,
) -> Result<()> {
    let StatusDecision::Send(status) =
        writer::resolve_status(ctx, default_status, transport).await?
    else {
        return Ok(());
    };

    let overrides = options
        .on_shell_ready
        .as_ref()
        .map(|hook| hook(ctx))
        .unwrap_or_default();
    let header = overrides.header.unwrap_or_else(|| ctx.html.header.clone());
    let footer_half = overrides.footer.unwrap_or_else(|| ctx.html.footer.clone());
    let footer = writer::compose_footer(ctx, options, &footer_half);

    transport.write_head(status, &writer::html_headers()).await?;
    writer::write_chunk_hooked(transport, ctx, options, header.as_bytes()).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(RenderEvent::Chunk(chunk)) => {
                    if writer::write_chunk_hooked(transport, ctx, options, &chunk)
                        .await
                        .is_err()
                    {
                        abort(ctx, options, cancel, CancelReason::Closed);
                        break;
                    }
                }
                Some(RenderEvent::AllReady) => break,
                Some(RenderEvent::Error(message)) => {
                    record_fault(ctx, options, classify_fault(&message));
                }
                Some(RenderEvent::ShellReady) | Some(RenderEvent::ShellError(_)) => {}
                None => break,
            },
            () = &mut abort_timer => {
                abort(ctx, options, cancel, CancelReason::Timeout);
                break;
            }
            () = &mut closed => {
                abort(ctx, options, cancel, CancelReason::Closed);
                break;
            }
        }
    }

    // Footer goes out regardless of how the loop ended; only a healthy
    // stream propagates write failures.
    let footer_written =
        writer::write_chunk_hooked(transport, ctx, options, footer.as_bytes()).await;
    let finished = transport.finish().await;
    if ctx.did_error.is_none() {
        footer_written?;
        finished?;
    }
    Ok(())
}

/// Buffering: nothing is flushed until the entire tree resolves; a fault
/// before then produces no output at all.
#[allow(clippy::too_many_arguments)]
async fn buffer_body<T: Transport>(
    ctx: &mut RequestContext,
    options: &RenderOptions,
    transport: &mut T,
    events: &mut mpsc::Receiver<RenderEvent>,
    cancel: &CancelToken,
    mut abort_timer: std::pin::Pin<&mut tokio::time::Sleep>,
    mut closed: std::pin::Pin<&mut (impl Future<Output = ()> + Sized)>,
    default_status: u16,
) -> Result<()> {
    let mut body: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(RenderEvent::Chunk(chunk)) => body.extend_from_slice(&chunk),
                Some(RenderEvent::AllReady) => {
                    let StatusDecision::Send(status) =
                        writer::resolve_status(ctx, default_status, transport).await?
                    else {
                        return Ok(());
                    };

                    let overrides = options
                        .on_shell_ready
                        .as_ref()
                        .map(|hook| hook(ctx))
                        .unwrap_or_default();
                    let header =
                        overrides.header.unwrap_or_else(|| ctx.html.header.clone());
                    let footer_half =
                        overrides.footer.unwrap_or_else(|| ctx.html.footer.clone());
                    let footer = writer::compose_footer(ctx, options, &footer_half);

                    writer::write_document(
                        transport, ctx, options, status, &header, &body, &footer,
                    )
                    .await?;
                    return Ok(());
                }
                Some(RenderEvent::Error(message)) => {
                    record_fault(ctx, options, classify_fault(&message));
                }
                Some(RenderEvent::ShellReady) | Some(RenderEvent::ShellError(_)) => {}
                None => return Ok(()),
            },
            () = &mut abort_timer => {
                abort(ctx, options, cancel, CancelReason::Timeout);
                return Ok(());
            }
            () = &mut closed => {
                abort(ctx, options, cancel, CancelReason::Closed);
                return Ok(());
            }
        }
    }
}

/// ShellError: the renderer failed before the first committable byte.
/// Render a fallback document with status 500; nothing was streamed.
async fn shell_error<T: Transport>(
    ctx: &mut RequestContext,
    options: &RenderOptions,
    transport: &mut T,
    message: &str,
) -> Result<()> {
    let fault = StreamFault::new(StreamErrorKind::Unknown, message);
    log!("error"; "shell error: {message}");

    let html = options
        .on_shell_error
        .as_ref()
        .and_then(|hook| hook(ctx, &fault))
        .unwrap_or_else(|| format!("<!doctype html><p>Something went wrong: {message}</p>"));

    transport.write_head(500, &writer::html_headers()).await?;
    transport.write_chunk(html.as_bytes()).await?;
    transport.finish().await?;
    Ok(())
}

/// Cancel the renderer and classify the abort.
fn abort(
    ctx: &mut RequestContext,
    options: &RenderOptions,
    cancel: &CancelToken,
    reason: CancelReason,
) {
    cancel.cancel(reason);
    let fault = match reason {
        CancelReason::Timeout => StreamFault::new(
            StreamErrorKind::Timeout,
            "the render did not complete within the abort delay",
        ),
        CancelReason::Closed => StreamFault::new(
            StreamErrorKind::Cancel,
            "the transport closed before the render completed",
        ),
    };
    record_fault(ctx, options, fault);
}

/// Record the first fault classification, notify the hook, and log at the
/// severity the class deserves.
fn record_fault(ctx: &mut RequestContext, options: &RenderOptions, fault: StreamFault) {
    if ctx.did_error.is_none() {
        ctx.did_error = Some(fault.kind);
    }
    if let Some(hook) = &options.on_error {
        hook(ctx, &fault);
    }

    log!("stream"; "stream error: {}", fault.kind.code());
    if fault.kind.is_transient() {
        debug!("stream"; "{}", fault.message);
    } else {
        log!("error"; "{}", fault.message);
    }
}
