//! Response composition.
//!
//! Writes header, streamed body, footer - in that exact order, never
//! reordered. Applies any server-context response override before headers
//! commit: a component-raised redirect suppresses the body entirely.

use super::state::{build_custom_state, build_router_state};
use super::{RenderOptions, RequestContext, ResponseOverride, Transport};
use std::io;

/// What the response override left us to do.
pub(crate) enum StatusDecision {
    /// Proceed with this status.
    Send(u16),
    /// A redirect was already written; skip the body.
    Redirected,
}

/// Write a response-like override (redirect or bare status) and end the
/// response without invoking the renderer.
pub(crate) async fn apply_override<T: Transport>(
    transport: &mut T,
    response: &ResponseOverride,
) -> io::Result<()> {
    transport.write_head(response.status, &response.headers).await?;
    transport.finish().await
}

/// Drain the component-set response slot before committing headers.
pub(crate) async fn resolve_status<T: Transport>(
    ctx: &RequestContext,
    default_status: u16,
    transport: &mut T,
) -> io::Result<StatusDecision> {
    match ctx.server_response.take() {
        Some(response) if response.is_redirect() => {
            apply_override(transport, &response).await?;
            Ok(StatusDecision::Redirected)
        }
        Some(response) => Ok(StatusDecision::Send(response.status)),
        None => Ok(StatusDecision::Send(default_status)),
    }
}

pub(crate) fn html_headers() -> Vec<(String, String)> {
    vec![("content-type".into(), "text/html".into())]
}

/// Compose the full footer: router hydration state, custom state payloads,
/// then the shell's closing half.
pub(crate) fn compose_footer(
    ctx: &RequestContext,
    options: &RenderOptions,
    footer_half: &str,
) -> String {
    let router_state = ctx
        .router
        .as_deref()
        .map(build_router_state)
        .unwrap_or_default();

    let custom_state = options
        .get_state
        .as_ref()
        .and_then(|hook| hook(ctx))
        .map(|state| build_custom_state(Some(&state)))
        .unwrap_or_default();

    format!("{router_state}{custom_state}{footer_half}")
}

/// Write one chunk through the interception hook: markup the hook returns is
/// spliced in front of the chunk without buffering the stream.
pub(crate) async fn write_chunk_hooked<T: Transport>(
    transport: &mut T,
    ctx: &RequestContext,
    options: &RenderOptions,
    chunk: &[u8],
) -> io::Result<()> {
    if let Some(hook) = &options.on_chunk
        && let Some(prefix) = hook(ctx, chunk)
    {
        transport.write_chunk(&prefix).await?;
    }
    transport.write_chunk(chunk).await
}

/// Buffered completion: nothing was flushed yet, write the whole document.
pub(crate) async fn write_document<T: Transport>(
    transport: &mut T,
    ctx: &RequestContext,
    options: &RenderOptions,
    status: u16,
    header: &str,
    body: &[u8],
    footer: &str,
) -> io::Result<()> {
    transport.write_head(status, &html_headers()).await?;
    write_chunk_hooked(transport, ctx, options, header.as_bytes()).await?;
    write_chunk_hooked(transport, ctx, options, body).await?;
    write_chunk_hooked(transport, ctx, options, footer.as_bytes()).await?;
    transport.finish().await
}
