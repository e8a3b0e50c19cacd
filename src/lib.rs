//! Strada - streaming server rendering with per-route asset preloading.
//!
//! The crate couples two halves of one problem:
//!
//! - **Build time**: statically resolve the application's declarative route
//!   tree back to file-system import identities ([`routes`]), rewrite route
//!   files so lazy modules normalize themselves at load time ([`transform`]),
//!   and derive a deduplicated, ordered asset closure per route from the
//!   compiled module graph ([`manifest`]).
//! - **Request time**: drive a cancellable, two-phase (shell + body)
//!   streaming render that injects those assets, survives partial failure,
//!   and still lets a partially-flushed client hydrate ([`render`]).
//!
//! The HTTP server itself, the bundler, and the UI tree-renderer are host
//! collaborators: the engine talks to them through the [`render::Transport`],
//! [`render::RouteHandler`] and [`render::AppRenderer`] seams.

pub mod cli;
pub mod config;
pub mod embed;
pub mod logger;
pub mod manifest;
pub mod paths;
pub mod routes;
pub mod transform;

pub mod render;
