//! Template rewriting for pubsync.
//!
//! Templates reference their stylesheet and images by content address so
//! that a published manifest pins every byte the site renders. The
//! [`TemplateRewriter`] points the first stylesheet `<link>` and every
//! `<img>` whose `id` names an asset at the gateway URL of that content.

pub mod error;
pub mod rewriter;

pub use error::{TemplateError, TemplateResult};
pub use rewriter::{logical_id, TemplateRewriter};
