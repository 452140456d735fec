//! Canonical output: role mapping, message normalization, record formatting.
//!
//! Everything here is a synchronous pure transform over data already in
//! memory:
//!
//! - [`role`] maps an internal [`MessageKind`](crate::message::MessageKind)
//!   to a transport [`MessageRole`](crate::MessageRole).
//! - [`normalize`] turns an ordered message sequence into ordered
//!   `{role, content}` records, atomically.
//! - [`format`] turns an [`InvocationResult`] into the
//!   [`CanonicalOutputRecord`] handed to callers.

pub mod format;
pub mod normalize;
pub mod role;

pub use format::{CanonicalOutputRecord, InvocationResult, format_response};
pub use normalize::{OutputMessage, normalize_messages};
pub use role::RoleMapper;
