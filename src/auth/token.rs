//! Bearer token value object and the fail-closed expiry inspector.

pub mod inspector;
pub mod secret;
