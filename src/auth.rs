//! Auth-domain value objects: bearer tokens, expiry inspection, and login credentials.

pub mod credentials;
pub mod token;

pub use credentials::*;
pub use token::{inspector::*, secret::*};
