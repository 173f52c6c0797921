//! IEEE 802.11 status codes used by SAE authentication frames.

/// Successful.
pub const SUCCESS: u16 = 0;

/// Unspecified failure.
pub const UNSPECIFIED_FAILURE: u16 = 1;

/// Anti-clogging token required; the frame body carries the token.
pub const ANTI_CLOGGING_TOKEN_REQUIRED: u16 = 76;

/// Finite cyclic group not supported.
pub const FINITE_CYCLIC_GROUP_NOT_SUPPORTED: u16 = 77;

/// Unknown password identifier.
pub const UNKNOWN_PASSWORD_IDENTIFIER: u16 = 123;
