//! Error types.

use crate::status;
use core::fmt::{self, Display};

/// SAE protocol errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    /// Group is not registered or is excluded by local policy, or the peer
    /// proposed a different group after the session committed to one.
    GroupNotSupported,

    /// Message is truncated or its lengths are inconsistent.
    MalformedMessage,

    /// Scalar or element lies outside its permitted range.
    OutOfRangeValue,

    /// Element is not a member of the group: a point off the curve, or a
    /// finite-field value outside the prime-order subgroup.
    InvalidElement,

    /// Peer repeated the commit scalar of an already accepted exchange.
    Replay,

    /// Password identifier is missing, unexpected or does not match.
    UnknownPasswordIdentifier,

    /// Password element or commit values could not be derived, either
    /// because the random number generator failed or because the
    /// derivation loop hit its iteration cap.
    DerivationFailure,

    /// Shared secret could not be computed: one of the commits is missing
    /// or the combined value is the identity element.
    KeyDerivationFailure,

    /// Peer's confirm value does not authenticate.
    ConfirmMismatch,

    /// Operation is not valid in the session's current state.
    InvalidState,
}

impl Error {
    /// Does this error abort the session it occurred in?
    ///
    /// Malformed or replayed messages are dropped without touching the
    /// session, and calling an operation out of order leaves it as-is.
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            Error::MalformedMessage | Error::Replay | Error::InvalidState
        )
    }

    /// IEEE 802.11 status code reported to the peer for this error.
    pub fn status_code(self) -> u16 {
        match self {
            Error::GroupNotSupported => status::FINITE_CYCLIC_GROUP_NOT_SUPPORTED,
            Error::UnknownPasswordIdentifier => status::UNKNOWN_PASSWORD_IDENTIFIER,
            _ => status::UNSPECIFIED_FAILURE,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GroupNotSupported => write!(f, "finite cyclic group not supported"),
            Error::MalformedMessage => write!(f, "malformed SAE message"),
            Error::OutOfRangeValue => write!(f, "scalar or element out of range"),
            Error::InvalidElement => write!(f, "element is not a member of the group"),
            Error::Replay => write!(f, "replayed commit scalar"),
            Error::UnknownPasswordIdentifier => write!(f, "unknown password identifier"),
            Error::DerivationFailure => write!(f, "password element derivation failed"),
            Error::KeyDerivationFailure => write!(f, "key derivation failed"),
            Error::ConfirmMismatch => write!(f, "confirm value mismatch"),
            Error::InvalidState => write!(f, "operation invalid in current state"),
        }
    }
}

impl core::error::Error for Error {}

/// Result type with the `sae` crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
