//! Local SAE policy.

use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Groups enabled when none are configured.
pub const DEFAULT_GROUPS: [u16; 1] = [19];

/// Open sessions tolerated before anti-clogging tokens are demanded.
pub const DEFAULT_ANTI_CLOGGING_THRESHOLD: usize = 5;

/// Local SAE configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Enabled group ids in order of preference.
    pub groups: Vec<u16>,

    /// Accept groups considered too weak for production use.
    ///
    /// Only for interoperability testing.
    pub allow_unsuitable_groups: bool,

    /// Number of sessions in progress at which a responder starts
    /// demanding anti-clogging tokens. Zero demands them always.
    pub anti_clogging_threshold: usize,
}

impl Config {
    /// Replace the enabled groups.
    pub fn with_groups(mut self, groups: impl Into<Vec<u16>>) -> Self {
        self.groups = groups.into();
        self
    }

    /// Allow or forbid groups considered too weak for production use.
    pub fn with_unsuitable_groups(mut self, allow: bool) -> Self {
        self.allow_unsuitable_groups = allow;
        self
    }

    /// Set the anti-clogging threshold.
    pub fn with_anti_clogging_threshold(mut self, threshold: usize) -> Self {
        self.anti_clogging_threshold = threshold;
        self
    }

    /// Most preferred enabled group.
    pub fn preferred_group(&self) -> Option<u16> {
        self.groups.first().copied()
    }

    /// Is `id` among the enabled groups?
    pub fn is_enabled(&self, id: u16) -> bool {
        self.groups.contains(&id)
    }

    /// Should a responder with `in_progress` unfinished sessions demand an
    /// anti-clogging token before processing another commit?
    pub fn requires_token(&self, in_progress: usize) -> bool {
        in_progress >= self.anti_clogging_threshold
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groups: DEFAULT_GROUPS.to_vec(),
            allow_unsuitable_groups: false,
            anti_clogging_threshold: DEFAULT_ANTI_CLOGGING_THRESHOLD,
        }
    }
}
