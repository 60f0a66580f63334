//! The press order: which panel channels, in which sequence.
//!
//! A [`Pattern`] is always a run of consecutive ascending channel indices
//! within 0–7, between [`Pattern::MIN_LEN`] and [`Pattern::MAX_LEN`]
//! long.  Both edit
//! operations are no-ops at their bound, so no sequence of edits can
//! produce an invalid pattern.

use heapless::Vec;
use log::{info, warn};

use crate::app::ports::PatternStore;
use crate::error::{Error, Result};

/// Highest valid panel channel index.
pub const MAX_CHANNEL: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern(Vec<u8, 8>);

impl Pattern {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 8;

    /// Validate a raw ordered list, as loaded from the store.
    pub fn from_slice(channels: &[u8]) -> Result<Self> {
        if channels.len() < Self::MIN_LEN {
            return Err(Error::Config("pattern needs at least 2 channels"));
        }
        if channels.iter().any(|&ch| ch > MAX_CHANNEL) {
            return Err(Error::Config("pattern channel out of range 0-7"));
        }
        if !channels.windows(2).all(|w| w[1] == w[0] + 1) {
            return Err(Error::Config("pattern must be consecutive ascending channels"));
        }
        Vec::from_slice(channels)
            .map(Self)
            .map_err(|()| Error::Config("pattern longer than 8 channels"))
    }

    /// Append `last + 1`.  Returns `false` (and changes nothing) when the
    /// pattern is full or already ends at channel 7.
    pub fn extend(&mut self) -> bool {
        let Some(&last) = self.0.last() else {
            return false;
        };
        if last >= MAX_CHANNEL {
            return false;
        }
        self.0.push(last + 1).is_ok()
    }

    /// Drop the last channel.  Returns `false` at the minimum length.
    pub fn shrink(&mut self) -> bool {
        if self.0.len() <= Self::MIN_LEN {
            return false;
        }
        self.0.pop().is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<u8> {
        self.0.get(idx).copied()
    }

    pub fn last(&self) -> u8 {
        self.0.last().copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, channel: u8) -> bool {
        self.0.contains(&channel)
    }

    /// Load the stored pattern, falling back to the default on any
    /// problem.  Never fails.
    pub fn load_or_default(store: &impl PatternStore) -> Self {
        match store.load_pattern() {
            Ok(Some(raw)) => match Self::from_slice(&raw) {
                Ok(p) => {
                    info!("pattern: loaded {:?}", p.as_slice());
                    p
                }
                Err(e) => {
                    warn!("pattern: stored {:?} rejected ({}), using default", raw, e);
                    Self::default()
                }
            },
            Ok(None) => {
                info!("pattern: nothing stored, using default");
                Self::default()
            }
            Err(e) => {
                warn!("pattern: load failed ({}), using default", e);
                Self::default()
            }
        }
    }
}

impl Default for Pattern {
    /// Channels 0, 1, 2, 3.
    fn default() -> Self {
        let mut v = Vec::new();
        for ch in 0..4 {
            let _ = v.push(ch);
        }
        Self(v)
    }
}
