//! Opaque sound handles and playback categories.

use std::fmt::{Display, Formatter};

/// Playback category of a sound slot.
///
/// BGM and SE live in separate slot tables, so their handles are independent
/// numeric spaces: BGM handle `3` and SE handle `3` name different sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCategory {
    /// Background music: streamed from storage, loops by default.
    Bgm,
    /// Sound effect: decoded fully into memory, one-shot by default.
    Se,
}

impl SoundCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bgm => "bgm",
            Self::Se => "se",
        }
    }
}

impl Display for SoundCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Handle to a loaded sound.
///
/// The raw value is the 1-based index of the slot inside its category's
/// table. `0` is reserved and always means "no sound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SoundId(u32);

impl SoundId {
    /// The reserved invalid handle.
    pub const NONE: SoundId = SoundId(0);

    /// Wrap a raw integer handle coming from a host.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw integer value, suitable for handing back to a host.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// Slot index addressed by this handle, if the handle is non-zero.
    pub(crate) fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl From<u32> for SoundId {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<SoundId> for u32 {
    fn from(id: SoundId) -> Self {
        id.raw()
    }
}

impl Display for SoundId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_the_none_handle() {
        assert!(SoundId::from_raw(0).is_none());
        assert_eq!(SoundId::NONE, SoundId::default());
        assert_eq!(SoundId::NONE.index(), None);
    }

    #[test]
    fn handles_are_one_based_indices() {
        let id = SoundId::from_index(0);
        assert_eq!(id.raw(), 1);
        assert_eq!(id.index(), Some(0));
        assert_eq!(SoundId::from_raw(16).index(), Some(15));
    }
}
