//! Fixed-capacity slot tables mapping handles to backend sounds.

use std::path::Path;

use log::warn;

use crate::error::{BackendError, EngineError};
use crate::handle::{SoundCategory, SoundId};

/// Number of streaming (BGM) slots.
pub const BGM_CAPACITY: usize = 16;
/// Number of in-memory (SE) slots.
pub const SE_CAPACITY: usize = 64;

/// Arena of `N` sound slots for one category.
///
/// A slot is in use exactly when it holds a sound object. Handles are the
/// 1-based slot index, so a freed index is handed out again by the next
/// allocation that reaches it in the first-fit scan.
#[derive(Debug)]
pub struct SlotTable<S, const N: usize> {
    category: SoundCategory,
    slots: [Option<S>; N],
}

impl<S, const N: usize> SlotTable<S, N> {
    pub fn new(category: SoundCategory) -> Self {
        Self {
            category,
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn category(&self) -> SoundCategory {
        self.category
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Lowest free slot index.
    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Claim the first free slot for a sound produced by `instantiate`.
    ///
    /// The slot is only marked used once `instantiate` succeeds, so a failed
    /// load leaves the table untouched.
    pub fn allocate<F>(&mut self, path: &Path, instantiate: F) -> Result<SoundId, EngineError>
    where
        F: FnOnce(&Path) -> Result<S, BackendError>,
    {
        let Some(index) = self.first_free() else {
            warn!("{} slots exhausted (max={})", self.category, N);
            return Err(EngineError::CapacityExceeded {
                category: self.category,
                capacity: N,
            });
        };

        match instantiate(path) {
            Ok(sound) => {
                self.slots[index] = Some(sound);
                Ok(SoundId::from_index(index))
            }
            Err(source) => {
                warn!(
                    "failed to load {} '{}': {}",
                    self.category,
                    path.display(),
                    source
                );
                Err(EngineError::LoadFailed {
                    category: self.category,
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Sound behind a valid handle.
    pub fn get(&self, id: SoundId) -> Option<&S> {
        id.index()
            .and_then(|index| self.slots.get(index))
            .and_then(Option::as_ref)
    }

    pub fn is_valid(&self, id: SoundId) -> bool {
        self.get(id).is_some()
    }

    /// Validate a handle, reporting why it was rejected.
    pub fn validate(&self, id: SoundId) -> Result<&S, EngineError> {
        self.get(id).ok_or(EngineError::InvalidHandle {
            category: self.category,
            id,
        })
    }

    /// Empty the slot behind `id`, returning its sound for destruction.
    pub fn release(&mut self, id: SoundId) -> Option<S> {
        id.index()
            .and_then(|index| self.slots.get_mut(index))
            .and_then(Option::take)
    }

    /// Handles of every slot currently in use, in index order.
    pub fn live_ids(&self) -> impl Iterator<Item = SoundId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| SoundId::from_index(index))
    }

    /// Sounds of every slot currently in use, in index order.
    pub fn iter_live(&self) -> impl Iterator<Item = &S> + '_ {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Empty every slot, yielding the sounds in index order.
    pub fn drain(&mut self) -> impl Iterator<Item = S> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}
