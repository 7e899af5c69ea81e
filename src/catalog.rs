//! Reaction catalog: token id -> color and sound rotation.
//!
//! Built once at startup from the static tables in `bands` and never resized.
//! Lookups are a linear scan in declaration order; the table holds tens of
//! entries at most.

use heapless::Vec;
use smart_leds::RGB8;

use crate::presentation::Track;
use crate::token::TokenId;

pub const MAX_ENTRIES: usize = 32;
pub const MAX_SOUNDS: usize = 3;

/// Static description of one band or wand.
#[derive(Debug, Clone, Copy)]
pub struct BandSpec<T: TokenId> {
    pub token_id: T,
    pub name: &'static str,
    pub color: RGB8,
    pub sounds: &'static [Track],
}

/// One catalog row.
#[derive(Debug, Clone)]
pub struct ReactionEntry<T: TokenId> {
    pub token_id: T,
    pub display_name: &'static str,
    pub color: RGB8,
    pub sound_sequence: Vec<Track, MAX_SOUNDS>,
    rotation_cursor: usize,
}

impl<T: TokenId> ReactionEntry<T> {
    /// Track that plays on the next successful reaction.
    pub fn current_sound(&self) -> Track {
        self.sound_sequence[self.rotation_cursor]
    }

    pub fn rotation_cursor(&self) -> usize {
        self.rotation_cursor
    }

    /// Move to the next track, wrapping at the end of the sequence.
    pub fn advance(&mut self) {
        self.rotation_cursor = (self.rotation_cursor + 1) % self.sound_sequence.len();
    }
}

pub struct Catalog<T: TokenId> {
    entries: Vec<ReactionEntry<T>, MAX_ENTRIES>,
}

impl<T: TokenId> Catalog<T> {
    /// Build the catalog from static specs.
    ///
    /// Specs with a zero id or no sounds are skipped so that every stored
    /// entry has a valid key and a non-empty rotation. Extra sounds past
    /// `MAX_SOUNDS` and extra specs past `MAX_ENTRIES` are dropped.
    pub fn from_specs(specs: &[BandSpec<T>]) -> Self {
        let mut entries = Vec::new();

        for spec in specs {
            if spec.token_id.is_none() {
                log::warn!("catalog: '{}' has id 0, skipped", spec.name);
                continue;
            }
            if spec.sounds.is_empty() {
                log::warn!("catalog: '{}' has no sounds, skipped", spec.name);
                continue;
            }
            if spec.sounds.len() > MAX_SOUNDS {
                log::warn!(
                    "catalog: '{}' lists {} sounds, keeping {}",
                    spec.name,
                    spec.sounds.len(),
                    MAX_SOUNDS
                );
            }

            let mut sound_sequence = Vec::new();
            for &track in spec.sounds.iter().take(MAX_SOUNDS) {
                let _ = sound_sequence.push(track);
            }

            let entry = ReactionEntry {
                token_id: spec.token_id,
                display_name: spec.name,
                color: spec.color,
                sound_sequence,
                rotation_cursor: 0,
            };
            if entries.push(entry).is_err() {
                log::warn!("catalog: truncated at {} entries", MAX_ENTRIES);
                break;
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first entry whose id matches exactly.
    pub fn position(&self, token_id: T) -> Option<usize> {
        if token_id.is_none() {
            return None;
        }
        self.entries.iter().position(|e| e.token_id == token_id)
    }

    pub fn find(&self, token_id: T) -> Option<&ReactionEntry<T>> {
        self.position(token_id).map(|i| &self.entries[i])
    }

    pub fn find_mut(&mut self, token_id: T) -> Option<&mut ReactionEntry<T>> {
        match self.position(token_id) {
            Some(i) => Some(&mut self.entries[i]),
            None => None,
        }
    }

    /// Matching entry together with its index.
    pub fn lookup_mut(&mut self, token_id: T) -> Option<(usize, &mut ReactionEntry<T>)> {
        let index = self.position(token_id)?;
        self.entries.get_mut(index).map(|entry| (index, entry))
    }

    pub fn get(&self, index: usize) -> Option<&ReactionEntry<T>> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReactionEntry<T>> {
        self.entries.iter()
    }
}
