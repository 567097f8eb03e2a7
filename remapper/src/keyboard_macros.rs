//! Macro store: `NMACROS` slots, each a list of chords pressed one after another.
//!
//! The store is shared between the config protocol, the persisted blob codec and the
//! macro player, so every operation holds the lock for its whole traversal.
//!
//! Persisted table layout, for each slot in order:
//! `chord_count:u8, chord_count × (usage_count:u8, usage_count × usage:u32)`

use core::cell::RefCell;

use byteorder::{ByteOrder, LittleEndian};
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use remapper_types::protocol::{CHORD_SEPARATOR, MACRO_MAX_CHORD_USAGES, MACRO_MAX_CHORDS, NMACROS};

use crate::RawMutex;

/// Usages pressed together
pub type Chord = Vec<u32, MACRO_MAX_CHORD_USAGES>;
/// Chords played in order
pub type MacroSlot = Vec<Chord, MACRO_MAX_CHORDS>;

type Slots = [MacroSlot; NMACROS];

const USAGE_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacroError {
    /// The table runs past the end of the buffer
    Truncated,
    /// A chord or usage count exceeds the slot capacity
    Overflow,
}

/// Result of [`MacroStore::paginate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageFill {
    /// Number of items written to the output
    pub count: usize,
    /// Nothing follows the returned items
    pub exhausted: bool,
}

pub struct MacroStore {
    slots: Mutex<RawMutex, RefCell<Slots>>,
}

impl Default for MacroStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroStore {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([const { Vec::new() }; NMACROS])),
        }
    }

    pub fn clear_all(&self) {
        self.slots.lock(|slots| {
            slots.borrow_mut().iter_mut().for_each(|slot| slot.clear());
        });
    }

    pub fn clear_slot(&self, slot: usize) {
        self.slots.lock(|slots| match slots.borrow_mut().get_mut(slot) {
            Some(s) => s.clear(),
            None => warn!("Clearing invalid macro slot {}", slot),
        });
    }

    /// Replace the content of one slot.
    pub fn set_slot<C: AsRef<[u32]>>(&self, slot: usize, chords: &[C]) -> Result<(), MacroError> {
        let mut staged = MacroSlot::new();
        for chord in chords {
            let chord = Chord::from_slice(chord.as_ref()).map_err(|_| MacroError::Overflow)?;
            staged.push(chord).map_err(|_| MacroError::Overflow)?;
        }
        self.slots.lock(|slots| match slots.borrow_mut().get_mut(slot) {
            Some(s) => {
                *s = staged;
                Ok(())
            }
            None => Err(MacroError::Overflow),
        })
    }

    /// Run `f` on the chords of a slot while holding the lock.
    ///
    /// Returns `None` for an invalid slot.
    pub fn with_slot<R>(&self, slot: usize, f: impl FnOnce(&[Chord]) -> R) -> Option<R> {
        self.slots.lock(|slots| slots.borrow().get(slot).map(|s| f(s.as_slice())))
    }

    /// Append usages to a slot. An empty slot gets its first chord,
    /// [`CHORD_SEPARATOR`] starts a new chord, anything else extends the last chord.
    pub fn append(&self, slot: usize, usages: &[u32]) {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let Some(chords) = slots.get_mut(slot) else {
                warn!("Appending to invalid macro slot {}", slot);
                return;
            };
            if chords.is_empty() {
                // Capacity is never zero
                let _ = chords.push(Chord::new());
            }
            for &usage in usages {
                if usage == CHORD_SEPARATOR {
                    if chords.push(Chord::new()).is_err() {
                        warn!("Macro slot {} is full, dropping chord", slot);
                    }
                } else if let Some(chord) = chords.last_mut() {
                    if chord.push(usage).is_err() {
                        warn!("Macro chord is full, dropping usage {} in slot {}", usage, slot);
                    }
                }
            }
        })
    }

    /// Copy a page of the flattened slot, starting at `start`, into `out`.
    ///
    /// The flattened form is the chords joined by [`CHORD_SEPARATOR`] with no trailing separator.
    pub fn paginate(&self, slot: usize, start: usize, out: &mut [u32]) -> PageFill {
        self.slots.lock(|slots| {
            let slots = slots.borrow();
            let Some(chords) = slots.get(slot) else {
                return PageFill {
                    count: 0,
                    exhausted: true,
                };
            };
            let flat_len = flattened_len(chords);
            let flat = chords.iter().enumerate().flat_map(|(i, chord)| {
                let separator = if i > 0 { Some(CHORD_SEPARATOR) } else { None };
                separator.into_iter().chain(chord.iter().copied())
            });
            let mut count = 0;
            for (dst, usage) in out.iter_mut().zip(flat.skip(start)) {
                *dst = usage;
                count += 1;
            }
            PageFill {
                count,
                exhausted: start.saturating_add(count) >= flat_len,
            }
        })
    }

    /// Check a persisted macro table without applying it.
    ///
    /// Returns the number of bytes the table occupies.
    pub fn validate_table(bytes: &[u8]) -> Result<usize, MacroError> {
        walk_table(bytes, |_, _| ())
    }

    /// Replace every slot with the persisted macro table at the start of `bytes`.
    ///
    /// Nothing changes if the table is malformed. Returns the number of bytes consumed.
    pub fn bulk_load(&self, bytes: &[u8]) -> Result<usize, MacroError> {
        Self::validate_table(bytes)?;
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            slots.iter_mut().for_each(|slot| slot.clear());
            walk_table(bytes, |slot, usages| {
                let mut chord = Chord::new();
                for usage in usages.chunks_exact(USAGE_SIZE) {
                    // Counts were validated above
                    let _ = chord.push(LittleEndian::read_u32(usage));
                }
                let _ = slots[slot].push(chord);
            })
        })
    }

    /// Write the macro table into `out`, returns the number of bytes written.
    pub fn bulk_store(&self, out: &mut [u8]) -> Result<usize, MacroError> {
        self.slots.lock(|slots| {
            let slots = slots.borrow();
            let mut pos = 0;
            for chords in slots.iter() {
                *out.get_mut(pos).ok_or(MacroError::Truncated)? = chords.len() as u8;
                pos += 1;
                for chord in chords.iter() {
                    let end = pos + 1 + chord.len() * USAGE_SIZE;
                    let dst = out.get_mut(pos..end).ok_or(MacroError::Truncated)?;
                    dst[0] = chord.len() as u8;
                    for (chunk, usage) in dst[1..].chunks_exact_mut(USAGE_SIZE).zip(chord.iter()) {
                        LittleEndian::write_u32(chunk, *usage);
                    }
                    pos = end;
                }
            }
            Ok(pos)
        })
    }
}

fn flattened_len(chords: &[Chord]) -> usize {
    chords.iter().map(|c| c.len()).sum::<usize>() + chords.len().saturating_sub(1)
}

/// Walk a persisted macro table, calling `on_chord(slot, usage_bytes)` for every chord.
fn walk_table(bytes: &[u8], mut on_chord: impl FnMut(usize, &[u8])) -> Result<usize, MacroError> {
    let mut pos = 0;
    for slot in 0..NMACROS {
        let chord_count = *bytes.get(pos).ok_or(MacroError::Truncated)? as usize;
        pos += 1;
        if chord_count > MACRO_MAX_CHORDS {
            return Err(MacroError::Overflow);
        }
        for _ in 0..chord_count {
            let usage_count = *bytes.get(pos).ok_or(MacroError::Truncated)? as usize;
            pos += 1;
            if usage_count > MACRO_MAX_CHORD_USAGES {
                return Err(MacroError::Overflow);
            }
            let end = pos + usage_count * USAGE_SIZE;
            let usages = bytes.get(pos..end).ok_or(MacroError::Truncated)?;
            on_chord(slot, usages);
            pos = end;
        }
    }
    Ok(pos)
}
