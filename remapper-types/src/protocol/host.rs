//! Host side helpers: splitting macros into APPEND_TO_MACRO commands, reassembling
//! GET_MACRO pages and expanding RLE usage lists.

use heapless::Vec;

use super::command::{AppendToMacro, Command, MacroPage};
use super::records::UsageRle;
use super::{CHORD_SEPARATOR, MACRO_ITEMS_IN_PACKET, MACRO_MAX_CHORD_USAGES, MACRO_MAX_CHORDS};

/// Longest flattened macro: every chord full, separated by [`CHORD_SEPARATOR`]
pub const MACRO_MAX_FLAT_LEN: usize = MACRO_MAX_CHORDS * (MACRO_MAX_CHORD_USAGES + 1);

/// A chord as the host sees it
pub type Chord = Vec<u32, MACRO_MAX_CHORD_USAGES>;

/// Iterator over the APPEND_TO_MACRO commands uploading one macro slot.
pub struct MacroAppendCommands {
    slot: u8,
    flat: Vec<u32, MACRO_MAX_FLAT_LEN>,
    pos: usize,
}

impl Iterator for MacroAppendCommands {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.flat.len() {
            return None;
        }
        let end = (self.pos + MACRO_ITEMS_IN_PACKET).min(self.flat.len());
        let usages = Vec::from_slice(&self.flat[self.pos..end]).ok()?;
        self.pos = end;
        Some(Command::AppendToMacro(AppendToMacro { slot: self.slot, usages }))
    }
}

/// Split a macro into APPEND_TO_MACRO commands.
///
/// Chords are joined with [`CHORD_SEPARATOR`] and the result is cut into packets
/// of [`MACRO_ITEMS_IN_PACKET`]. Returns `None` if the macro does not fit in a slot.
/// The slot should be cleared with CLEAR_MACROS before uploading.
pub fn macro_append_commands<C: AsRef<[u32]>>(slot: u8, chords: &[C]) -> Option<MacroAppendCommands> {
    if chords.len() > MACRO_MAX_CHORDS {
        return None;
    }
    let mut flat = Vec::new();
    for (i, chord) in chords.iter().enumerate() {
        let chord = chord.as_ref();
        if chord.len() > MACRO_MAX_CHORD_USAGES || chord.contains(&CHORD_SEPARATOR) {
            return None;
        }
        if i > 0 {
            flat.push(CHORD_SEPARATOR).ok()?;
        }
        flat.extend_from_slice(chord).ok()?;
    }
    Some(MacroAppendCommands { slot, flat, pos: 0 })
}

/// Rebuilds a macro from successive GET_MACRO replies.
///
/// ```ignore
/// let mut reassembler = MacroReassembler::new();
/// while !reassembler.is_complete() {
///     let reply = request(Command::GetMacro { slot, item: reassembler.next_item() });
///     reassembler.push_page(&MacroPage::decode_reply(&reply)?);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MacroReassembler {
    chords: Vec<Chord, MACRO_MAX_CHORDS>,
    next_item: u32,
    complete: bool,
}

impl MacroReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Item index to request next
    pub fn next_item(&self) -> u32 {
        self.next_item
    }

    /// A page shorter than a full packet ends the macro
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feed the next page. Usages past the slot capacity are dropped.
    pub fn push_page(&mut self, page: &MacroPage) {
        if self.complete {
            return;
        }
        if self.chords.is_empty() && !page.items.is_empty() {
            let _ = self.chords.push(Chord::new());
        }
        for usage in page.items.iter() {
            if *usage == CHORD_SEPARATOR {
                let _ = self.chords.push(Chord::new());
            } else if let Some(chord) = self.chords.last_mut() {
                let _ = chord.push(*usage);
            }
        }
        self.next_item += page.items.len() as u32;
        if page.items.len() < MACRO_ITEMS_IN_PACKET {
            self.complete = true;
        }
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn into_chords(self) -> Vec<Chord, MACRO_MAX_CHORDS> {
        self.chords
    }
}

/// Expand RLE usage entries into individual usages, skipping unused (zero usage) entries
pub fn expand_usage_rle(entries: &[UsageRle]) -> impl Iterator<Item = u32> + '_ {
    entries
        .iter()
        .filter(|entry| entry.usage != 0)
        .flat_map(|entry| (0..entry.count).map(move |i| entry.usage.wrapping_add(i)))
}
