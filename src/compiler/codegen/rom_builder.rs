// ROM builder - instruction word emission with label fixups
//
// The code generator emits 16-bit words here and records branch targets
// through `LabelId`s keyed into a fixup table; every fixup resolves once
// at the end of emission. Offsets never depend on emission order side
// effects.
//
// Offset law: a control-transfer immediate at word index `i` targeting
// word index `j` stores `2*j - (2*i + 2)` as a signed 16-bit value (the
// CPU's anchor is the address after the offset word).

use crate::cpu::decode::{enc_branch, enc_call, enc_jmp, Predicate};

/// An opaque label handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelId(usize);

/// Accumulates code words and resolves label fixups
pub struct RomBuilder {
    words: Vec<u16>,
    /// Bound word index per label, None until bound
    labels: Vec<Option<usize>>,
    /// (immediate word index, target label) pairs awaiting resolution
    fixups: Vec<(usize, LabelId)>,
}

impl RomBuilder {
    pub fn new() -> Self {
        RomBuilder {
            words: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    /// Emit one word; returns its word index
    pub fn emit(&mut self, word: u16) -> usize {
        self.words.push(word);
        self.words.len() - 1
    }

    /// Current word index (where the next emit lands)
    pub fn here(&self) -> usize {
        self.words.len()
    }

    /// Create an unbound label
    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(None);
        LabelId(self.labels.len() - 1)
    }

    /// Bind a label to the current position
    pub fn bind_label(&mut self, label: LabelId) {
        debug_assert!(self.labels[label.0].is_none(), "label bound twice");
        self.labels[label.0] = Some(self.words.len());
    }

    /// Emit a conditional branch to a label (offset patched at resolve)
    pub fn emit_branch(&mut self, predicate: Predicate, target: LabelId) {
        self.emit(enc_branch(predicate));
        let imm_index = self.emit(0);
        self.fixups.push((imm_index, target));
    }

    /// Emit an unconditional jump to a label
    pub fn emit_jmp(&mut self, target: LabelId) {
        self.emit(enc_jmp());
        let imm_index = self.emit(0);
        self.fixups.push((imm_index, target));
    }

    /// Emit a call to a label
    pub fn emit_call(&mut self, target: LabelId) {
        self.emit(enc_call());
        let imm_index = self.emit(0);
        self.fixups.push((imm_index, target));
    }

    /// Patch the word at `word_index` (used by resolve and by tests)
    pub fn set_immediate_at(&mut self, word_index: usize, value: u16) {
        self.words[word_index] = value;
    }

    /// Resolve every fixup
    ///
    /// Fails on unbound labels and on offsets outside the signed 16-bit
    /// range; both indicate generator bugs or a pathologically large
    /// function.
    pub fn resolve(&mut self) -> Result<(), String> {
        for &(imm_index, label) in &self.fixups {
            let target = self.labels[label.0]
                .ok_or_else(|| format!("unbound label {:?}", label))?;
            let offset = 2 * target as i64 - (2 * imm_index as i64 + 2);
            if offset < i16::MIN as i64 || offset > i16::MAX as i64 {
                return Err(format!("branch offset {} out of range", offset));
            }
            self.words[imm_index] = offset as i16 as u16;
        }
        self.fixups.clear();
        Ok(())
    }

    /// The emitted words
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Consume the builder, returning the words
    pub fn into_words(self) -> Vec<u16> {
        self.words
    }

    /// Emitted size in bytes
    pub fn byte_len(&self) -> usize {
        self.words.len() * 2
    }
}

impl Default for RomBuilder {
    fn default() -> Self {
        Self::new()
    }
}
