//! Integer-backed bit containers

use serde::{Deserialize, Serialize};

use crate::Bit;

/// Fixed-width bit container backed by a `usize`, with bit `0` as the LSB
#[derive(Clone, Eq, PartialEq, Hash, Debug, Copy, Default, Deserialize, Serialize)]
pub struct BitField(pub usize);

impl BitField {
    /// Returns whether bit `i` is set.
    #[must_use]
    pub fn test(self, i: usize) -> bool {
        (self.0 >> i) & 1 == 1
    }

    /// Sets bit `i` to given value.
    pub fn set(&mut self, i: usize, value: bool) {
        if value {
            self.0 |= 1 << i;
        } else {
            self.0 &= !(1 << i);
        }
    }

    /// Returns number of set bits.
    #[must_use]
    pub fn weight(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns XOR of all bits.
    #[must_use]
    pub fn parity(self) -> Bit {
        Bit::from(self.0.count_ones() % 2 == 1)
    }

    /// Returns field whose bit `i` is `bits[i]`.
    #[must_use]
    pub fn from_bits(bits: &[Bit]) -> Self {
        Self(
            bits.iter()
                .enumerate()
                .fold(0, |acc, (i, &b)| acc | (usize::from(b) << i)),
        )
    }

    /// Writes the `bits.len()` least significant bits into `bits`.
    pub fn write_bits(self, bits: &mut [Bit]) {
        for (i, b) in bits.iter_mut().enumerate() {
            *b = Bit::from(self.test(i));
        }
    }
}

/// Row of a dense matrix over GF(2)
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct BitRow {
    words: Vec<u64>,
}

impl BitRow {
    /// Returns all-zero row with given number of columns.
    pub(crate) fn zeros(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    pub(crate) fn test(&self, i: usize) -> bool {
        (self.words[i / 64] >> (i % 64)) & 1 == 1
    }

    pub(crate) fn set(&mut self, i: usize) {
        self.words[i / 64] |= 1 << (i % 64);
    }

    /// Adds (over GF(2)) another row of the same length into this one.
    pub(crate) fn xor_assign(&mut self, other: &BitRow) {
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w ^= o;
        }
    }
}
