//! Fixed-width bitvector over u64 blocks

/// A bitvector of fixed length, one bit per expression experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVector {
    blocks: Vec<u64>,
    len: usize,
}

impl BitVector {
    /// All-zero bitvector of `len` bits
    pub fn zeros(len: usize) -> Self {
        Self {
            blocks: vec![0u64; (len + 63) / 64],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set bit `i`; returns true if it was previously clear
    ///
    /// # Panics
    ///
    /// Panics if `i >= len`.
    pub fn set(&mut self, i: usize) -> bool {
        assert!(i < self.len, "bit index {} out of bounds for width {}", i, self.len);
        let mask = 1u64 << (i % 64);
        let block = &mut self.blocks[i / 64];
        let was_clear = *block & mask == 0;
        *block |= mask;
        was_clear
    }

    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit index {} out of bounds for width {}", i, self.len);
        (self.blocks[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Population count
    pub fn count_ones(&self) -> u32 {
        self.blocks.iter().map(|b| b.count_ones()).sum()
    }

    /// Indices of set bits in increasing order
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().enumerate().flat_map(|(b, &block)| {
            let mut word = block;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let bit = word.trailing_zeros() as usize;
                word &= word - 1;
                Some(b * 64 + bit)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_is_idempotent() {
        let mut bits = BitVector::zeros(130);
        assert!(bits.set(0));
        assert!(bits.set(129));
        assert!(!bits.set(129));
        assert_eq!(bits.count_ones(), 2);
        assert!(bits.get(129));
        assert!(!bits.get(64));
    }

    #[test]
    fn test_ones_iterates_across_blocks() {
        let mut bits = BitVector::zeros(200);
        for i in [3, 63, 64, 150] {
            bits.set(i);
        }
        assert_eq!(bits.ones().collect::<Vec<_>>(), vec![3, 63, 64, 150]);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_bit_panics() {
        let mut bits = BitVector::zeros(3);
        bits.set(3);
    }
}
