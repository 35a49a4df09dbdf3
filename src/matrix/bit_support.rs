//! Named matrix of per-cell experiment bitsets
//!
//! Each cell (row entity, column entity) holds a bitvector whose width is the
//! number of experiments; bit k is set when experiment k supports the cell.
//! Storage is sparse: only cells that received at least one bit are
//! allocated, and each cell keeps a running popcount updated on every new bit
//! so per-row support counts never rescan the bitsets.
//!
//! Cells are filled in the orientation they are given. Nothing here
//! symmetrizes (i, j) and (j, i).

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use super::bitvector::BitVector;
use crate::error::{GemmaError, Result};

#[derive(Debug, Clone)]
struct SupportCell {
    bits: BitVector,
    count: u32,
}

/// Sparse bit matrix keyed by row and column names
#[derive(Debug, Clone)]
pub struct BitSupportMatrix<R, C> {
    row_names: Vec<R>,
    col_names: Vec<C>,
    row_index: HashMap<R, usize>,
    col_index: HashMap<C, usize>,
    width: usize,
    rows: Vec<BTreeMap<usize, SupportCell>>,
    total: u64,
}

fn index_axis<K: Clone + Eq + Hash + Debug>(names: &[K], axis: &str) -> Result<HashMap<K, usize>> {
    let mut index = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if index.insert(name.clone(), i).is_some() {
            return Err(GemmaError::InvalidData {
                reason: format!("Duplicate {} name {:?} in bit matrix", axis, name),
            });
        }
    }
    Ok(index)
}

impl<R, C> BitSupportMatrix<R, C>
where
    R: Clone + Eq + Hash + Debug,
    C: Clone + Eq + Hash + Debug,
{
    /// Create an empty matrix; every cell starts as a zero bitvector of `width` bits
    pub fn new(row_names: Vec<R>, col_names: Vec<C>, width: usize) -> Result<Self> {
        let row_index = index_axis(&row_names, "row")?;
        let col_index = index_axis(&col_names, "column")?;
        let rows = vec![BTreeMap::new(); row_names.len()];
        Ok(Self {
            row_names,
            col_names,
            row_index,
            col_index,
            width,
            rows,
            total: 0,
        })
    }

    pub fn rows(&self) -> usize {
        self.row_names.len()
    }

    pub fn columns(&self) -> usize {
        self.col_names.len()
    }

    /// Bits per cell
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row_name(&self, i: usize) -> &R {
        &self.row_names[i]
    }

    pub fn col_name(&self, j: usize) -> &C {
        &self.col_names[j]
    }

    pub fn row_index_of(&self, name: &R) -> Option<usize> {
        self.row_index.get(name).copied()
    }

    pub fn col_index_of(&self, name: &C) -> Option<usize> {
        self.col_index.get(name).copied()
    }

    /// Set `bit` in the cell addressed by names
    ///
    /// Returns `None` when either name is absent from its axis (callers log
    /// and continue), otherwise whether the bit was newly set.
    pub fn set(&mut self, row: &R, col: &C, bit: usize) -> Option<bool> {
        let i = self.row_index_of(row)?;
        let j = self.col_index_of(col)?;
        Some(self.set_at(i, j, bit))
    }

    /// Set `bit` in cell (i, j); returns true if it was previously clear
    pub fn set_at(&mut self, i: usize, j: usize, bit: usize) -> bool {
        assert!(j < self.columns(), "column {} out of bounds", j);
        let width = self.width;
        let cell = self.rows[i].entry(j).or_insert_with(|| SupportCell {
            bits: BitVector::zeros(width),
            count: 0,
        });
        let newly = cell.bits.set(bit);
        if newly {
            cell.count += 1;
            self.total += 1;
        }
        newly
    }

    /// Number of set bits in cell (i, j)
    pub fn cell_count(&self, i: usize, j: usize) -> u32 {
        self.rows[i].get(&j).map_or(0, |cell| cell.count)
    }

    /// Experiment bits set in cell (i, j)
    pub fn cell_bits(&self, i: usize, j: usize) -> Vec<usize> {
        self.rows[i].get(&j).map_or_else(Vec::new, |cell| cell.bits.ones().collect())
    }

    /// One popcount per column for row `i`
    pub fn row_bit_count(&self, i: usize) -> Vec<u32> {
        let mut counts = vec![0u32; self.columns()];
        for (&j, cell) in &self.rows[i] {
            counts[j] = cell.count;
        }
        counts
    }

    /// `(column, popcount)` for the non-empty cells of row `i`, in column order
    pub fn row_support(&self, i: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.rows[i].iter().map(|(&j, cell)| (j, cell.count))
    }

    /// Sum of all set bits in the matrix
    pub fn total_bit_count(&self) -> u64 {
        self.total
    }

    /// Number of cells holding at least one bit
    pub fn nonempty_cells(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genes() -> Vec<u64> {
        vec![1, 2, 3, 4]
    }

    #[test]
    fn test_total_matches_sum_of_popcounts() {
        let mut m = BitSupportMatrix::new(genes(), genes(), 5).unwrap();
        m.set(&1, &2, 0);
        m.set(&1, &2, 3);
        m.set(&3, &4, 4);
        m.set(&4, &1, 1);

        let summed: u64 = (0..m.rows())
            .map(|i| m.row_bit_count(i).iter().map(|&c| c as u64).sum::<u64>())
            .sum();
        assert_eq!(m.total_bit_count(), summed);
        assert_eq!(m.total_bit_count(), 4);
        assert_eq!(m.cell_bits(0, 1), vec![0, 3]);
    }

    #[test]
    fn test_setting_same_bit_twice_is_idempotent() {
        let mut m = BitSupportMatrix::new(genes(), genes(), 3).unwrap();
        assert_eq!(m.set(&2, &3, 1), Some(true));
        assert_eq!(m.set(&2, &3, 1), Some(false));
        assert_eq!(m.total_bit_count(), 1);
        assert_eq!(m.cell_count(1, 2), 1);
    }

    #[test]
    fn test_absent_name_reports_not_present() {
        let mut m = BitSupportMatrix::new(genes(), genes(), 2).unwrap();
        assert_eq!(m.set(&1, &99, 0), None);
        assert_eq!(m.set(&99, &1, 0), None);
        assert_eq!(m.total_bit_count(), 0);
    }

    #[test]
    fn test_fill_is_not_symmetrized() {
        let mut m = BitSupportMatrix::new(genes(), genes(), 2).unwrap();
        m.set(&1, &2, 0);
        assert_eq!(m.cell_count(0, 1), 1);
        assert_eq!(m.cell_count(1, 0), 0);
    }

    #[test]
    fn test_row_support_is_sparse_and_ordered() {
        let mut m = BitSupportMatrix::new(genes(), genes(), 4).unwrap();
        m.set(&1, &4, 0);
        m.set(&1, &2, 1);
        m.set(&1, &2, 2);
        assert_eq!(m.row_support(0).collect::<Vec<_>>(), vec![(1, 2), (3, 1)]);
        assert_eq!(m.row_bit_count(0), vec![0, 2, 0, 1]);
        assert_eq!(m.nonempty_cells(), 2);
    }

    #[test]
    fn test_duplicate_axis_names_rejected() {
        assert!(BitSupportMatrix::new(vec![1u64, 1], vec![1u64, 2], 1).is_err());
    }

    #[test]
    fn test_rectangular_axes() {
        let mut m = BitSupportMatrix::new(vec!["a", "b"], vec![10u64, 20, 30], 2).unwrap();
        assert_eq!(m.set(&"b", &30, 1), Some(true));
        assert_eq!(m.row_bit_count(1), vec![0, 0, 1]);
    }
}
