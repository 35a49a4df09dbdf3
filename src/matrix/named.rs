//! Dense f64 matrices with named axes
//!
//! Missing cells are NaN throughout.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

use crate::error::{GemmaError, Result};

/// Name to dense-index lookup for one matrix axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisNames<K: Eq + Hash> {
    names: Vec<K>,
    index: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash + Debug> AxisNames<K> {
    pub fn new(names: Vec<K>) -> Result<Self> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(GemmaError::InvalidData {
                    reason: format!("Duplicate axis name {:?}", name),
                });
            }
        }
        Ok(Self { names, index })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[K] {
        &self.names
    }

    pub fn name(&self, i: usize) -> &K {
        &self.names[i]
    }

    pub fn index_of(&self, name: &K) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn subset(&self, keep: &[usize]) -> Self {
        let names: Vec<K> = keep.iter().map(|&i| self.names[i].clone()).collect();
        let index = names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        Self { names, index }
    }
}

/// Two-dimensional matrix with row and column names
#[derive(Debug, Clone)]
pub struct NamedMatrix2<R: Eq + Hash, C: Eq + Hash> {
    values: Array2<f64>,
    rows: AxisNames<R>,
    cols: AxisNames<C>,
}

impl<R, C> NamedMatrix2<R, C>
where
    R: Clone + Eq + Hash + Debug,
    C: Clone + Eq + Hash + Debug,
{
    /// All-NaN matrix
    pub fn new(row_names: Vec<R>, col_names: Vec<C>) -> Result<Self> {
        let rows = AxisNames::new(row_names)?;
        let cols = AxisNames::new(col_names)?;
        let values = Array2::from_elem((rows.len(), cols.len()), f64::NAN);
        Ok(Self { values, rows, cols })
    }

    pub fn from_values(values: Array2<f64>, row_names: Vec<R>, col_names: Vec<C>) -> Result<Self> {
        let rows = AxisNames::new(row_names)?;
        let cols = AxisNames::new(col_names)?;
        if values.dim() != (rows.len(), cols.len()) {
            return Err(GemmaError::DimensionMismatch {
                expected: format!("{}x{}", rows.len(), cols.len()),
                got: format!("{}x{}", values.nrows(), values.ncols()),
            });
        }
        Ok(Self { values, rows, cols })
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn row_names(&self) -> &[R] {
        self.rows.names()
    }

    pub fn col_names(&self) -> &[C] {
        self.cols.names()
    }

    pub fn row_index(&self, name: &R) -> Option<usize> {
        self.rows.index_of(name)
    }

    pub fn col_index(&self, name: &C) -> Option<usize> {
        self.cols.index_of(name)
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[[i, j]] = value;
    }

    /// Value by names, `None` if either name is absent
    pub fn get_by_name(&self, row: &R, col: &C) -> Option<f64> {
        Some(self.values[[self.rows.index_of(row)?, self.cols.index_of(col)?]])
    }
}

/// Three-dimensional matrix indexed (slice, row, column)
///
/// In the coexpression engine slices are experiments and rows/columns are
/// query and target genes.
#[derive(Debug, Clone)]
pub struct NamedMatrix3<S: Eq + Hash, R: Eq + Hash, C: Eq + Hash> {
    values: Array3<f64>,
    slices: AxisNames<S>,
    rows: AxisNames<R>,
    cols: AxisNames<C>,
}

impl<S, R, C> NamedMatrix3<S, R, C>
where
    S: Clone + Eq + Hash + Debug,
    R: Clone + Eq + Hash + Debug,
    C: Clone + Eq + Hash + Debug,
{
    /// All-NaN matrix
    pub fn new(slice_names: Vec<S>, row_names: Vec<R>, col_names: Vec<C>) -> Result<Self> {
        let slices = AxisNames::new(slice_names)?;
        let rows = AxisNames::new(row_names)?;
        let cols = AxisNames::new(col_names)?;
        let values = Array3::from_elem((slices.len(), rows.len(), cols.len()), f64::NAN);
        Ok(Self {
            values,
            slices,
            rows,
            cols,
        })
    }

    pub fn n_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn slice_names(&self) -> &[S] {
        self.slices.names()
    }

    pub fn row_names(&self) -> &[R] {
        self.rows.names()
    }

    pub fn col_names(&self) -> &[C] {
        self.cols.names()
    }

    pub fn slice_index(&self, name: &S) -> Option<usize> {
        self.slices.index_of(name)
    }

    pub fn get(&self, s: usize, i: usize, j: usize) -> f64 {
        self.values[[s, i, j]]
    }

    pub fn set(&mut self, s: usize, i: usize, j: usize, value: f64) {
        self.values[[s, i, j]] = value;
    }

    /// Row x column plane for one slice
    pub fn slice(&self, s: usize) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(0), s)
    }

    /// Values across all slices for cell (i, j)
    pub fn lane(&self, i: usize, j: usize) -> ArrayView1<'_, f64> {
        self.values.slice(ndarray::s![.., i, j])
    }

    /// Drop slices that hold no non-missing value
    pub fn retain_nonempty_slices(&self) -> Self {
        let keep: Vec<usize> = (0..self.n_slices())
            .filter(|&s| self.slice(s).iter().any(|v| !v.is_nan()))
            .collect();
        self.select_slices(&keep)
    }

    /// Keep only the slices at `keep`, in that order
    pub fn select_slices(&self, keep: &[usize]) -> Self {
        Self {
            values: self.values.select(Axis(0), keep),
            slices: self.slices.subset(keep),
            rows: self.rows.clone(),
            cols: self.cols.clone(),
        }
    }

    /// Empty 2-D matrix over this matrix's row and column axes
    pub fn plane_like(&self) -> NamedMatrix2<R, C> {
        NamedMatrix2 {
            values: Array2::from_elem((self.nrows(), self.ncols()), f64::NAN),
            rows: self.rows.clone(),
            cols: self.cols.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_matrix_is_all_missing() {
        let m: NamedMatrix2<u64, u64> = NamedMatrix2::new(vec![1, 2], vec![3]).unwrap();
        assert!(m.values().iter().all(|v| v.is_nan()));
        assert_eq!(m.get_by_name(&2, &3).map(f64::is_nan), Some(true));
        assert_eq!(m.get_by_name(&9, &3), None);
    }

    #[test]
    fn test_from_values_checks_shape() {
        let err = NamedMatrix2::from_values(array![[1.0, 2.0]], vec!["a"], vec!["x"]).unwrap_err();
        assert!(matches!(err, GemmaError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_lane_reads_across_slices() {
        let mut m = NamedMatrix3::new(vec![10u64, 20], vec![1u64], vec![2u64, 3]).unwrap();
        m.set(0, 0, 1, 0.25);
        m.set(1, 0, 1, -0.5);
        let lane: Vec<f64> = m.lane(0, 1).to_vec();
        assert_eq!(lane, vec![0.25, -0.5]);
    }

    #[test]
    fn test_retain_nonempty_slices_drops_all_missing() {
        let mut m = NamedMatrix3::new(vec!["ee1", "ee2", "ee3"], vec![1u64], vec![2u64]).unwrap();
        m.set(0, 0, 0, 0.1);
        m.set(2, 0, 0, 0.3);
        let filtered = m.retain_nonempty_slices();
        assert_eq!(filtered.slice_names(), &["ee1", "ee3"]);
        assert_eq!(filtered.get(1, 0, 0), 0.3);
        assert_eq!(filtered.slice_index(&"ee3"), Some(1));
    }
}
