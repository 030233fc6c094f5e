// Host Input Set
use ndarray::{Array2, ArrayView1, ArrayView2, CowArray, Ix2};

use crate::engine::error::{Result, SumError};

/// K host vectors of equal length N, stored as a K x N array (one row per vector).
/// Either borrows the caller's array or owns a copy.
#[derive(Debug, Clone)]
pub struct InputSet<'a> {
    rows: CowArray<'a, i32, Ix2>,
}

impl InputSet<'static> {
    /// Build from individual vectors. Rejects an empty list and ragged lengths.
    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| SumError::shape("at least one input vector is required"))?;
        let len = first.as_ref().len();

        let mut flat = Vec::with_capacity(rows.len() * len);
        for (k, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != len {
                return Err(SumError::shape(format!(
                    "vector {k} has length {} but vector 0 has length {len}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }

        let array = Array2::from_shape_vec((rows.len(), len), flat)
            .map_err(|e| SumError::shape(e.to_string()))?;
        Self::from_array(array)
    }

    /// The K=2 form
    pub fn pair(a: &[i32], b: &[i32]) -> Result<Self> {
        Self::from_rows(&[a, b])
    }

    pub fn from_array(array: Array2<i32>) -> Result<Self> {
        check_rows(array.nrows())?;
        Ok(Self {
            rows: CowArray::from(array),
        })
    }
}

impl<'a> InputSet<'a> {
    /// Borrow an existing K x N array without copying.
    pub fn from_view(view: ArrayView2<'a, i32>) -> Result<Self> {
        check_rows(view.nrows())?;
        Ok(Self {
            rows: CowArray::from(view),
        })
    }

    /// K
    pub fn num_vectors(&self) -> usize {
        self.rows.nrows()
    }

    /// N
    pub fn len(&self) -> usize {
        self.rows.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, i32>> {
        self.rows.rows().into_iter()
    }

    /// Serial reference result: column sums with the same wrapping arithmetic
    /// the kernels use.
    pub fn column_sums(&self) -> Vec<i32> {
        let mut totals = vec![0i32; self.len()];
        for row in self.rows() {
            for (total, &value) in totals.iter_mut().zip(row.iter()) {
                *total = total.wrapping_add(value);
            }
        }
        totals
    }
}

fn check_rows(k: usize) -> Result<()> {
    if k == 0 {
        return Err(SumError::shape("at least one input vector is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_keep_their_order() {
        let set = InputSet::from_rows(&[vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
        assert_eq!(set.num_vectors(), 3);
        assert_eq!(set.len(), 2);
        let rows: Vec<Vec<i32>> = set.rows().map(|r| r.to_vec()).collect();
        assert_eq!(rows, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = InputSet::from_rows(&[vec![1, 2, 3], vec![4]]).unwrap_err();
        assert!(matches!(err, SumError::Shape(_)));
    }

    #[test]
    fn no_rows_is_rejected() {
        let rows: [Vec<i32>; 0] = [];
        assert!(matches!(InputSet::from_rows(&rows), Err(SumError::Shape(_))));
        assert!(matches!(
            InputSet::from_array(Array2::zeros((0, 4))),
            Err(SumError::Shape(_))
        ));
    }

    #[test]
    fn empty_vectors_are_allowed() {
        let set = InputSet::from_rows(&[Vec::<i32>::new(), Vec::new()]).unwrap();
        assert!(set.is_empty());
        assert!(set.column_sums().is_empty());
    }

    #[test]
    fn views_are_borrowed() {
        let data = array![[1, 2, 3], [10, 20, 30]];
        let set = InputSet::from_view(data.view()).unwrap();
        assert_eq!(set.column_sums(), vec![11, 22, 33]);
    }

    #[test]
    fn pair_is_two_rows() {
        let set = InputSet::pair(&[1, 2], &[3, 4]).unwrap();
        assert_eq!(set.num_vectors(), 2);
        assert_eq!(set.column_sums(), vec![4, 6]);
    }
}
