//! `Debug` helpers for types that hold large per-vertex buffers

use std::fmt;

const FIRST_N_ELEMENTS: usize = 3;

/// Collections that can print a short preview of themselves
pub trait Preview {
    type Item: fmt::Debug;

    fn total(&self) -> usize;
    fn head(&self, n: usize) -> &[Self::Item];
}

impl<T: fmt::Debug> Preview for Vec<T> {
    type Item = T;

    fn total(&self) -> usize {
        self.len()
    }

    fn head(&self, n: usize) -> &[T] {
        &self[..n.min(self.len())]
    }
}

/// Print the first few elements followed by a count of the rest
pub fn trimmed_collection_fmt<T: Preview>(n: &T, f: &mut fmt::Formatter) -> fmt::Result {
    let first = n.head(FIRST_N_ELEMENTS);
    let remaining = n.total() - first.len();

    if remaining == 0 {
        write!(f, "{first:?}")
    } else {
        write!(f, "{first:?} + {remaining} elements")
    }
}
