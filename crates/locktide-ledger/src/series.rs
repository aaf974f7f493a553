//! Sparse epoch-indexed series.
//!
//! An [`EpochSeries`] maps epoch indices to amounts with an implicit zero
//! everywhere else. Only non-zero points are stored, so there is no upper
//! horizon and range sums cost O(stored points in range).

use std::collections::BTreeMap;
use std::ops::RangeBounds;

use locktide_core::types::{Amount, Epoch};

/// Epoch → amount map defaulting to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct EpochSeries {
    points: BTreeMap<Epoch, Amount>,
}

impl EpochSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at `epoch` (zero if never written).
    pub fn get(&self, epoch: Epoch) -> Amount {
        *self.points.get(&epoch).unwrap_or(&0)
    }

    /// Overwrite the value at `epoch`. Writing zero drops the point.
    pub fn set(&mut self, epoch: Epoch, value: Amount) {
        if value == 0 {
            self.points.remove(&epoch);
        } else {
            self.points.insert(epoch, value);
        }
    }

    /// `get(epoch) + delta`, or `None` on overflow. Does not mutate.
    pub fn checked_added(&self, epoch: Epoch, delta: Amount) -> Option<Amount> {
        self.get(epoch).checked_add(delta)
    }

    /// Sum of all points whose epoch falls in `range`, or `None` on overflow.
    pub fn sum_range<R: RangeBounds<Epoch>>(&self, range: R) -> Option<Amount> {
        self.points
            .range(range)
            .try_fold(0u128, |acc, (_, v)| acc.checked_add(*v))
    }

    /// Non-zero points whose epoch falls in `range`, in epoch order.
    pub fn iter_range<R: RangeBounds<Epoch>>(
        &self,
        range: R,
    ) -> impl Iterator<Item = (Epoch, Amount)> + '_ {
        self.points.range(range).map(|(e, v)| (*e, *v))
    }

    /// Number of stored (non-zero) points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether every epoch reads zero.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
