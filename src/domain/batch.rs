//! Partitioning of an ordered record sequence into fixed-size batches.
//!
//! A [`BatchPlan`] borrows the input and produces [`Batch`]es lazily. The plan
//! is restartable: every call to [`BatchPlan::iter`] yields a fresh partition
//! from the start, so the same plan can be inspected, logged and then run.

use std::iter::FusedIterator;

use super::record::Record;
use crate::error::{IngestError, Result};

/// A contiguous, order-preserving slice of the input.
///
/// Every batch of a plan has exactly `batch_size` records except possibly the
/// last one.
#[derive(Debug)]
pub struct Batch<'a, T = Record> {
    number: usize,
    offset: usize,
    records: &'a [T],
}

impl<'a, T> Batch<'a, T> {
    /// 1-based position of this batch within its run.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Index of the first record of this batch within the full input.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn records(&self) -> &'a [T] {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Manual impls: a batch is a borrowed view, copying it never copies records.
impl<T> Clone for Batch<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Batch<'_, T> {}

/// Partition `records` into batches of `batch_size`.
///
/// Fails with [`IngestError::Configuration`] when `batch_size` is zero. No
/// other work happens here; batches are produced on iteration.
pub fn batch<T>(records: &[T], batch_size: usize) -> Result<BatchPlan<'_, T>> {
    if batch_size == 0 {
        return Err(IngestError::config("batch_size must be at least 1"));
    }

    Ok(BatchPlan {
        records,
        batch_size,
        first_number: 1,
        first_offset: 0,
    })
}

/// Lazy, restartable partition of a record slice.
#[derive(Debug)]
pub struct BatchPlan<'a, T = Record> {
    records: &'a [T],
    batch_size: usize,
    first_number: usize,
    first_offset: usize,
}

impl<'a, T> BatchPlan<'a, T> {
    /// Start a fresh pass over the batches.
    pub fn iter(&self) -> Batches<'a, T> {
        Batches {
            chunks: self.records.chunks(self.batch_size),
            next_number: self.first_number,
            next_offset: self.first_offset,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches, `ceil(total_records / batch_size)`.
    pub fn len(&self) -> usize {
        self.records.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records covered by this plan.
    pub fn total_records(&self) -> usize {
        self.records.len()
    }

    /// The plan for everything after the first `count` batches.
    ///
    /// Batch numbers and offsets continue from this plan, so results of a
    /// follow-up run line up with the run that halted.
    pub fn skip_batches(&self, count: usize) -> BatchPlan<'a, T> {
        let skipped = count.min(self.len());
        let start = (skipped * self.batch_size).min(self.records.len());

        BatchPlan {
            records: &self.records[start..],
            batch_size: self.batch_size,
            first_number: self.first_number + skipped,
            first_offset: self.first_offset + start,
        }
    }
}

impl<T> Clone for BatchPlan<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BatchPlan<'_, T> {}

impl<'a, T> IntoIterator for &BatchPlan<'a, T> {
    type Item = Batch<'a, T>;
    type IntoIter = Batches<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the batches of a [`BatchPlan`].
#[derive(Debug)]
pub struct Batches<'a, T> {
    chunks: std::slice::Chunks<'a, T>,
    next_number: usize,
    next_offset: usize,
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = Batch<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let records = self.chunks.next()?;
        let batch = Batch {
            number: self.next_number,
            offset: self.next_offset,
            records,
        };
        self.next_number += 1;
        self.next_offset += records.len();
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T> ExactSizeIterator for Batches<'_, T> {}

impl<T> FusedIterator for Batches<'_, T> {}
