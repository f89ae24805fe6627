use std::{iter::Enumerate, marker::PhantomData};

use super::{typed_usize::Behave, TypedUsize};

/// Pairs every item with its position as a [TypedUsize].
pub struct VecMapIter<K, I>
where
    K: Behave,
{
    inner: Enumerate<I>,
    index_kind: PhantomData<K>,
}

impl<K, I> VecMapIter<K, I>
where
    K: Behave,
    I: Iterator,
{
    pub fn new(iter: I) -> Self {
        Self {
            inner: iter.enumerate(),
            index_kind: PhantomData,
        }
    }
}

impl<K, I> Iterator for VecMapIter<K, I>
where
    K: Behave,
    I: Iterator,
{
    type Item = (TypedUsize<K>, I::Item);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(index, item)| (TypedUsize::from_usize(index), item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, I> ExactSizeIterator for VecMapIter<K, I>
where
    K: Behave,
    I: ExactSizeIterator,
{
}
