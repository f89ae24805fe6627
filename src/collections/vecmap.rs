use serde::{Deserialize, Serialize};
use tracing::error;

use crate::sdk::api::{BallotError, BallotResult};

use super::{typed_usize::Behave, vecmap_iter::VecMapIter, TypedUsize};

/// One value per node, indexed by [TypedUsize].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VecMap<K, V>(Vec<V>, std::marker::PhantomData<TypedUsize<K>>)
where
    K: Behave;

impl<K, V> VecMap<K, V>
where
    K: Behave,
{
    pub fn from_vec(vec: Vec<V>) -> Self {
        Self(vec, std::marker::PhantomData)
    }
    pub fn get(&self, index: TypedUsize<K>) -> BallotResult<&V> {
        self.0.get(index.as_usize()).ok_or_else(|| {
            error!("index {} out of bounds {}", index, self.0.len());
            BallotError::Protocol(format!("index {} out of bounds", index))
        })
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> VecMapIter<K, std::slice::Iter<V>> {
        VecMapIter::new(self.0.iter())
    }
}

/// Borrowing iteration, so `for (index, value) in &map` works.
impl<'a, K, V> IntoIterator for &'a VecMap<K, V>
where
    K: Behave,
{
    type Item = (TypedUsize<K>, &'a V);
    type IntoIter = VecMapIter<K, std::slice::Iter<'a, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::BallotBoxId;

    #[test]
    fn indices_follow_positions() {
        let map: VecMap<BallotBoxId, &str> = VecMap::from_vec(vec!["a", "b", "c"]);
        let indices: Vec<usize> = map.iter().map(|(i, _)| i.as_usize()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(*map.get(TypedUsize::from_usize(1)).unwrap(), "b");
        assert!(map.get(TypedUsize::from_usize(3)).is_err());
    }

    #[test]
    fn borrowed_iteration_matches_iter() {
        let map: VecMap<BallotBoxId, u32> = VecMap::from_vec(vec![7, 8]);
        let mut seen = Vec::new();
        for (index, value) in &map {
            seen.push((index.as_usize(), *value));
        }
        assert_eq!(seen, vec![(0, 7), (1, 8)]);
        assert_eq!(map.len(), 2);
        assert!(!map.is_empty());
    }
}
