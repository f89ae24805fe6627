use serde::{Deserialize, Serialize};

/// Index tagged with the kind of node it counts, so a ballot box index cannot be
/// mixed up with any other `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedUsize<K>(usize, std::marker::PhantomData<K>)
where
    K: Behave;

/// Bounds every index marker must satisfy.
pub trait Behave:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + std::hash::Hash + Send + Sync
{
}

impl<K> TypedUsize<K>
where
    K: Behave,
{
    pub fn from_usize(index: usize) -> Self {
        TypedUsize(index, std::marker::PhantomData)
    }
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl<K> std::fmt::Display for TypedUsize<K>
where
    K: Behave,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker for ballot box indices `0..N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BallotBoxId;
impl Behave for BallotBoxId {}
