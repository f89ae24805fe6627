mod typed_usize;
pub use typed_usize::{BallotBoxId, Behave, TypedUsize};

mod vecmap;
mod vecmap_iter;
pub use vecmap::VecMap;
pub use vecmap_iter::VecMapIter;
