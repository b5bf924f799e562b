use std::{fmt, marker::PhantomData};

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use ssz::{BYTES_PER_LENGTH_OFFSET, Decode, DecodeError, Encode, SszEncoder};
use ssz_types::typenum::Unsigned;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

use crate::{
    error::PersistentError,
    tree::{Iter, Layout, Tree},
};

/// SSZ `List[T, N]` backed by a structurally shared tree.
pub struct PersistentList<T, N> {
    tree: Tree<T>,
    _phantom: PhantomData<N>,
}

impl<T, N> Clone for PersistentList<T, N> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: TreeHash, N: Unsigned> Default for PersistentList<T, N> {
    fn default() -> Self {
        Self {
            tree: Tree::empty(Layout::new::<T>(N::USIZE)),
            _phantom: PhantomData,
        }
    }
}

impl<T: TreeHash, N: Unsigned> PersistentList<T, N> {
    pub fn new(values: Vec<T>) -> Result<Self, PersistentError> {
        if values.len() > N::USIZE {
            return Err(PersistentError::TooLong {
                actual: values.len(),
                limit: N::USIZE,
            });
        }
        Ok(Self {
            tree: Tree::from_values(values, Layout::new::<T>(N::USIZE)),
            _phantom: PhantomData,
        })
    }

    pub fn try_from_iter(iter: impl IntoIterator<Item = T>) -> Result<Self, PersistentError> {
        Self::new(iter.into_iter().collect())
    }
}

impl<T, N: Unsigned> PersistentList<T, N> {
    pub fn max_len() -> usize {
        N::USIZE
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.tree.get(index)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter()
    }

    /// Whether both lists share the same root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }
}

impl<T: Clone, N: Unsigned> PersistentList<T, N> {
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.tree.get_mut(index)
    }

    pub fn push(&mut self, value: T) -> Result<(), PersistentError> {
        if self.len() >= N::USIZE {
            return Err(PersistentError::Full { limit: N::USIZE });
        }
        self.tree.push(value);
        Ok(())
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.tree = Tree::empty(self.tree.layout());
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: fmt::Debug, N: Unsigned> fmt::Debug for PersistentList<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, N> PartialEq for PersistentList<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<T: Eq, N> Eq for PersistentList<T, N> {}

impl<'a, T, N: Unsigned> IntoIterator for &'a PersistentList<T, N> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: TreeHash, N: Unsigned> TryFrom<Vec<T>> for PersistentList<T, N> {
    type Error = PersistentError;

    fn try_from(values: Vec<T>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl<T: Encode, N: Unsigned> Encode for PersistentList<T, N> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        if T::is_ssz_fixed_len() {
            buf.reserve(T::ssz_fixed_len() * self.len());
            for item in self {
                item.ssz_append(buf);
            }
        } else {
            let mut encoder = SszEncoder::container(buf, self.len() * BYTES_PER_LENGTH_OFFSET);
            for item in self {
                encoder.append(item);
            }
            encoder.finalize();
        }
    }

    fn ssz_bytes_len(&self) -> usize {
        if T::is_ssz_fixed_len() {
            T::ssz_fixed_len() * self.len()
        } else {
            self.iter()
                .map(|item| item.ssz_bytes_len() + BYTES_PER_LENGTH_OFFSET)
                .sum()
        }
    }
}

impl<T: Decode + TreeHash, N: Unsigned> Decode for PersistentList<T, N> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        let values = if T::is_ssz_fixed_len() {
            let item_len = T::ssz_fixed_len();
            if item_len == 0 || bytes.len() % item_len != 0 {
                return Err(DecodeError::InvalidByteLength {
                    len: bytes.len(),
                    expected: bytes.len().div_ceil(item_len.max(1)) * item_len,
                });
            }
            let count = bytes.len() / item_len;
            if count > N::USIZE {
                return Err(DecodeError::BytesInvalid(format!(
                    "list of {count} items exceeds limit {}",
                    N::USIZE
                )));
            }
            bytes
                .chunks(item_len)
                .map(T::from_ssz_bytes)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            ssz::decode_list_of_variable_length_items::<T, Vec<T>>(bytes, Some(N::USIZE))?
        };

        Self::new(values).map_err(|err| DecodeError::BytesInvalid(err.to_string()))
    }
}

impl<T: TreeHash, N: Unsigned> TreeHash for PersistentList<T, N> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::List
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("List should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("List should never be packed.")
    }

    fn tree_hash_root(&self) -> B256 {
        tree_hash::mix_in_length(&self.tree.root(), self.len())
    }
}

impl<T: Serialize, N: Unsigned> Serialize for PersistentList<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de, T: Deserialize<'de> + TreeHash, N: Unsigned> Deserialize<'de> for PersistentList<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<T>::deserialize(deserializer)?;
        Self::new(values).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use ssz_types::{VariableList, typenum::U1024};

    use super::*;

    type List = PersistentList<u64, U1024>;

    #[test]
    fn matches_variable_list_encoding_and_root() {
        let values: Vec<u64> = (0..300).map(|i| i * 7).collect();
        let list = List::new(values.clone()).expect("within limit");
        let reference = VariableList::<u64, U1024>::new(values).expect("within limit");

        assert_eq!(list.as_ssz_bytes(), reference.as_ssz_bytes());
        assert_eq!(list.tree_hash_root(), reference.tree_hash_root());

        let decoded = List::from_ssz_bytes(&list.as_ssz_bytes()).expect("valid bytes");
        assert_eq!(decoded, list);
    }

    #[test]
    fn empty_root_matches_variable_list() {
        let reference = VariableList::<u64, U1024>::empty();
        assert_eq!(List::default().tree_hash_root(), reference.tree_hash_root());
    }

    #[test]
    fn push_respects_limit() {
        let mut list = PersistentList::<u64, ssz_types::typenum::U4>::default();
        for i in 0..4 {
            list.push(i).expect("below limit");
        }
        assert_eq!(list.push(4), Err(PersistentError::Full { limit: 4 }));
        assert_eq!(list.to_vec(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn clones_are_independent() {
        let original = List::new((0..100).collect()).expect("within limit");
        let mut branch = original.clone();
        assert!(branch.ptr_eq(&original));

        *branch.get_mut(10).expect("in bounds") = 0;
        branch.push(100).expect("below limit");

        assert_eq!(original.get(10), Some(&10));
        assert_eq!(original.len(), 100);
        assert_eq!(branch.len(), 101);
        assert_ne!(original.tree_hash_root(), branch.tree_hash_root());
    }

    #[test]
    fn rejects_oversized_input() {
        let bytes = vec![0u8; 8 * 1025];
        assert!(List::from_ssz_bytes(&bytes).is_err());
        assert!(matches!(
            List::new(vec![0; 1025]),
            Err(PersistentError::TooLong { actual: 1025, limit: 1024 })
        ));
    }

    #[test]
    fn serde_is_a_plain_sequence() {
        let list = List::new(vec![1, 2, 3]).expect("within limit");
        let json = serde_json::to_string(&list).expect("serializes");
        assert_eq!(json, "[1,2,3]");
        let decoded: List = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(decoded, list);
    }
}
