use std::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use ssz::{Decode, DecodeError, Encode};
use ssz_types::typenum::Unsigned;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

use crate::{
    error::PersistentError,
    tree::{Iter, Layout, Tree},
};

/// SSZ `Vector[T, N]` backed by a structurally shared tree.
pub struct PersistentVector<T, N> {
    tree: Tree<T>,
    _phantom: PhantomData<N>,
}

impl<T, N> Clone for PersistentVector<T, N> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Default + Clone + TreeHash, N: Unsigned> Default for PersistentVector<T, N> {
    fn default() -> Self {
        Self::repeat(T::default())
    }
}

impl<T: TreeHash, N: Unsigned> PersistentVector<T, N> {
    pub fn new(values: Vec<T>) -> Result<Self, PersistentError> {
        if values.len() != N::USIZE {
            return Err(PersistentError::InvalidLength {
                expected: N::USIZE,
                actual: values.len(),
            });
        }
        Ok(Self {
            tree: Tree::from_values(values, Layout::new::<T>(N::USIZE)),
            _phantom: PhantomData,
        })
    }

    /// A vector with every element set to `value`.
    pub fn repeat(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            tree: Tree::repeat(value, N::USIZE, Layout::new::<T>(N::USIZE)),
            _phantom: PhantomData,
        }
    }
}

impl<T, N: Unsigned> PersistentVector<T, N> {
    pub fn len(&self) -> usize {
        N::USIZE
    }

    pub fn is_empty(&self) -> bool {
        N::USIZE == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.tree.get(index)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }
}

impl<T: Clone, N: Unsigned> PersistentVector<T, N> {
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.tree.get_mut(index)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<(), PersistentError> {
        let slot = self.get_mut(index).ok_or(PersistentError::OutOfBounds {
            index,
            length: N::USIZE,
        })?;
        *slot = value;
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T, N: Unsigned> Index<usize> for PersistentVector<T, N> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("index {index} out of bounds for vector of length {}", N::USIZE),
        }
    }
}

impl<T: Clone, N: Unsigned> IndexMut<usize> for PersistentVector<T, N> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("index {index} out of bounds for vector of length {}", N::USIZE),
        }
    }
}

impl<T: fmt::Debug, N: Unsigned> fmt::Debug for PersistentVector<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, N> PartialEq for PersistentVector<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<T: Eq, N> Eq for PersistentVector<T, N> {}

impl<'a, T, N: Unsigned> IntoIterator for &'a PersistentVector<T, N> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Encode, N: Unsigned> Encode for PersistentVector<T, N> {
    fn is_ssz_fixed_len() -> bool {
        T::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        if T::is_ssz_fixed_len() {
            T::ssz_fixed_len() * N::USIZE
        } else {
            ssz::BYTES_PER_LENGTH_OFFSET
        }
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        if T::is_ssz_fixed_len() {
            buf.reserve(T::ssz_fixed_len() * N::USIZE);
            for item in self {
                item.ssz_append(buf);
            }
        } else {
            let mut encoder =
                ssz::SszEncoder::container(buf, N::USIZE * ssz::BYTES_PER_LENGTH_OFFSET);
            for item in self {
                encoder.append(item);
            }
            encoder.finalize();
        }
    }

    fn ssz_bytes_len(&self) -> usize {
        if T::is_ssz_fixed_len() {
            T::ssz_fixed_len() * N::USIZE
        } else {
            self.iter()
                .map(|item| item.ssz_bytes_len() + ssz::BYTES_PER_LENGTH_OFFSET)
                .sum()
        }
    }
}

impl<T: Decode + TreeHash, N: Unsigned> Decode for PersistentVector<T, N> {
    fn is_ssz_fixed_len() -> bool {
        T::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        if T::is_ssz_fixed_len() {
            T::ssz_fixed_len() * N::USIZE
        } else {
            ssz::BYTES_PER_LENGTH_OFFSET
        }
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let values = if T::is_ssz_fixed_len() {
            let expected = T::ssz_fixed_len() * N::USIZE;
            if bytes.len() != expected {
                return Err(DecodeError::InvalidByteLength {
                    len: bytes.len(),
                    expected,
                });
            }
            bytes
                .chunks(T::ssz_fixed_len().max(1))
                .map(T::from_ssz_bytes)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            ssz::decode_list_of_variable_length_items::<T, Vec<T>>(bytes, Some(N::USIZE))?
        };

        Self::new(values).map_err(|err| DecodeError::BytesInvalid(err.to_string()))
    }
}

impl<T: TreeHash, N: Unsigned> TreeHash for PersistentVector<T, N> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_root(&self) -> B256 {
        self.tree.root()
    }
}

impl<T: Serialize, N: Unsigned> Serialize for PersistentVector<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de, T: Deserialize<'de> + TreeHash, N: Unsigned> Deserialize<'de>
    for PersistentVector<T, N>
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<T>::deserialize(deserializer)?;
        Self::new(values).map_err(D::Error::custom)
    }
}
