use bls::{PublicKeyBytes, SignatureBytes};
use im::Vector;

use crate::phase0::primitives::{H256, H32};

/// Merkle root of a value, computed the way SSZ computes `hash_tree_root` for fixed-size
/// containers and lists of them.
pub trait HashTreeRoot {
    fn hash_tree_root(&self) -> H256;
}

impl HashTreeRoot for u64 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        hashing::chunk_64(*self)
    }
}

impl HashTreeRoot for bool {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        hashing::chunk_64((*self).into())
    }
}

impl HashTreeRoot for H256 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

impl HashTreeRoot for H32 {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = H256::zero();
        chunk[..H32::len_bytes()].copy_from_slice(self.as_bytes());
        chunk
    }
}

impl HashTreeRoot for PublicKeyBytes {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&hashing::pack_bytes(self.as_bytes()))
    }
}

impl HashTreeRoot for SignatureBytes {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(&hashing::pack_bytes(self.as_bytes()))
    }
}

impl<T: HashTreeRoot> HashTreeRoot for [T] {
    fn hash_tree_root(&self) -> H256 {
        let roots = self.iter().map(T::hash_tree_root).collect::<Vec<_>>();
        hashing::mix_in_length(hashing::merkleize(&roots), self.len())
    }
}

impl<T: HashTreeRoot> HashTreeRoot for Vec<T> {
    #[inline]
    fn hash_tree_root(&self) -> H256 {
        self.as_slice().hash_tree_root()
    }
}

impl<T: HashTreeRoot + Clone> HashTreeRoot for Vector<T> {
    fn hash_tree_root(&self) -> H256 {
        let roots = self.iter().map(T::hash_tree_root).collect::<Vec<_>>();
        hashing::mix_in_length(hashing::merkleize(&roots), self.len())
    }
}

/// Implements [`HashTreeRoot`] for a container by Merkleizing the roots of its fields in order.
#[macro_export]
macro_rules! impl_container_root {
    ($type:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::traits::HashTreeRoot for $type {
            fn hash_tree_root(&self) -> $crate::phase0::primitives::H256 {
                hashing::merkleize(&[
                    $($crate::traits::HashTreeRoot::hash_tree_root(&self.$field)),+
                ])
            }
        }
    };
}
