//! Named attribute arrays attached to points, cells, or whole datasets.
//!
//! `AttributeSet` maintains:
//! - an insertion-ordered list of `(name, array)` pairs for deterministic
//!   iteration and serialization,
//! - an optional "active normals" designation used by the cell-normal pass.
//!
//! # Invariants
//!
//! - Each name appears at most once.
//! - For point/cell data, every array has exactly one tuple per element of
//!   the owning dataset; the attribute pre-check pass verifies this before
//!   composite traversal.

use serde::{Deserialize, Serialize};

use crate::error::SurfaceSieveError;

/// A typed attribute array. Tuple count is `len()`; `Float32` carries an
/// explicit component count (3 for normals).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeArray {
    /// Signed 64-bit ids (original cell/point/face ids; `-1` = no origin).
    Int64(Vec<i64>),
    /// Unsigned 32-bit tags (composite index, block colors, process ids).
    UInt32(Vec<u32>),
    /// Unsigned 8-bit flags (ghost types, edge visibility masks).
    UInt8(Vec<u8>),
    /// Float tuples with a fixed component count.
    Float32 {
        /// Components per tuple.
        components: usize,
        /// Flat value buffer, `components * len` entries.
        values: Vec<f32>,
    },
    /// String values (assembly descriptors).
    Str(Vec<String>),
}

impl AttributeArray {
    /// Number of tuples.
    pub fn len(&self) -> usize {
        match self {
            AttributeArray::Int64(v) => v.len(),
            AttributeArray::UInt32(v) => v.len(),
            AttributeArray::UInt8(v) => v.len(),
            AttributeArray::Float32 { components, values } => {
                if *components == 0 { 0 } else { values.len() / components }
            }
            AttributeArray::Str(v) => v.len(),
        }
    }

    /// True when the array holds no tuples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather the tuples at `indices` into a new array of the same type.
    pub fn select(&self, indices: &[usize]) -> AttributeArray {
        match self {
            AttributeArray::Int64(v) => {
                AttributeArray::Int64(indices.iter().map(|&i| v[i]).collect())
            }
            AttributeArray::UInt32(v) => {
                AttributeArray::UInt32(indices.iter().map(|&i| v[i]).collect())
            }
            AttributeArray::UInt8(v) => {
                AttributeArray::UInt8(indices.iter().map(|&i| v[i]).collect())
            }
            AttributeArray::Float32 { components, values } => {
                let c = *components;
                let mut out = Vec::with_capacity(indices.len() * c);
                for &i in indices {
                    out.extend_from_slice(&values[i * c..(i + 1) * c]);
                }
                AttributeArray::Float32 { components: c, values: out }
            }
            AttributeArray::Str(v) => {
                AttributeArray::Str(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }

    /// Append `other`'s tuples. Returns `false` (and leaves `self` alone)
    /// on a type or component mismatch.
    pub fn extend_from(&mut self, other: &AttributeArray) -> bool {
        match (self, other) {
            (AttributeArray::Int64(a), AttributeArray::Int64(b)) => {
                a.extend_from_slice(b);
                true
            }
            (AttributeArray::UInt32(a), AttributeArray::UInt32(b)) => {
                a.extend_from_slice(b);
                true
            }
            (AttributeArray::UInt8(a), AttributeArray::UInt8(b)) => {
                a.extend_from_slice(b);
                true
            }
            (
                AttributeArray::Float32 { components: ca, values: a },
                AttributeArray::Float32 { components: cb, values: b },
            ) if ca == cb => {
                a.extend_from_slice(b);
                true
            }
            (AttributeArray::Str(a), AttributeArray::Str(b)) => {
                a.extend_from_slice(b);
                true
            }
            _ => false,
        }
    }

    /// View as `i64` ids, if that is the underlying type.
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            AttributeArray::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// View as `u8` flags, if that is the underlying type.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            AttributeArray::UInt8(v) => Some(v),
            _ => None,
        }
    }

    /// View as `u32` tags, if that is the underlying type.
    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            AttributeArray::UInt32(v) => Some(v),
            _ => None,
        }
    }
}

/// Insertion-ordered name -> array map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    arrays: Vec<(String, AttributeArray)>,
    active_normals: Option<String>,
}

impl AttributeSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the array under `name`.
    pub fn add(&mut self, name: impl Into<String>, array: AttributeArray) {
        let name = name.into();
        if let Some(slot) = self.arrays.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = array;
        } else {
            self.arrays.push((name, array));
        }
    }

    /// Look up `name`.
    pub fn get(&self, name: &str) -> Option<&AttributeArray> {
        self.arrays.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Remove `name` if present, returning the array.
    pub fn remove(&mut self, name: &str) -> Option<AttributeArray> {
        let pos = self.arrays.iter().position(|(n, _)| n == name)?;
        if self.active_normals.as_deref() == Some(name) {
            self.active_normals = None;
        }
        Some(self.arrays.remove(pos).1)
    }

    /// Iterate `(name, array)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeArray)> {
        self.arrays.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Number of arrays.
    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Mark `name` as the active normals array.
    pub fn set_active_normals(&mut self, name: impl Into<String>) {
        self.active_normals = Some(name.into());
    }

    /// Name of the active normals array, if designated.
    pub fn active_normals(&self) -> Option<&str> {
        self.active_normals.as_deref()
    }

    /// Verify every array holds exactly `expected` tuples.
    ///
    /// # Errors
    /// Returns `MalformedAttributes` naming the first offending array.
    pub fn check_lengths(&self, expected: usize) -> Result<(), SurfaceSieveError> {
        for (name, array) in &self.arrays {
            if array.len() != expected {
                return Err(SurfaceSieveError::MalformedAttributes {
                    name: name.clone(),
                    expected,
                    actual: array.len(),
                });
            }
        }
        Ok(())
    }

    /// Gather every array at `indices` into a new set, preserving order and
    /// the active-normals designation.
    pub fn select(&self, indices: &[usize]) -> AttributeSet {
        AttributeSet {
            arrays: self
                .arrays
                .iter()
                .map(|(n, a)| (n.clone(), a.select(indices)))
                .collect(),
            active_normals: self.active_normals.clone(),
        }
    }

    /// Copy arrays from `other`, replacing same-named entries. Used for
    /// field-data passthrough from input block to output block.
    pub fn pass_from(&mut self, other: &AttributeSet) {
        for (name, array) in other.iter() {
            self.add(name, array.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_replaces_same_name() {
        let mut set = AttributeSet::new();
        set.add("a", AttributeArray::UInt32(vec![1]));
        set.add("a", AttributeArray::UInt32(vec![2, 3]));
        assert_eq!(set.num_arrays(), 1);
        assert_eq!(set.get("a").unwrap().len(), 2);
    }

    #[test]
    fn check_lengths_reports_offender() {
        let mut set = AttributeSet::new();
        set.add("ok", AttributeArray::Int64(vec![0, 1, 2]));
        set.add("bad", AttributeArray::Int64(vec![0]));
        let err = set.check_lengths(3).unwrap_err();
        assert_eq!(
            err,
            SurfaceSieveError::MalformedAttributes {
                name: "bad".into(),
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn select_gathers_tuples() {
        let arr = AttributeArray::Float32 {
            components: 2,
            values: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        };
        let picked = arr.select(&[2, 0]);
        assert_eq!(
            picked,
            AttributeArray::Float32 { components: 2, values: vec![4.0, 5.0, 0.0, 1.0] }
        );
    }
}
