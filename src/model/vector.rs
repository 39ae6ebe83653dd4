use crate::model::ModelError;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::collections::btree_set;

/// A sparse set of positive ids which knows its highest member.
///
/// Vectors decoded from a TC string also remember how many bits they occupied,
/// which the segment decoder needs to advance past self-describing fields.
/// Any mutation forgets that length.
#[derive(Clone, Debug, Default, Eq)]
pub struct Vector {
    ids: BTreeSet<u16>,
    bit_length: Option<u64>,
}

impl Vector {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn decoded(ids: BTreeSet<u16>, bit_length: u64) -> Self {
        Self {
            ids,
            bit_length: Some(bit_length),
        }
    }

    pub fn has(&self, id: u16) -> bool {
        self.ids.contains(&id)
    }

    /// Adds an id. Ids start at 1.
    pub fn set(&mut self, id: u16) -> Result<(), ModelError> {
        if id == 0 {
            return Err(ModelError::invalid("vector id", id, "ids start at 1"));
        }
        self.bit_length = None;
        self.ids.insert(id);
        Ok(())
    }

    /// Adds every id of a collection, stopping at the first invalid one.
    pub fn set_all<I>(&mut self, ids: I) -> Result<(), ModelError>
    where
        I: IntoIterator<Item = u16>,
    {
        ids.into_iter().try_for_each(|id| self.set(id))
    }

    pub fn unset(&mut self, id: u16) {
        if self.ids.remove(&id) {
            self.bit_length = None;
        }
    }

    pub fn unset_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = u16>,
    {
        ids.into_iter().for_each(|id| self.unset(id));
    }

    /// Removes every id.
    pub fn empty(&mut self) {
        self.ids.clear();
        self.bit_length = None;
    }

    /// The highest id set, or 0 for an empty vector.
    pub fn max_id(&self) -> u16 {
        self.ids.last().copied().unwrap_or(0)
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates over the ids set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ids.iter().copied()
    }

    pub fn ids(&self) -> &BTreeSet<u16> {
        &self.ids
    }

    /// Number of bits this vector occupied in the string it was decoded from.
    pub fn bit_length(&self) -> Option<u64> {
        self.bit_length
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

/// Collects ids into a vector. Zero is not a valid id and is skipped.
impl FromIterator<u16> for Vector {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().filter(|&id| id != 0).collect(),
            bit_length: None,
        }
    }
}

impl<'a> IntoIterator for &'a Vector {
    type Item = &'a u16;
    type IntoIter = btree_set::Iter<'a, u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

impl Serialize for Vector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(&self.ids)
    }
}
