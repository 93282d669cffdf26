//! Insertion-ordered map with tombstones.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// A map that remembers insertion order and can *blot* an entry: forget its
/// value while keeping its slot.
///
/// A blotted key is distinguishable from a key that was never inserted
/// (see [`is_blotted`](Self::is_blotted)), and iteration skips it. Slots are
/// only reclaimed by [`clear`](Self::clear). Inserting a blotted key revives
/// its original slot.
#[derive(Clone, Debug)]
pub struct BlotMap<K, V> {
    slots: Vec<(K, Option<V>)>,
    index: FxHashMap<K, usize>,
}

impl<K, V> Default for BlotMap<K, V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash, V> BlotMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `key`, returning the previous live value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            return self.slots[slot].1.replace(value);
        }
        self.index.insert(key, self.slots.len());
        self.slots.push((key, Some(value)));
        None
    }

    /// The live value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let &slot = self.index.get(key)?;
        self.slots[slot].1.as_ref()
    }

    /// The value for `key`, inserting `V::default()` if the key is absent
    /// or blotted.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.index.insert(key, self.slots.len());
                self.slots.push((key, None));
                self.slots.len() - 1
            }
        };
        self.slots[slot].1.get_or_insert_with(V::default)
    }

    /// Forget the value for `key` but keep its slot. Returns `true` if a
    /// live value was removed.
    pub fn blot(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(&slot) => self.slots[slot].1.take().is_some(),
            None => false,
        }
    }

    /// Returns `true` if `key` has a slot whose value was blotted.
    pub fn is_blotted(&self, key: &K) -> bool {
        self.index
            .get(key)
            .is_some_and(|&slot| self.slots[slot].1.is_none())
    }

    /// Drop every slot, live or blotted.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.slots
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (*k, v)))
    }

    /// Live keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}
