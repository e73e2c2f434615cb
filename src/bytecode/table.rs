//! Open-addressing hash table keyed by interned strings.
//!
//! Linear probing from `hash % capacity`. Deleted entries become tombstones so
//! probe sequences through them stay intact; tombstones count toward the load
//! factor and are dropped when the table is resized. Keys compare by handle,
//! which is sound because every key is interned.

use crate::bytecode::object::{ObjRef, ObjectRegistry};
use crate::bytecode::value::Value;

/// Maximum ratio of occupied-or-tombstoned slots to capacity.
pub const TABLE_MAX_LOAD: f64 = 0.75;
/// Capacity of the first allocation.
pub const MIN_CAPACITY: usize = 8;

/// Geometric growth with a minimum floor.
pub fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}

/// An interned string handle together with its cached hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringKey {
    pub obj: ObjRef,
    pub hash: u32,
}

impl StringKey {
    pub fn new(obj: ObjRef, hash: u32) -> Self {
        Self { obj, hash }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Empty,
    Tombstone,
    Occupied { key: StringKey, value: Value },
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Occupied slots plus tombstones.
    count: usize,
    slots: Vec<Slot>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots plus tombstones; this is what the load factor is measured on.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert or overwrite. Returns true when the key was not present.
    pub fn set(&mut self, key: StringKey, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            self.resize(grow_capacity(self.capacity()));
        }

        let index = find_slot(&self.slots, key);
        let slot = &mut self.slots[index];
        let is_new_key = !matches!(slot, Slot::Occupied { .. });
        // Reusing a tombstone does not change the count.
        if matches!(slot, Slot::Empty) {
            self.count += 1;
        }

        *slot = Slot::Occupied { key, value };
        is_new_key
    }

    pub fn get(&self, key: StringKey) -> Option<Value> {
        if self.count == 0 {
            return None;
        }

        match self.slots[find_slot(&self.slots, key)] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Replace the entry with a tombstone. The count is left as is.
    pub fn delete(&mut self, key: StringKey) -> bool {
        if self.count == 0 {
            return false;
        }

        let index = find_slot(&self.slots, key);
        if !matches!(self.slots[index], Slot::Occupied { .. }) {
            return false;
        }

        self.slots[index] = Slot::Tombstone;
        true
    }

    /// Copy every live entry of `from` into `to`.
    pub fn add_all(from: &Table, to: &mut Table) {
        for (key, value) in from.iter() {
            to.set(key, value);
        }
    }

    /// Look a string up by content. This is the only place string bytes are
    /// compared; everything else relies on handle identity.
    pub fn find_string(&self, objects: &ObjectRegistry, chars: &str, hash: u32) -> Option<ObjRef> {
        if self.count == 0 {
            return None;
        }

        let capacity = self.capacity();
        let mut index = hash as usize % capacity;
        loop {
            match self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { key, .. } => {
                    if key.hash == hash
                        && objects
                            .string(key.obj)
                            .is_some_and(|s| s.len() == chars.len() && s.as_str() == chars)
                    {
                        return Some(key.obj);
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (StringKey, Value)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied { key, value } => Some((*key, *value)),
            _ => None,
        })
    }

    fn resize(&mut self, capacity: usize) {
        let mut slots = vec![Slot::Empty; capacity];

        self.count = 0;
        for slot in &self.slots {
            if let Slot::Occupied { key, value } = *slot {
                let index = find_slot(&slots, key);
                slots[index] = Slot::Occupied { key, value };
                self.count += 1;
            }
        }

        log::trace!("table resized to {} slots ({} live)", capacity, self.count);
        self.slots = slots;
    }
}

/// Slot holding `key`, or where it should be inserted: the first tombstone
/// passed on the way, else the empty slot that ended the probe.
///
/// The load factor guarantees an empty slot exists, so the probe terminates.
fn find_slot(slots: &[Slot], key: StringKey) -> usize {
    let capacity = slots.len();
    let mut index = key.hash as usize % capacity;
    let mut tombstone = None;

    loop {
        match slots[index] {
            Slot::Empty => return tombstone.unwrap_or(index),
            Slot::Tombstone => {
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            }
            Slot::Occupied { key: existing, .. } => {
                if existing.obj == key.obj {
                    return index;
                }
            }
        }
        index = (index + 1) % capacity;
    }
}
