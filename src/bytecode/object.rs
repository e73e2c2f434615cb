//! Heap objects, the object registry and string interning.

use std::fmt;

use crate::bytecode::table::{StringKey, Table};
use crate::bytecode::value::{format_number, Value};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over the raw bytes.
pub fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Opaque handle to an object owned by an [`ObjectRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

impl ObjRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Object type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    String,
}

/// A heap-allocated object.
#[derive(Debug, Clone, PartialEq)]
pub enum Obj {
    String(ObjString),
}

impl Obj {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Obj::String(_) => ObjType::String,
        }
    }

    pub fn as_string(&self) -> Option<&ObjString> {
        match self {
            Obj::String(s) => Some(s),
        }
    }
}

/// An immutable string with its precomputed hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjString {
    chars: Box<str>,
    hash: u32,
}

impl ObjString {
    fn new(chars: String, hash: u32) -> Self {
        Self {
            chars: chars.into_boxed_str(),
            hash,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

impl fmt::Display for ObjString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.chars)
    }
}

/// Every object ever allocated, in allocation order. The registry is the sole
/// owner of object lifetime; objects live until the registry is dropped.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: Vec<Obj>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, obj: Obj) -> ObjRef {
        let handle = ObjRef(self.objects.len() as u32);
        log::trace!("allocate {:?} as {:?}", obj.obj_type(), handle);
        self.objects.push(obj);
        handle
    }

    pub fn get(&self, handle: ObjRef) -> Option<&Obj> {
        self.objects.get(handle.index())
    }

    pub fn string(&self, handle: ObjRef) -> Option<&ObjString> {
        self.get(handle).and_then(Obj::as_string)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (ObjRef, &Obj)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, obj)| (ObjRef(i as u32), obj))
    }
}

/// The VM heap: the object registry plus the string intern table.
#[derive(Debug, Default)]
pub struct Heap {
    objects: ObjectRegistry,
    strings: Table,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string the caller keeps ownership of, copying it only if it
    /// has not been seen before.
    pub fn copy_string(&mut self, chars: &str) -> ObjRef {
        let hash = hash_string(chars.as_bytes());
        if let Some(interned) = self.strings.find_string(&self.objects, chars, hash) {
            return interned;
        }
        self.allocate_string(chars.to_owned(), hash)
    }

    /// Intern a string whose buffer is handed over. If an identical string is
    /// already interned the buffer is dropped and the existing handle returned.
    pub fn take_string(&mut self, chars: String) -> ObjRef {
        let hash = hash_string(chars.as_bytes());
        if let Some(interned) = self.strings.find_string(&self.objects, &chars, hash) {
            return interned;
        }
        self.allocate_string(chars, hash)
    }

    fn allocate_string(&mut self, chars: String, hash: u32) -> ObjRef {
        let handle = self.objects.allocate(Obj::String(ObjString::new(chars, hash)));
        self.strings.set(StringKey::new(handle, hash), Value::Nil);
        handle
    }

    pub fn get(&self, handle: ObjRef) -> Option<&Obj> {
        self.objects.get(handle)
    }

    pub fn string(&self, handle: ObjRef) -> Option<&ObjString> {
        self.objects.string(handle)
    }

    /// Table key for a string handle.
    pub fn key(&self, handle: ObjRef) -> Option<StringKey> {
        self.string(handle).map(|s| StringKey::new(handle, s.hash()))
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn strings(&self) -> &Table {
        &self.strings
    }

    pub fn interned_count(&self) -> usize {
        self.strings.iter().count()
    }

    /// Render a value; strings print their content.
    pub fn format_value(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(n),
            Value::Obj(handle) => match self.get(handle) {
                Some(Obj::String(s)) => s.as_str().to_string(),
                None => format!("<dangling {}>", handle.index()),
            },
        }
    }
}
