//! Named tuning values that survive between runs.

pub mod serializer;

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
};

pub use serializer::{from_bytes, to_bytes};

/// Marks the end of a section in the serialized form, so it may not appear
/// in names.
pub const SEPARATOR: u8 = b'$';

/// Replaces characters that would confuse the serialized form.
pub fn sanitize_name(name: &str) -> String {
    name.replace(SEPARATOR as char, "-")
}

/// Typed key/value storage.
///
/// The `_or` accessors store the default when the name is missing, so a
/// saved file lists every value the robot asked for.
pub trait ConfigStore {
    fn int(&self, name: &str) -> Option<i32>;
    fn bool(&self, name: &str) -> Option<bool>;
    fn double(&self, name: &str) -> Option<f64>;
    fn string(&self, name: &str) -> Option<String>;

    fn set_int(&mut self, name: &str, value: i32);
    fn set_bool(&mut self, name: &str, value: bool);
    fn set_double(&mut self, name: &str, value: f64);
    fn set_string(&mut self, name: &str, value: &str);

    fn int_or(&mut self, name: &str, default: i32) -> i32 {
        self.int(name).unwrap_or_else(|| {
            self.set_int(name, default);
            default
        })
    }

    fn bool_or(&mut self, name: &str, default: bool) -> bool {
        self.bool(name).unwrap_or_else(|| {
            self.set_bool(name, default);
            default
        })
    }

    fn double_or(&mut self, name: &str, default: f64) -> f64 {
        self.double(name).unwrap_or_else(|| {
            self.set_double(name, default);
            default
        })
    }

    fn string_or(&mut self, name: &str, default: &str) -> String {
        self.string(name).unwrap_or_else(|| {
            self.set_string(name, default);
            default.to_string()
        })
    }
}

/// A [`ConfigStore`] held in memory, one sorted map per value type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
    pub(crate) ints: BTreeMap<String, i32>,
    pub(crate) bools: BTreeMap<String, bool>,
    pub(crate) doubles: BTreeMap<String, f64>,
    pub(crate) strings: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.bools.is_empty() && self.doubles.is_empty() && self.strings.is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn int(&self, name: &str) -> Option<i32> {
        self.ints.get(&sanitize_name(name)).copied()
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.bools.get(&sanitize_name(name)).copied()
    }

    fn double(&self, name: &str) -> Option<f64> {
        self.doubles.get(&sanitize_name(name)).copied()
    }

    fn string(&self, name: &str) -> Option<String> {
        self.strings.get(&sanitize_name(name)).cloned()
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.ints.insert(sanitize_name(name), value);
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.bools.insert(sanitize_name(name), value);
    }

    fn set_double(&mut self, name: &str, value: f64) {
        self.doubles.insert(sanitize_name(name), value);
    }

    fn set_string(&mut self, name: &str, value: &str) {
        self.strings.insert(sanitize_name(name), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_remembered() {
        let mut store = MemoryStore::new();
        assert_eq!(store.double_or("drive kp", 0.1), 0.1);
        assert_eq!(store.double_or("drive kp", 0.5), 0.1);
        assert_eq!(store.string_or("auton", "skills"), "skills");
        assert_eq!(store.string("auton").as_deref(), Some("skills"));
        assert_eq!(store.int("missing"), None);
    }

    #[test]
    fn types_are_kept_apart() {
        let mut store = MemoryStore::new();
        store.set_int("value", 3);
        store.set_bool("value", true);
        assert_eq!(store.int("value"), Some(3));
        assert_eq!(store.bool("value"), Some(true));
        assert_eq!(store.double("value"), None);
    }

    #[test]
    fn separator_in_names_is_replaced() {
        let mut store = MemoryStore::new();
        store.set_int("cost$per$ring", 2);
        assert_eq!(store.int("cost-per-ring"), Some(2));
        assert_eq!(store.int("cost$per$ring"), Some(2));
        assert!(store.ints.contains_key("cost-per-ring"));
    }
}
