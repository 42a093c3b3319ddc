//! Byte layout for [`MemoryStore`].
//!
//! Four sections in order: ints, bools, doubles, strings. Each entry is a
//! NUL-terminated name followed by the value, and each section ends with
//! [`SEPARATOR`]. Ints are 4 bytes and doubles 8 bytes, little-endian; bools
//! are a single byte; strings are NUL-terminated.

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use super::{MemoryStore, SEPARATOR};
use crate::error::{ConfigError, Result};

const NUL: u8 = 0;

fn push_name(data: &mut Vec<u8>, name: &str) {
    data.extend_from_slice(name.as_bytes());
    data.push(NUL);
}

fn write_section<T>(data: &mut Vec<u8>, map: &BTreeMap<String, T>, value_bytes: impl Fn(&T, &mut Vec<u8>)) {
    for (name, value) in map {
        push_name(data, name);
        value_bytes(value, data);
    }
    data.push(SEPARATOR);
}

pub fn to_bytes(store: &MemoryStore) -> Vec<u8> {
    let mut data = Vec::new();
    write_section(&mut data, &store.ints, |v, data| data.extend_from_slice(&v.to_le_bytes()));
    write_section(&mut data, &store.bools, |v, data| data.push(u8::from(*v)));
    write_section(&mut data, &store.doubles, |v, data| data.extend_from_slice(&v.to_le_bytes()));
    write_section(&mut data, &store.strings, |v, data| push_name(data, v));
    data
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(ConfigError::Malformed("section is missing its terminator"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(ConfigError::Malformed("value runs past the end"))?;
        self.pos += len;
        Ok(bytes)
    }

    fn c_string(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == NUL)
            .ok_or(ConfigError::Malformed("unterminated string"))?;
        let text = core::str::from_utf8(&rest[..len]).map_err(|_| ConfigError::Malformed("string is not UTF-8"))?;
        self.pos += len + 1;
        Ok(String::from(text))
    }

    fn section<T>(&mut self, mut value: impl FnMut(&mut Self) -> Result<T>) -> Result<BTreeMap<String, T>> {
        let mut map = BTreeMap::new();
        while self.peek()? != SEPARATOR {
            let name = self.c_string()?;
            let parsed = value(self)?;
            map.insert(name, parsed);
        }
        self.pos += 1;
        Ok(map)
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(bytes);
    out
}

pub fn from_bytes(data: &[u8]) -> Result<MemoryStore> {
    let mut reader = Reader { data, pos: 0 };
    let ints = reader.section(|r| Ok(i32::from_le_bytes(array(r.take(4)?))))?;
    let bools = reader.section(|r| Ok(r.take(1)?[0] != 0))?;
    let doubles = reader.section(|r| Ok(f64::from_le_bytes(array(r.take(8)?))))?;
    let strings = reader.section(Reader::c_string)?;
    if reader.pos != data.len() {
        return Err(ConfigError::Malformed("trailing bytes after the last section"));
    }
    Ok(MemoryStore {
        ints,
        bools,
        doubles,
        strings,
    })
}

/// Loads a store saved by [`save`], or an empty one if the file is missing or
/// unreadable.
#[cfg(target_os = "vexos")]
pub fn load(path: &str) -> MemoryStore {
    match vexide::fs::read(path) {
        Ok(data) => from_bytes(&data).unwrap_or_else(|err| {
            log::warn!("ignoring {path}: {err}");
            MemoryStore::new()
        }),
        Err(_) => {
            log::info!("no saved configuration at {path}");
            MemoryStore::new()
        }
    }
}

#[cfg(target_os = "vexos")]
pub fn save(path: &str, store: &MemoryStore) {
    if vexide::fs::write(path, to_bytes(store)).is_err() {
        log::warn!("could not write configuration to {path}");
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::config::ConfigStore;

    #[test]
    fn layout() {
        let mut store = MemoryStore::new();
        store.set_int("a", 1);
        store.set_bool("b", true);
        store.set_string("s", "hi");
        let mut expected = vec![b'a', 0, 1, 0, 0, 0, b'$', b'b', 0, 1, b'$', b'$'];
        expected.extend_from_slice(&[b's', 0, b'h', b'i', 0, b'$']);
        assert_eq!(to_bytes(&store), expected);
    }

    #[test]
    fn empty_store_is_four_separators() {
        assert_eq!(to_bytes(&MemoryStore::new()), b"$$$$");
        assert!(from_bytes(b"$$$$").unwrap().is_empty());
    }

    #[test]
    fn saved_store_loads_back() {
        let mut store = MemoryStore::new();
        store.set_int("rings", -36);
        store.set_int("zero", 0);
        store.set_bool("red", false);
        store.set_double("turn kp", 0.0125);
        // The value bytes of 36 include '$'.
        store.set_int("dollar", 36);
        store.set_string("auton", "far side $ rush");
        assert_eq!(from_bytes(&to_bytes(&store)).unwrap(), store);
    }

    #[test]
    fn truncated_data_is_rejected() {
        let mut store = MemoryStore::new();
        store.set_double("kp", 1.5);
        let bytes = to_bytes(&store);
        for len in 0..bytes.len() {
            assert!(matches!(
                from_bytes(&bytes[..len]),
                Err(ConfigError::Malformed(_))
            ));
        }
        assert!(from_bytes(b"$$$$$").is_err());
    }
}
