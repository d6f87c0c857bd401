//! String interning table.
//!
//! Every string stored in a graph (names, literal values, file paths) is
//! interned once and referred to by a 32-bit [`Key`]. The upper 16 bits of a key
//! are the Pearson hash of the string, the lower 16 bits a per-bucket counter,
//! so keys stay stable across save and load and never collide with keys handed
//! out after loading.

use crate::error::{GraphError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{trace, warn};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

/// Identity of an interned string. `0` is the empty string.
pub type Key = u32;

/// Old-key to new-key mapping used when moving strings between tables.
pub type KeyMap = HashMap<Key, Key>;

const SECTION_TAG: &[u8; 6] = b"STRTBL";

/// Buckets beyond one per 16-bit hash value are never used.
pub const MAX_BUCKETS: u32 = 1 << 16;

/// Longest string a table section may carry.
pub const MAX_STRING_LEN: u32 = 1 << 24;

/// Persistence class of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrType {
    /// Ordinary string: written when referenced by a live node
    Default,
    /// Always written
    ToSave,
    /// Runtime-only
    Temporary,
}

/// Pseudorandom permutation of 0..=255 used by the Pearson hash.
const PEARSON: [u8; 256] = [
    1, 14, 110, 25, 97, 174, 132, 119, 138, 170, 125, 118, 27, 233, 140, 51, 87, 197, 177, 107,
    234, 169, 56, 68, 30, 7, 173, 73, 188, 40, 36, 65, 49, 213, 104, 190, 57, 211, 148, 223, 48,
    115, 15, 2, 67, 186, 210, 28, 12, 181, 103, 70, 22, 58, 75, 78, 183, 167, 238, 157, 124, 147,
    172, 144, 176, 161, 141, 86, 60, 66, 128, 83, 156, 241, 79, 46, 168, 198, 41, 254, 178, 85,
    253, 237, 250, 154, 133, 88, 35, 206, 95, 116, 252, 192, 54, 221, 102, 218, 255, 240, 82, 106,
    158, 201, 61, 3, 89, 9, 42, 155, 159, 93, 166, 80, 50, 34, 175, 195, 100, 99, 26, 150, 16, 145,
    4, 33, 8, 189, 121, 64, 77, 72, 208, 245, 130, 122, 143, 55, 105, 134, 29, 164, 185, 194, 193,
    239, 101, 242, 5, 171, 126, 11, 74, 59, 137, 228, 108, 191, 232, 139, 6, 24, 81, 20, 127, 17,
    91, 92, 251, 151, 225, 207, 21, 98, 113, 112, 84, 226, 18, 214, 199, 187, 13, 32, 94, 220, 224,
    212, 247, 204, 196, 43, 249, 236, 45, 244, 111, 182, 153, 136, 129, 90, 217, 202, 19, 165, 231,
    71, 230, 142, 96, 227, 62, 179, 246, 114, 162, 53, 160, 215, 205, 180, 47, 109, 44, 38, 31,
    149, 135, 0, 216, 52, 63, 23, 37, 69, 39, 117, 146, 184, 163, 200, 222, 235, 248, 243, 219, 10,
    152, 131, 123, 229, 203, 76, 120, 209,
];

/// 16-bit Pearson hash: the high byte hashes all bytes, the low byte hashes the
/// same bytes with the first one incremented.
pub fn pearson_hash(bytes: &[u8]) -> u16 {
    let Some((&first, rest)) = bytes.split_first() else {
        return 0;
    };
    let hi = bytes
        .iter()
        .fold(0u8, |h, &b| PEARSON[usize::from(h ^ b)]);
    let lo = rest.iter().fold(
        PEARSON[usize::from(first.wrapping_add(1))],
        |h, &b| PEARSON[usize::from(h ^ b)],
    );
    (u16::from(hi) << 8) | u16::from(lo)
}

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    ty: StrType,
}

/// Bucketed string table.
#[derive(Debug, Clone)]
pub struct StrTable {
    buckets: Vec<BTreeMap<Key, Entry>>,
    counters: Vec<u16>,
}

impl Default for StrTable {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StrTable {
    /// Create an empty table with `buckets` buckets (at least one).
    pub fn new(buckets: u32) -> Self {
        let buckets = buckets.max(1) as usize;
        Self {
            buckets: vec![BTreeMap::new(); buckets],
            counters: vec![1; buckets],
        }
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> u32 {
        self.buckets.len() as u32
    }

    /// Number of interned strings, not counting the empty string.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(BTreeMap::len).sum()
    }

    /// Whether no string has been interned.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(BTreeMap::is_empty)
    }

    fn bucket_of(&self, hash: u16) -> usize {
        usize::from(hash) % self.buckets.len()
    }

    fn bucket_of_key(&self, key: Key) -> usize {
        (key >> 16) as usize % self.buckets.len()
    }

    fn find(&self, text: &str, hash: u16, bucket: usize) -> Option<Key> {
        let lo = Key::from(hash) << 16;
        self.buckets[bucket]
            .range(lo..=lo | 0xFFFF)
            .find(|(_, entry)| entry.text == text)
            .map(|(&key, _)| key)
    }

    /// Look up a string without interning it.
    pub fn get(&self, text: &str) -> Option<Key> {
        if text.is_empty() {
            return Some(0);
        }
        let hash = pearson_hash(text.as_bytes());
        self.find(text, hash, self.bucket_of(hash))
    }

    /// Intern `text` as a [`StrType::Default`] string.
    pub fn intern(&mut self, text: &str) -> Key {
        self.intern_as(text, StrType::Default)
    }

    /// Intern `text`, returning the existing key if it is already present.
    ///
    /// The type of an existing entry is left untouched; use
    /// [`set_type`](Self::set_type) to change it.
    pub fn intern_as(&mut self, text: &str, ty: StrType) -> Key {
        if text.is_empty() {
            return 0;
        }
        let hash = pearson_hash(text.as_bytes());
        let bucket = self.bucket_of(hash);
        if let Some(key) = self.find(text, hash, bucket) {
            return key;
        }

        let Some(low) = self.next_low(hash, bucket) else {
            warn!("String table bucket {bucket} has no free key for hash {hash:#06x}; '{text}' not interned");
            return 0;
        };
        let key = (Key::from(hash) << 16) | Key::from(low);
        self.buckets[bucket].insert(
            key,
            Entry {
                text: text.to_string(),
                ty,
            },
        );
        trace!("Interned '{text}' as {key:#010x}");
        key
    }

    fn next_low(&mut self, hash: u16, bucket: usize) -> Option<u16> {
        let counter = self.counters[bucket];
        if counter < u16::MAX {
            self.counters[bucket] = counter + 1;
            if counter + 1 == u16::MAX {
                warn!("String table bucket {bucket} is full; falling back to key search");
            }
            return Some(counter);
        }
        // Counter exhausted: reuse any low half not taken for this hash.
        let base = Key::from(hash) << 16;
        let used = &self.buckets[bucket];
        (1..u16::MAX).find(|low| !used.contains_key(&(base | Key::from(*low))))
    }

    /// Resolve a key. Unknown keys and key 0 resolve to the empty string.
    pub fn resolve(&self, key: Key) -> &str {
        self.try_resolve(key).unwrap_or("")
    }

    /// Resolve a key, returning `None` for keys this table never issued.
    pub fn try_resolve(&self, key: Key) -> Option<&str> {
        if key == 0 {
            return Some("");
        }
        self.buckets[self.bucket_of_key(key)]
            .get(&key)
            .map(|entry| entry.text.as_str())
    }

    /// Whether the key was issued by this table.
    pub fn contains(&self, key: Key) -> bool {
        self.try_resolve(key).is_some()
    }

    /// Type of an interned string.
    pub fn string_type(&self, key: Key) -> Option<StrType> {
        self.buckets[self.bucket_of_key(key)]
            .get(&key)
            .map(|entry| entry.ty)
    }

    /// Change the type of an interned string. Unknown keys are ignored.
    pub fn set_type(&mut self, key: Key, ty: StrType) {
        let bucket = self.bucket_of_key(key);
        if let Some(entry) = self.buckets[bucket].get_mut(&key) {
            entry.ty = ty;
        }
    }

    /// Mark a string as always written on save.
    pub fn mark_to_save(&mut self, key: Key) {
        self.set_type(key, StrType::ToSave);
    }

    /// Iterate over all entries in key order within each bucket.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &str, StrType)> + '_ {
        self.buckets.iter().flat_map(|bucket| {
            bucket
                .iter()
                .map(|(&key, entry)| (key, entry.text.as_str(), entry.ty))
        })
    }

    /// Copy the string behind `key` into `target`, recording the mapping.
    ///
    /// Keys already present in `map` are returned without touching `target`,
    /// so repeated calls with the same map are idempotent. Unknown keys map to 0.
    pub fn remap_into(&self, key: Key, target: &mut StrTable, map: &mut KeyMap) -> Key {
        if key == 0 {
            return 0;
        }
        if let Some(&mapped) = map.get(&key) {
            return mapped;
        }
        let Some(text) = self.try_resolve(key) else {
            return 0;
        };
        let ty = self.string_type(key).unwrap_or(StrType::Default);
        let new_key = target.intern_as(text, ty);
        map.insert(key, new_key);
        new_key
    }

    /// Write the table section, keeping entries for which `include` returns true.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Io`] if the writer fails.
    pub fn write_to<W, F>(&self, writer: &mut W, include: F) -> Result<usize>
    where
        W: Write,
        F: Fn(Key, StrType) -> bool,
    {
        let io = |e: std::io::Error| GraphError::io("writing string table", e);
        writer.write_all(SECTION_TAG).map_err(io)?;
        writer
            .write_u32::<LittleEndian>(self.bucket_count())
            .map_err(io)?;
        for &counter in &self.counters {
            writer.write_u16::<LittleEndian>(counter).map_err(io)?;
        }

        let mut written = 0;
        for (key, text, ty) in self.iter() {
            if !include(key, ty) {
                continue;
            }
            writer.write_u32::<LittleEndian>(key).map_err(io)?;
            writer
                .write_u32::<LittleEndian>(text.len() as u32)
                .map_err(io)?;
            writer.write_all(text.as_bytes()).map_err(io)?;
            written += 1;
        }
        writer.write_u32::<LittleEndian>(0).map_err(io)?;
        Ok(written)
    }

    /// Read a table section written by [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::TruncatedStream`] if the input ends early and
    /// [`GraphError::Corrupt`] if the section tag is wrong, the bucket count is
    /// zero or above [`MAX_BUCKETS`], or a string is longer than
    /// [`MAX_STRING_LEN`] or not UTF-8.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let io = |e: std::io::Error| GraphError::io("string table", e);
        let mut tag = [0u8; 6];
        reader.read_exact(&mut tag).map_err(io)?;
        if &tag != SECTION_TAG {
            return Err(GraphError::corrupt("missing string table tag"));
        }
        let bucket_count = reader.read_u32::<LittleEndian>().map_err(io)?;
        if bucket_count == 0 || bucket_count > MAX_BUCKETS {
            return Err(GraphError::corrupt(format!(
                "string table has {bucket_count} buckets"
            )));
        }

        let mut table = Self::new(bucket_count);
        for counter in table.counters.iter_mut() {
            *counter = reader.read_u16::<LittleEndian>().map_err(io)?;
        }

        loop {
            let key = reader.read_u32::<LittleEndian>().map_err(io)?;
            if key == 0 {
                break;
            }
            let len = reader.read_u32::<LittleEndian>().map_err(io)?;
            if len > MAX_STRING_LEN {
                return Err(GraphError::corrupt(format!(
                    "string {key:#010x} claims {len} bytes"
                )));
            }
            let mut bytes = Vec::new();
            reader
                .by_ref()
                .take(u64::from(len))
                .read_to_end(&mut bytes)
                .map_err(io)?;
            if bytes.len() != len as usize {
                return Err(GraphError::TruncatedStream {
                    context: format!("string {key:#010x}"),
                });
            }
            let text = String::from_utf8(bytes)
                .map_err(|_| GraphError::corrupt(format!("string {key:#010x} is not UTF-8")))?;
            let bucket = table.bucket_of_key(key);
            table.buckets[bucket].insert(
                key,
                Entry {
                    text,
                    ty: StrType::Default,
                },
            );
        }
        Ok(table)
    }
}
