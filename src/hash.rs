//! A hash over an edge's fully expanded command line, recorded in the
//! command log and compared to decide whether an output must be rebuilt.

use std::hash::Hasher;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Hash(pub u64);

impl Hash {
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex(text: &str) -> Option<Hash> {
        u64::from_str_radix(text, 16).ok().map(Hash)
    }
}

pub fn hash_command(cmdline: &str) -> Hash {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hasher.write(cmdline.as_bytes());
    Hash(hasher.finish())
}
