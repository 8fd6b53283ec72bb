//! The process-wide table behind [`Name`].
//!
//! Text is split across [`Name::NUM_SHARDS`] independently locked shards
//! chosen by hash. Lookups of text that is already present take only a
//! read lock; a miss upgrades to that shard's write lock and checks again
//! before inserting, so two threads interning the same text always get
//! the same handle.
//!
//! Interned text is leaked. Names are never freed, which lets
//! [`Name::as_str`] hand out `&'static str`.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};

use super::Name;

/// Names every context looks up while installing the base module.
const PRELUDE: &[&str] = &[
    "void", "bool", "byte", "short", "int", "int64", "float", "double", "char", "string", "nil",
    "if", "while", "&&", "||", "block", "try", "__global__", "this",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    /// A shard ran out of 28-bit local indices.
    #[error("interner shard {shard_idx} is full ({count} entries, limit {limit})", limit = Name::MAX_LOCAL)]
    ShardOverflow { shard_idx: usize, count: usize },
}

#[derive(Default)]
struct Shard {
    index: FxHashMap<&'static str, u32>,
    texts: Vec<&'static str>,
}

impl Shard {
    fn find(&self, text: &str) -> Option<u32> {
        self.index.get(text).copied()
    }

    /// Append `text`, returning its local index, or the current size when full.
    fn insert(&mut self, text: &str) -> Result<u32, usize> {
        let count = self.texts.len();
        let local = u32::try_from(count)
            .ok()
            .filter(|&n| n <= Name::MAX_LOCAL)
            .ok_or(count)?;
        let text: &'static str = Box::leak(Box::from(text));
        self.texts.push(text);
        self.index.insert(text, local);
        Ok(local)
    }
}

/// Sharded, thread-safe string interner.
pub struct StringInterner {
    shards: [RwLock<Shard>; Name::NUM_SHARDS],
    count: AtomicUsize,
}

static GLOBAL: OnceLock<StringInterner> = OnceLock::new();

/// The interner every [`Name`] refers to.
pub fn global_interner() -> &'static StringInterner {
    GLOBAL.get_or_init(StringInterner::new)
}

impl StringInterner {
    /// An interner holding the empty string (as [`Name::EMPTY`]) and the
    /// prelude names.
    pub fn new() -> Self {
        let interner = Self {
            shards: std::array::from_fn(|_| RwLock::new(Shard::default())),
            count: AtomicUsize::new(0),
        };
        // Shard 0, local 0: must be first so it lines up with Name::EMPTY.
        {
            let mut first = interner.shards[0].write();
            first.texts.push("");
            first.index.insert("", 0);
        }
        interner.count.store(1, Ordering::Relaxed);
        for text in PRELUDE {
            interner.intern(text);
        }
        interner
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "result is reduced modulo NUM_SHARDS"
    )]
    fn shard_of(text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let mut hasher = FxHasher::default();
        text.hash(&mut hasher);
        (hasher.finish() % Name::NUM_SHARDS as u64) as u32
    }

    /// Intern `text`, failing only when its shard is full.
    pub fn try_intern(&self, text: &str) -> Result<Name, InternError> {
        let shard = Self::shard_of(text);
        let lock = &self.shards[shard as usize];

        if let Some(local) = lock.read().find(text) {
            return Ok(Name::new(shard, local));
        }

        let mut guard = lock.write();
        if let Some(local) = guard.find(text) {
            return Ok(Name::new(shard, local));
        }
        let local = guard.insert(text).map_err(|count| InternError::ShardOverflow {
            shard_idx: shard as usize,
            count,
        })?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(Name::new(shard, local))
    }

    /// Intern `text`.
    ///
    /// # Panics
    /// Panics when a shard holds more than 2^28 entries.
    #[inline]
    pub fn intern(&self, text: &str) -> Name {
        self.try_intern(text).unwrap_or_else(|e| panic!("{e}"))
    }

    /// The text behind `name`; `""` for a handle this interner never issued.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.shards
            .get(name.shard())
            .and_then(|shard| shard.read().texts.get(name.local()).copied())
            .unwrap_or("")
    }

    /// The name for `text` if it has been interned, without inserting.
    pub fn get(&self, text: &str) -> Option<Name> {
        let shard = Self::shard_of(text);
        let local = self.shards[shard as usize].read().find(text)?;
        Some(Name::new(shard, local))
    }

    /// Number of distinct strings, the empty string included.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Always false: the empty string is interned up front.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
