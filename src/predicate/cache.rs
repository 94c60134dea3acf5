//! Expression parsing cache - fast hashing behind a read-mostly lock

use crate::error::Result;
use crate::predicate::ast::Expression;
use crate::predicate::parser;
use crate::value::FieldSource;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Entry limit of the process-wide cache
pub const SHARED_CACHE_LIMIT: usize = 4096;

/// Process-wide cache for callers that don't keep their own
static SHARED_CACHE: Lazy<ExpressionCache> = Lazy::new(|| ExpressionCache::bounded(SHARED_CACHE_LIMIT));

/// Memoizes parsed expression strings.
///
/// Entries are never evicted. A bounded cache stops storing new strings once
/// full and parses them on every call instead.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: RwLock<AHashMap<String, Expression>>,
    max_entries: Option<usize>,
}

impl ExpressionCache {
    /// An unbounded cache
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::with_capacity(capacity)),
            max_entries: None,
        }
    }

    /// A cache holding at most `max_entries` strings
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    /// The process-wide cache, bounded to [`SHARED_CACHE_LIMIT`] entries
    pub fn shared() -> &'static ExpressionCache {
        &SHARED_CACHE
    }

    /// Get or parse an expression string
    pub fn get_or_parse(&self, text: &str) -> Result<Expression> {
        let key = text.trim();

        // Fast path: check read lock first
        {
            let entries = self.entries.read();
            if let Some(expr) = entries.get(key) {
                return Ok(expr.clone());
            }
        }

        // Slow path: parse and cache; failures are not cached
        let expr = parser::parse(key)?;
        let mut entries = self.entries.write();
        if self.max_entries.map_or(true, |max| entries.len() < max) {
            entries.insert(key.to_string(), expr.clone());
        }
        Ok(expr)
    }

    /// Check an expression string against a record. Empty text always holds.
    pub fn check<R: FieldSource + ?Sized>(&self, text: &str, record: &R) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(true);
        }
        self.get_or_parse(text)?.evaluate(record)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
