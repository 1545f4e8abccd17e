use std::collections::HashMap;

use crate::parse::{EvaluateContainer, StackFrame, Thread};

/// What a cached reply answered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Threads,
    StackTrace,
    ScopeVariables,
    VariableType(String),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Threads(Vec<Thread>),
    StackTrace(Vec<StackFrame>),
    ScopeVariables(Vec<String>),
    VariableType(String),
    Variable(EvaluateContainer),
}

pub(crate) trait Cached: Sized {
    fn from_value(value: &QueryValue) -> Option<Self>;
    fn into_value(self) -> QueryValue;
}

macro_rules! cached {
    ($variant:ident, $ty:ty) => {
        impl Cached for $ty {
            fn from_value(value: &QueryValue) -> Option<Self> {
                match value {
                    QueryValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> QueryValue {
                QueryValue::$variant(self)
            }
        }
    };
}

cached!(Threads, Vec<Thread>);
cached!(StackTrace, Vec<StackFrame>);
cached!(ScopeVariables, Vec<String>);
cached!(VariableType, String);
cached!(Variable, EvaluateContainer);

/// Replies to read-only queries, valid until execution moves.
///
/// Every [`clear`](QueryCache::clear) starts a new generation. A reply is
/// only stored if no clear happened since its query was issued.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, QueryValue>,
    generation: u64,
}

impl QueryCache {
    pub(crate) fn get<T: Cached>(&self, key: &QueryKey) -> Option<T> {
        self.entries.get(key).and_then(T::from_value)
    }

    /// The generation a query issued now belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store `value` unless the cache was cleared after `generation` began.
    /// Returns whether the value was stored.
    pub(crate) fn insert<T: Cached>(&mut self, key: QueryKey, generation: u64, value: T) -> bool {
        if generation != self.generation {
            tracing::debug!(?key, "dropping reply from before execution moved");
            return false;
        }
        self.entries.insert(key, value.into_value());
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookups() {
        let mut cache = QueryCache::default();
        let generation = cache.generation();
        cache.insert(QueryKey::ScopeVariables, generation, vec!["m".to_string()]);
        cache.insert(
            QueryKey::VariableType("m".into()),
            generation,
            "roAssociativeArray".to_string(),
        );

        assert_eq!(
            cache.get::<Vec<String>>(&QueryKey::ScopeVariables),
            Some(vec!["m".to_string()])
        );
        assert_eq!(
            cache.get::<String>(&QueryKey::VariableType("m".into())),
            Some("roAssociativeArray".to_string())
        );
        assert_eq!(cache.get::<String>(&QueryKey::VariableType("x".into())), None);
        // wrong type for the key
        assert_eq!(cache.get::<String>(&QueryKey::ScopeVariables), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn replies_from_before_a_clear_are_dropped() {
        let mut cache = QueryCache::default();
        let before = cache.generation();
        cache.clear();

        assert!(!cache.insert(QueryKey::Threads, before, Vec::<Thread>::new()));
        assert!(cache.is_empty());

        let after = cache.generation();
        assert!(cache.insert(QueryKey::ScopeVariables, after, vec!["m".to_string()]));
        assert_eq!(cache.len(), 1);
    }
}
