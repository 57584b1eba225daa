use std::collections::HashMap;

/// Collects a slice of key value pairs into a map
pub trait ToMap<A, B> {
    fn to_map(&self) -> HashMap<A, B>;
}

impl<T, U> ToMap<T, U> for [(T, U)] where
    T: Clone + std::hash::Hash + std::cmp::Eq, U: Clone {
    fn to_map(&self) -> HashMap<T, U> {
        self.iter().cloned().collect()
    }
}
