use crate::error::ModelError;
use serde::Serialize;
use std::fmt;
use std::ops::Index;

/// A fixed length tuple with one entry per agent, used for joint actions, joint observations
/// and node combinations. Equality, hashing and ordering are positional.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Vector<T>(Box<[T]>);

impl<T: Clone> Vector<T> {
    pub fn new(entries: Vec<T>) -> Vector<T> {
        Vector(entries.into_boxed_slice())
    }

    /// Builds a vector and checks it has exactly `agents` entries
    pub fn with_len(entries: Vec<T>, agents: usize) -> Result<Vector<T>, ModelError> {
        if entries.len() != agents {
            return Err(ModelError::DimensionMismatch { expected: agents, got: entries.len() });
        }
        Ok(Vector::new(entries))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, agent: usize) -> Option<&T> {
        self.0.get(agent)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    /// Copy of this vector with the entry of `agent` swapped for `t`
    pub fn with(&self, agent: usize, t: T) -> Vector<T> {
        let mut entries = self.0.to_vec();
        entries[agent] = t;
        Vector::new(entries)
    }

    pub fn check_len(&self, agents: usize) -> Result<(), ModelError> {
        if self.0.len() != agents {
            return Err(ModelError::DimensionMismatch { expected: agents, got: self.0.len() });
        }
        Ok(())
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, agent: usize) -> &T {
        &self.0[agent]
    }
}

impl<T: Clone> From<Vec<T>> for Vector<T> {
    fn from(entries: Vec<T>) -> Self {
        Vector::new(entries)
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, ">")
    }
}
