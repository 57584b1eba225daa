use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// An interned symbol: a small integer standing for a name held by an [`Alphabet`].
/// Two symbols from the same alphabet are equal iff their names are equal.
pub trait Symbol: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync {
    /// Human readable kind used in error messages
    const KIND: &'static str;

    fn from_index(ix: usize) -> Self;

    fn index(self) -> usize;
}

macro_rules! symbol {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) usize);

        impl Symbol for $name {
            const KIND: &'static str = $kind;

            fn from_index(ix: usize) -> Self {
                $name(ix)
            }

            fn index(self) -> usize {
                self.0
            }
        }
    };
}

symbol!(
    /// A world state of the Dec-POMDP
    State, "state"
);
symbol!(
    /// An action of one agent, interned in that agent's action alphabet
    Action, "action"
);
symbol!(
    /// An observation of one agent, interned in that agent's observation alphabet
    Observation, "observation"
);
symbol!(
    /// A control state of one agent's finite state controller. Ids are handed out by the
    /// controller and never reused, the node's name is `<agent>-Q<id>`.
    Node, "node"
);

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// Bidirectional name <-> symbol table
#[derive(Clone)]
pub struct Alphabet<T> {
    names: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, usize>,
    marker: PhantomData<T>,
}

impl<T: Symbol> Alphabet<T> {
    pub fn new() -> Alphabet<T> {
        Alphabet {
            names: Vec::new(),
            lookup: HashMap::new(),
            marker: PhantomData,
        }
    }

    /// Builds an alphabet from distinct names, in order
    pub fn from_names<I, S>(names: I) -> Result<Alphabet<T>, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut alphabet = Alphabet::new();
        for name in names {
            let name = name.as_ref();
            if alphabet.lookup.contains_key(name) {
                return Err(ModelError::DuplicateSymbol { kind: T::KIND, name: name.to_string() });
            }
            alphabet.intern(name);
        }
        Ok(alphabet)
    }

    /// Returns the symbol for `name`, adding it if it is new
    pub fn intern(&mut self, name: &str) -> T {
        if let Some(ix) = self.lookup.get(name) {
            return T::from_index(*ix);
        }
        let name: Arc<str> = Arc::from(name);
        self.names.push(name.clone());
        self.lookup.insert(name, self.names.len() - 1);
        T::from_index(self.names.len() - 1)
    }

    pub fn get(&self, name: &str) -> Result<T, ModelError> {
        self.lookup.get(name)
            .map(|ix| T::from_index(*ix))
            .ok_or_else(|| ModelError::UnknownSymbol { kind: T::KIND, name: name.to_string() })
    }

    /// Name of a symbol, `?` for symbols of another alphabet
    pub fn name(&self, symbol: T) -> &str {
        self.names.get(symbol.index()).map(|n| &**n).unwrap_or("?")
    }

    pub fn contains(&self, symbol: T) -> bool {
        symbol.index() < self.names.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.names.len()).map(T::from_index)
    }
}

impl<T: Symbol> Default for Alphabet<T> {
    fn default() -> Self {
        Alphabet::new()
    }
}

impl<T: Symbol> fmt::Debug for Alphabet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names.iter()).finish()
    }
}
