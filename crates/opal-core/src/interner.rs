//! String interner for identifier storage.
//!
//! Deduplicates strings and assigns each unique string a [`Name`] handle,
//! so symbol comparison is an integer compare.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// An interned string identifier.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize)]
pub struct Name(pub u32);

#[derive(Debug, Default)]
struct Tables {
    map: HashMap<Arc<str>, Name>,
    strings: Vec<Arc<str>>,
}

/// A thread-safe string interner.
#[derive(Debug, Default)]
pub struct Interner {
    tables: Mutex<Tables>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its unique [`Name`].
    pub fn intern(&self, s: &str) -> Name {
        let mut tables = self.tables.lock();
        if let Some(&name) = tables.map.get(s) {
            return name;
        }
        let key: Arc<str> = Arc::from(s);
        let name = Name(tables.strings.len() as u32);
        tables.strings.push(key.clone());
        tables.map.insert(key, name);
        name
    }

    /// Get the string for a previously interned [`Name`].
    pub fn str(&self, name: Name) -> Arc<str> {
        self.tables.lock().strings[name.0 as usize].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes() {
        let interner = Interner::new();
        assert_eq!(interner.intern("add"), interner.intern("add"));
        assert_ne!(interner.intern("add"), interner.intern("sub"));
        assert_eq!(&*interner.str(interner.intern("add")), "add");
    }
}
