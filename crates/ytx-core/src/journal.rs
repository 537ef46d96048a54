// crates/ytx-core/src/journal.rs
//
// Journaled state containers giving every external call all-or-nothing
// semantics.
//
// While a savepoint is open, each write records the value it replaced. On
// rollback the undo log is replayed backwards to the most recent savepoint;
// on commit the savepoint marker is dropped and its entries fold into the
// enclosing savepoint (or are discarded at the outermost level). Savepoints
// nest, so a ledger transfer can be atomic on its own and also part of a
// larger protocol call.
//
// Cost of rollback is proportional to the number of writes made inside the
// savepoint, never to the size of the table.

use std::collections::HashMap;
use std::hash::Hash;

/// State that can be checkpointed and restored.
pub trait Transactional {
    /// Open a (possibly nested) savepoint.
    fn begin(&mut self);

    /// Close the innermost savepoint, keeping its writes.
    fn commit(&mut self);

    /// Close the innermost savepoint, discarding its writes.
    fn rollback(&mut self);
}

/// Run `op` inside a savepoint on `state`, committing on `Ok` and rolling
/// back on `Err`.
pub fn atomically<S, T, E, F>(state: &mut S, op: F) -> Result<T, E>
where
    S: Transactional + ?Sized,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    state.begin();
    match op(state) {
        Ok(value) => {
            state.commit();
            Ok(value)
        }
        Err(e) => {
            state.rollback();
            Err(e)
        }
    }
}

/// A hash map whose writes can be undone back to a savepoint.
#[derive(Debug, Clone)]
pub struct JournaledMap<K, V> {
    rows: HashMap<K, V>,
    undo: Vec<(K, Option<V>)>,
    marks: Vec<usize>,
}

impl<K, V> Default for JournaledMap<K, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            undo: Vec::new(),
            marks: Vec::new(),
        }
    }
}

impl<K, V> JournaledMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    /// Insert or replace a row, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.rows.insert(key.clone(), value);
        if !self.marks.is_empty() {
            self.undo.push((key, previous.clone()));
        }
        previous
    }

    /// Remove a row, returning it.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let previous = self.rows.remove(key);
        if !self.marks.is_empty() && previous.is_some() {
            self.undo.push((key.clone(), previous.clone()));
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.rows.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    /// Number of savepoints currently open.
    pub fn depth(&self) -> usize {
        self.marks.len()
    }
}

impl<K, V> Transactional for JournaledMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn begin(&mut self) {
        self.marks.push(self.undo.len());
    }

    fn commit(&mut self) {
        self.marks.pop();
        if self.marks.is_empty() {
            self.undo.clear();
        }
    }

    fn rollback(&mut self) {
        let Some(mark) = self.marks.pop() else {
            return;
        };
        while self.undo.len() > mark {
            let Some((key, previous)) = self.undo.pop() else {
                break;
            };
            match previous {
                Some(value) => {
                    self.rows.insert(key, value);
                }
                None => {
                    self.rows.remove(&key);
                }
            }
        }
    }
}

/// A single value whose writes can be undone back to a savepoint.
#[derive(Debug, Clone, Default)]
pub struct JournaledCell<T> {
    value: T,
    saved: Vec<T>,
}

impl<T: Clone> JournaledCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            saved: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }
}

impl<T: Copy> JournaledCell<T> {
    /// Copy out the current value.
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Clone> Transactional for JournaledCell<T> {
    fn begin(&mut self) {
        self.saved.push(self.value.clone());
    }

    fn commit(&mut self) {
        self.saved.pop();
    }

    fn rollback(&mut self) {
        if let Some(value) = self.saved.pop() {
            self.value = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_without_savepoint_are_direct() {
        let mut map: JournaledMap<u8, u32> = JournaledMap::new();
        map.insert(1, 10);
        map.rollback();
        assert_eq!(map.get(&1), Some(&10));
    }

    #[test]
    fn test_rollback_restores_previous_rows() {
        let mut map = JournaledMap::new();
        map.insert("a", 1u32);
        map.begin();
        map.insert("a", 2);
        map.insert("b", 3);
        map.remove(&"a");
        map.rollback();
        assert_eq!(map.get(&"a"), Some(&1));
        assert_eq!(map.get(&"b"), None);
        assert_eq!(map.depth(), 0);
    }

    #[test]
    fn test_commit_keeps_rows() {
        let mut map = JournaledMap::new();
        map.begin();
        map.insert(7u64, "seven".to_string());
        map.commit();
        assert_eq!(map.get(&7).map(String::as_str), Some("seven"));
    }

    #[test]
    fn test_nested_commit_then_outer_rollback() {
        let mut map = JournaledMap::new();
        map.insert(1u8, 100u32);
        map.begin();
        map.insert(1, 200);
        map.begin();
        map.insert(1, 300);
        map.commit();
        assert_eq!(map.get(&1), Some(&300));
        map.rollback();
        assert_eq!(map.get(&1), Some(&100));
    }

    #[test]
    fn test_nested_rollback_keeps_outer_writes() {
        let mut map = JournaledMap::new();
        map.begin();
        map.insert(1u8, 1u32);
        map.begin();
        map.insert(2, 2);
        map.rollback();
        map.commit();
        assert_eq!(map.get(&1), Some(&1));
        assert_eq!(map.get(&2), None);
    }

    #[test]
    fn test_cell_rollback() {
        let mut cell = JournaledCell::new(5u128);
        cell.begin();
        cell.set(9);
        cell.begin();
        cell.set(11);
        cell.commit();
        assert_eq!(cell.value(), 11);
        cell.rollback();
        assert_eq!(cell.value(), 5);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let mut cell = JournaledCell::new(1u64);
        let result: Result<(), &str> = atomically(&mut cell, |c| {
            c.set(2);
            Err("boom")
        });
        assert!(result.is_err());
        assert_eq!(cell.value(), 1);

        let ok: Result<u64, &str> = atomically(&mut cell, |c| {
            c.set(3);
            Ok(c.value())
        });
        assert_eq!(ok, Ok(3));
        assert_eq!(cell.value(), 3);
    }
}
