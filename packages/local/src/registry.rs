//! A prefix trie keyed by address components.

use std::collections::BTreeMap;

use crate::address::Address;

/// A prefix trie keyed by address components.
///
/// Each node can optionally hold a value of type T, and has children
/// indexed by component. Lookups cost O(k) in the address depth. Removing a
/// value prunes branches left without values.
///
/// # Example
///
/// ```rust
/// use ipctree_local::{address, AddressTrie};
///
/// let mut trie: AddressTrie<i32> = AddressTrie::new();
/// trie.insert(&address!("/a/b"), 1);
/// trie.insert(&address!("/a/c"), 2);
///
/// assert_eq!(trie.get(&address!("/a/b")), Some(&1));
/// assert_eq!(trie.child_names(&address!("/a")), vec!["b", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct AddressTrie<T> {
    value: Option<T>,
    children: BTreeMap<String, AddressTrie<T>>,
}

impl<T> Default for AddressTrie<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> AddressTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_node(&mut self, address: &Address) -> &mut AddressTrie<T> {
        let mut current = self;
        for component in address.components() {
            current = current.children.entry(component.clone()).or_default();
        }
        current
    }

    fn get_node(&self, address: &Address) -> Option<&AddressTrie<T>> {
        let mut current = self;
        for component in address.components() {
            current = current.children.get(component)?;
        }
        Some(current)
    }

    fn get_node_mut(&mut self, address: &Address) -> Option<&mut AddressTrie<T>> {
        let mut current = self;
        for component in address.components() {
            current = current.children.get_mut(component)?;
        }
        Some(current)
    }

    /// Insert a value at address. Returns previous value if any.
    pub fn insert(&mut self, address: &Address, value: T) -> Option<T> {
        self.get_or_create_node(address).value.replace(value)
    }

    /// Get the value at address, inserting one from `make` if absent.
    pub fn get_or_insert_with(&mut self, address: &Address, make: impl FnOnce() -> T) -> &mut T {
        self.get_or_create_node(address).value.get_or_insert_with(make)
    }

    /// Remove and return the value at address. Empty branches are pruned.
    pub fn remove(&mut self, address: &Address) -> Option<T> {
        let removed = self.get_node_mut(address)?.value.take();
        if removed.is_some() {
            self.prune(address.components());
        }
        removed
    }

    // Returns whether this node is now empty and can be dropped by its parent.
    fn prune(&mut self, components: &[String]) -> bool {
        if let Some((first, rest)) = components.split_first() {
            if let Some(child) = self.children.get_mut(first) {
                if child.prune(rest) {
                    self.children.remove(first);
                }
            }
        }
        self.value.is_none() && self.children.is_empty()
    }

    pub fn get(&self, address: &Address) -> Option<&T> {
        self.get_node(address)?.value.as_ref()
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut T> {
        self.get_node_mut(address)?.value.as_mut()
    }

    /// Check if exact address has a value.
    pub fn contains(&self, address: &Address) -> bool {
        self.get(address).is_some()
    }

    /// Names of the direct children below address, with or without values.
    pub fn child_names(&self, address: &Address) -> Vec<String> {
        self.get_node(address)
            .map(|node| node.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if address has a value or anything below it.
    pub fn contains_branch(&self, address: &Address) -> bool {
        self.get_node(address).is_some()
    }

    /// Count of values in trie (not nodes).
    pub fn len(&self) -> usize {
        let own = usize::from(self.value.is_some());
        own + self.children.values().map(AddressTrie::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.values().all(AddressTrie::is_empty)
    }

    /// Iterate over all (address, value) pairs in address order.
    pub fn iter(&self) -> AddressTrieIter<'_, T> {
        AddressTrieIter {
            stack: vec![(Address::root(), self)],
        }
    }
}

/// Iterator over (Address, &T) pairs in an AddressTrie.
pub struct AddressTrieIter<'a, T> {
    stack: Vec<(Address, &'a AddressTrie<T>)>,
}

impl<'a, T> Iterator for AddressTrieIter<'a, T> {
    type Item = (Address, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((address, node)) = self.stack.pop() {
            // Reverse so the smallest child is visited first
            for (name, child) in node.children.iter().rev() {
                if let Ok(child_address) = address.child(name) {
                    self.stack.push((child_address, child));
                }
            }

            if let Some(value) = &node.value {
                return Some((address, value));
            }
        }
        None
    }
}
