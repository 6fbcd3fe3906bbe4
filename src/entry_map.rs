use std::collections::BTreeMap;

use crate::{DIDURL, Error};

/// Implemented by everything a DID document stores keyed by DIDURL: public
/// keys, credentials, and services.
pub trait DIDEntry {
    fn id(&self) -> &DIDURL;
    /// The entry's type string, if the entry kind carries one (used by the
    /// `select` filters).
    fn entry_type(&self) -> Option<&str>;
}

/// An ordered map of document entries keyed by their DIDURL id.  Iteration
/// order is the DIDURL ordering (case-insensitive ascending), which is also
/// the canonical serialization order, so every consumer sees entries the way
/// they are signed.
///
/// One generic implementation serves public keys, credentials, and services;
/// filtering is predicate-based and lazy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EntryMap<T: DIDEntry> {
    map: BTreeMap<DIDURL, T>,
}

impl<T: DIDEntry> EntryMap<T> {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn contains(&self, id: &DIDURL) -> bool {
        self.map.contains_key(id)
    }
    pub fn get(&self, id: &DIDURL) -> Option<&T> {
        self.map.get(id)
    }
    pub fn get_mut(&mut self, id: &DIDURL) -> Option<&mut T> {
        self.map.get_mut(id)
    }
    /// Insert the entry, rejecting a duplicate id.
    pub fn append(&mut self, entry: T) -> Result<(), Error> {
        let id = entry.id().clone();
        if self.map.contains_key(&id) {
            return Err(Error::AlreadyExists(
                format!("entry already exists: {}", id).into(),
            ));
        }
        self.map.insert(id, entry);
        Ok(())
    }
    pub fn remove(&mut self, id: &DIDURL) -> Option<T> {
        self.map.remove(id)
    }
    /// All entries in canonical (id-ascending) order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.map.values()
    }
    /// Lazily filter entries by predicate, in canonical order.
    pub fn filtered<'s, F>(&'s self, fulfill: F) -> impl Iterator<Item = &'s T>
    where
        F: Fn(&T) -> bool + 's,
    {
        self.map.values().filter(move |entry| fulfill(entry))
    }
    pub fn count<F>(&self, fulfill: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.map.values().filter(|entry| fulfill(entry)).count()
    }
    /// Select entries matching an optional id and/or an optional type, plus a
    /// predicate.  At least one of id and type should be given by callers;
    /// with neither, this degenerates to `filtered`.
    pub fn select<'s, F>(
        &'s self,
        id_o: Option<&'s DIDURL>,
        type_o: Option<&'s str>,
        fulfill: F,
    ) -> impl Iterator<Item = &'s T>
    where
        F: Fn(&T) -> bool + 's,
    {
        self.map.values().filter(move |entry| {
            if let Some(id) = id_o {
                if entry.id() != id {
                    return false;
                }
            }
            if let Some(r#type) = type_o {
                if entry.entry_type() != Some(r#type) {
                    return false;
                }
            }
            fulfill(entry)
        })
    }
}
