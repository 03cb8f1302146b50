//! Attribute name interning
//!
//! Attribute names repeat on nearly every node line, so each snapshot stores
//! every distinct name once and refers to it by [`AttrId`].

use crate::error::Result;
use crate::types::AttrId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct Interner {
    names: Vec<Arc<str>>,
    ids: HashMap<Arc<str>, AttrId>,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    /// Return the id for `name`, allocating one on first sight
    pub fn intern(&mut self, name: &str) -> Result<AttrId> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let id = AttrId::new(self.names.len())?;
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.ids.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<AttrId> {
        self.ids.get(name).copied()
    }

    pub fn resolve(&self, id: AttrId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in first-interned order
    pub fn iter(&self) -> impl Iterator<Item = (AttrId, &str)> {
        self.names
            .iter()
            .zip((0u32..).map(AttrId))
            .map(|(name, id)| (id, name.as_ref()))
    }
}
