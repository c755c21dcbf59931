//! Dense integer identifiers for firms and companies (spec.md §4.1: "no
//! string comparisons appear on any hot path"). An [`Interner`] assigns ids
//! in first-seen order starting at 0 and keeps the reverse name lookup for
//! display/output purposes only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

macro_rules! dense_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

dense_id!(FirmId);
dense_id!(CompanyId);

/// Assigns dense ids to names in first-seen order. Bidirectional so the
/// panel writer can re-attach display names without a join.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Interner<Id> {
    name_to_id: HashMap<String, Id>,
    id_to_name: Vec<String>,
}

impl<Id> Interner<Id>
where
    Id: Copy + From<u32> + Into<u32>,
{
    pub fn new() -> Self {
        Self {
            name_to_id: HashMap::new(),
            id_to_name: Vec::new(),
        }
    }

    /// Returns the existing id for `name`, or assigns the next dense id.
    pub fn intern(&mut self, name: &str) -> Id {
        if let Some(id) = self.name_to_id.get(name) {
            return *id;
        }
        let id = Id::from(self.id_to_name.len() as u32);
        self.id_to_name.push(name.to_string());
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<Id> {
        self.name_to_id.get(name).copied()
    }

    pub fn name(&self, id: Id) -> &str {
        &self.id_to_name[id.into() as usize]
    }

    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}

impl From<u32> for FirmId {
    fn from(v: u32) -> Self {
        FirmId(v)
    }
}
impl From<FirmId> for u32 {
    fn from(v: FirmId) -> Self {
        v.0
    }
}
impl From<u32> for CompanyId {
    fn from(v: u32) -> Self {
        CompanyId(v)
    }
}
impl From<CompanyId> for u32 {
    fn from(v: CompanyId) -> Self {
        v.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_dense_and_stable() {
        let mut interner: Interner<FirmId> = Interner::new();
        let a = interner.intern("Sequoia");
        let b = interner.intern("Accel");
        let a_again = interner.intern("Sequoia");
        assert_eq!(a, a_again);
        assert_eq!(a.0, 0);
        assert_eq!(b.0, 1);
        assert_eq!(interner.name(a), "Sequoia");
        assert_eq!(interner.len(), 2);
    }
}
