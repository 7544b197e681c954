//! In-memory unit of work.
//!
//! Writes are staged per unit of work and applied to the shared store under
//! one lock on commit. Reads see the committed store plus the unit's own
//! staged writes.

use super::{UnitOfWork, UnitOfWorkProvider};
use crate::model::macro_entity::{Macro, MacroId};
use crate::repo::macro_repo::{MacroRepository, RepoError, RepoResult};
use log::debug;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type MacroStore = BTreeMap<MacroId, Macro>;

/// Provider sharing one in-memory macro store between units of work.
///
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUnitOfWorkProvider {
    store: Arc<Mutex<MacroStore>>,
}

impl InMemoryUnitOfWorkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed macros.
    pub fn committed_len(&self) -> usize {
        lock(&self.store).len()
    }
}

impl UnitOfWorkProvider for InMemoryUnitOfWorkProvider {
    type UnitOfWork<'a> = InMemoryUnitOfWork<'a>;

    fn unit_of_work(&self) -> RepoResult<InMemoryUnitOfWork<'_>> {
        Ok(InMemoryUnitOfWork {
            store: &self.store,
            staged: RefCell::new(Vec::new()),
        })
    }
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Upsert(Macro),
    Delete(MacroId),
}

/// Staged writes against an in-memory store.
pub struct InMemoryUnitOfWork<'a> {
    store: &'a Mutex<MacroStore>,
    staged: RefCell<Vec<StagedWrite>>,
}

impl InMemoryUnitOfWork<'_> {
    fn view(&self) -> RepoResult<MacroStore> {
        let mut view = lock(self.store).clone();
        apply(&mut view, self.staged.borrow().iter().cloned())?;
        Ok(view)
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn macro_repository(&self) -> RepoResult<Box<dyn MacroRepository + '_>> {
        Ok(Box::new(InMemoryMacroRepository { uow: self }))
    }

    fn commit(self) -> RepoResult<()> {
        let staged = self.staged.into_inner();
        let writes = staged.len();
        let mut store = lock(self.store);
        // Re-applied on a copy so a conflict committed meanwhile leaves the
        // store untouched.
        let mut next = store.clone();
        apply(&mut next, staged)?;
        *store = next;
        debug!("event=uow_commit module=uow status=ok backend=memory writes={writes}");
        Ok(())
    }
}

struct InMemoryMacroRepository<'u, 'a> {
    uow: &'u InMemoryUnitOfWork<'a>,
}

impl MacroRepository for InMemoryMacroRepository<'_, '_> {
    fn get(&self, alias: &str) -> RepoResult<Option<Macro>> {
        Ok(self
            .uow
            .view()?
            .into_values()
            .find(|entity| entity.alias == alias))
    }

    fn get_all(&self, aliases: &[&str]) -> RepoResult<Vec<Macro>> {
        let mut macros: Vec<Macro> = self
            .uow
            .view()?
            .into_values()
            .filter(|entity| aliases.is_empty() || aliases.contains(&entity.alias.as_str()))
            .collect();
        macros.sort_by(|left, right| left.alias.cmp(&right.alias));
        Ok(macros)
    }

    fn add_or_update(&self, entity: &Macro) -> RepoResult<()> {
        entity.validate()?;
        let mut view = self.uow.view()?;
        let write = StagedWrite::Upsert(entity.clone());
        apply(&mut view, [write.clone()])?;
        self.uow.staged.borrow_mut().push(write);
        Ok(())
    }

    fn delete(&self, entity: &Macro) -> RepoResult<()> {
        if !self.uow.view()?.contains_key(&entity.id) {
            return Err(RepoError::NotFound(entity.alias.clone()));
        }
        self.uow
            .staged
            .borrow_mut()
            .push(StagedWrite::Delete(entity.id));
        Ok(())
    }

    fn exists(&self, alias: &str) -> RepoResult<bool> {
        Ok(self.get(alias)?.is_some())
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.uow.view()?.len() as u64)
    }
}

fn apply(store: &mut MacroStore, writes: impl IntoIterator<Item = StagedWrite>) -> RepoResult<()> {
    for write in writes {
        match write {
            StagedWrite::Upsert(entity) => {
                let taken = store
                    .values()
                    .any(|other| other.alias == entity.alias && other.id != entity.id);
                if taken {
                    return Err(RepoError::DuplicateAlias(entity.alias));
                }
                store.insert(entity.id, entity);
            }
            StagedWrite::Delete(id) => {
                store.remove(&id);
            }
        }
    }
    Ok(())
}

fn lock(store: &Mutex<MacroStore>) -> MutexGuard<'_, MacroStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
