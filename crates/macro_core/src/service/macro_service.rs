//! Macro use-case service.
//!
//! # Responsibility
//! - Provide get/list/save/delete entry points for macros.
//! - Serve macro property type plugin lookups.
//!
//! # Invariants
//! - Every call opens its own unit of work and resolves its own repository.
//! - `save` and `delete` commit exactly once, and only after the repository
//!   write succeeded.
//! - Collaborator errors are returned unchanged.
//! - The service holds no macro state.

use crate::model::macro_entity::Macro;
use crate::model::property_type::MacroPropertyType;
use crate::registry::{self, MacroPropertyTypeRegistry};
use crate::repo::macro_repo::RepoResult;
use crate::uow::{UnitOfWork, UnitOfWorkProvider};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

/// Service facade over a unit-of-work provider.
pub struct MacroService<P: UnitOfWorkProvider> {
    provider: P,
    property_types: Arc<MacroPropertyTypeRegistry>,
}

impl<P: UnitOfWorkProvider> MacroService<P> {
    /// Creates a service backed by the process-wide property type registry.
    ///
    /// Runs one `get_all` warm-up through the provider; its result is
    /// discarded and its error returned.
    pub fn new(provider: P) -> RepoResult<Self> {
        Self::with_registry(provider, registry::current())
    }

    /// Creates a service with an explicit property type registry.
    pub fn with_registry(
        provider: P,
        property_types: Arc<MacroPropertyTypeRegistry>,
    ) -> RepoResult<Self> {
        let service = Self {
            provider,
            property_types,
        };
        service.warm_up()?;
        Ok(service)
    }

    fn warm_up(&self) -> RepoResult<()> {
        let started_at = Instant::now();
        match self.get_all::<&str>(&[]) {
            Ok(macros) => {
                info!(
                    "event=macro_warm_up module=service status=ok count={} duration_ms={}",
                    macros.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=macro_warm_up module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Gets one macro by alias. The alias is passed to the repository as-is.
    pub fn get_by_alias(&self, alias: &str) -> RepoResult<Option<Macro>> {
        let uow = self.provider.unit_of_work()?;
        let repo = uow.macro_repository()?;
        repo.get(alias)
    }

    /// Lists macros, limited to `aliases` when non-empty.
    pub fn get_all<S: AsRef<str>>(&self, aliases: &[S]) -> RepoResult<Vec<Macro>> {
        let aliases: Vec<&str> = aliases.iter().map(AsRef::as_ref).collect();
        let uow = self.provider.unit_of_work()?;
        let repo = uow.macro_repository()?;
        repo.get_all(&aliases)
    }

    /// Inserts or updates a macro and commits.
    pub fn save(&self, entity: &Macro) -> RepoResult<()> {
        let uow = self.provider.unit_of_work()?;
        uow.macro_repository()?.add_or_update(entity)?;
        uow.commit()?;
        info!(
            "event=macro_save module=service status=ok alias={}",
            entity.alias
        );
        Ok(())
    }

    /// Deletes a macro and commits.
    pub fn delete(&self, entity: &Macro) -> RepoResult<()> {
        let uow = self.provider.unit_of_work()?;
        uow.macro_repository()?.delete(entity)?;
        uow.commit()?;
        info!(
            "event=macro_delete module=service status=ok alias={}",
            entity.alias
        );
        Ok(())
    }

    /// Returns every registered property type in registration order.
    pub fn get_macro_property_types(&self) -> &[MacroPropertyType] {
        self.property_types.all()
    }

    /// Returns the first property type whose alias equals `alias`.
    pub fn get_macro_property_type_by_alias(&self, alias: &str) -> Option<&MacroPropertyType> {
        self.property_types.find_by_alias(alias)
    }

    /// Returns the unit-of-work provider the service runs against.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::MacroService;
    use crate::model::macro_entity::Macro;
    use crate::registry::MacroPropertyTypeRegistry;
    use crate::uow::InMemoryUnitOfWorkProvider;
    use std::sync::Arc;

    fn service() -> MacroService<InMemoryUnitOfWorkProvider> {
        MacroService::with_registry(
            InMemoryUnitOfWorkProvider::new(),
            Arc::new(MacroPropertyTypeRegistry::with_builtins()),
        )
        .expect("service warm-up")
    }

    #[test]
    fn save_then_get_by_alias() {
        let service = service();
        let entity = Macro::new("siteMap", "Site map");
        service.save(&entity).expect("save");

        let loaded = service
            .get_by_alias("siteMap")
            .expect("get")
            .expect("saved macro");
        assert_eq!(loaded, entity);
        assert!(service.get_by_alias("").expect("blank alias").is_none());
    }

    #[test]
    fn get_all_filters_by_alias() {
        let service = service();
        for alias in ["a", "b", "c"] {
            service.save(&Macro::new(alias, alias)).expect("save");
        }

        assert_eq!(service.get_all::<&str>(&[]).expect("all").len(), 3);
        let filtered = service.get_all(&["c", "a", "missing"]).expect("filtered");
        let aliases: Vec<_> = filtered.iter().map(|m| m.alias.as_str()).collect();
        assert_eq!(aliases, vec!["a", "c"]);
    }

    #[test]
    fn delete_removes_macro() {
        let service = service();
        let entity = Macro::new("gone", "Gone");
        service.save(&entity).expect("save");
        service.delete(&entity).expect("delete");
        assert!(service.get_by_alias("gone").expect("get").is_none());
        assert_eq!(service.provider().committed_len(), 0);
    }
}
