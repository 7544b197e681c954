use macro_core::model::property_type::MacroPropertyBaseType;
use macro_core::{
    InMemoryUnitOfWorkProvider, Macro, MacroPropertyType, MacroPropertyTypeRegistry,
    MacroRepository, MacroService, RepoError, RepoResult, SqliteUnitOfWorkProvider, UnitOfWork,
    UnitOfWorkProvider,
};
use rusqlite::Connection;
use std::cell::RefCell;
use std::sync::Arc;

/// Call log shared by the stub provider, its units of work and repositories.
#[derive(Debug, Default)]
struct StubLog {
    units_opened: usize,
    repositories_resolved: usize,
    commits: usize,
    get_all_filters: Vec<Vec<String>>,
    get_keys: Vec<String>,
    upserts: Vec<String>,
    deletes: Vec<String>,
}

struct StubProvider {
    log: RefCell<StubLog>,
    macros: Vec<Macro>,
    fail_writes: bool,
}

impl StubProvider {
    fn new(macros: Vec<Macro>) -> Self {
        Self {
            log: RefCell::new(StubLog::default()),
            macros,
            fail_writes: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new(Vec::new())
        }
    }
}

impl UnitOfWorkProvider for StubProvider {
    type UnitOfWork<'a> = StubUnitOfWork<'a>;

    fn unit_of_work(&self) -> RepoResult<StubUnitOfWork<'_>> {
        self.log.borrow_mut().units_opened += 1;
        Ok(StubUnitOfWork { provider: self })
    }
}

struct StubUnitOfWork<'a> {
    provider: &'a StubProvider,
}

impl UnitOfWork for StubUnitOfWork<'_> {
    fn macro_repository(&self) -> RepoResult<Box<dyn MacroRepository + '_>> {
        self.provider.log.borrow_mut().repositories_resolved += 1;
        Ok(Box::new(StubRepository {
            provider: self.provider,
        }))
    }

    fn commit(self) -> RepoResult<()> {
        self.provider.log.borrow_mut().commits += 1;
        Ok(())
    }
}

struct StubRepository<'a> {
    provider: &'a StubProvider,
}

impl MacroRepository for StubRepository<'_> {
    fn get(&self, alias: &str) -> RepoResult<Option<Macro>> {
        self.provider.log.borrow_mut().get_keys.push(alias.to_string());
        Ok(self
            .provider
            .macros
            .iter()
            .find(|entity| entity.alias == alias)
            .cloned())
    }

    fn get_all(&self, aliases: &[&str]) -> RepoResult<Vec<Macro>> {
        self.provider
            .log
            .borrow_mut()
            .get_all_filters
            .push(aliases.iter().map(|alias| alias.to_string()).collect());
        Ok(self.provider.macros.clone())
    }

    fn add_or_update(&self, entity: &Macro) -> RepoResult<()> {
        if self.provider.fail_writes {
            return Err(RepoError::InvalidData("stub write failure".to_string()));
        }
        self.provider
            .log
            .borrow_mut()
            .upserts
            .push(entity.alias.clone());
        Ok(())
    }

    fn delete(&self, entity: &Macro) -> RepoResult<()> {
        if self.provider.fail_writes {
            return Err(RepoError::NotFound(entity.alias.clone()));
        }
        self.provider
            .log
            .borrow_mut()
            .deletes
            .push(entity.alias.clone());
        Ok(())
    }

    fn exists(&self, alias: &str) -> RepoResult<bool> {
        Ok(self.provider.macros.iter().any(|entity| entity.alias == alias))
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.provider.macros.len() as u64)
    }
}

fn builtins() -> Arc<MacroPropertyTypeRegistry> {
    Arc::new(MacroPropertyTypeRegistry::with_builtins())
}

#[test]
fn construction_runs_one_unfiltered_get_all() {
    let service = MacroService::with_registry(StubProvider::new(Vec::new()), builtins()).unwrap();

    let log = service.provider().log.borrow();
    assert_eq!(log.units_opened, 1);
    assert_eq!(log.repositories_resolved, 1);
    assert_eq!(log.get_all_filters, vec![Vec::<String>::new()]);
    assert_eq!(log.commits, 0);
}

#[test]
fn save_and_delete_commit_exactly_once_per_call() {
    let service = MacroService::with_registry(StubProvider::new(Vec::new()), builtins()).unwrap();
    let entity = Macro::new("gallery", "Gallery");

    service.save(&entity).unwrap();
    assert_eq!(service.provider().log.borrow().commits, 1);

    service.delete(&entity).unwrap();
    assert_eq!(service.provider().log.borrow().commits, 2);

    service.save(&entity).unwrap();
    let log = service.provider().log.borrow();
    assert_eq!(log.commits, 3);
    assert_eq!(log.upserts, vec!["gallery", "gallery"]);
    assert_eq!(log.deletes, vec!["gallery"]);
}

#[test]
fn every_call_opens_a_fresh_unit_of_work_and_repository() {
    let service = MacroService::with_registry(StubProvider::new(Vec::new()), builtins()).unwrap();
    let entity = Macro::new("gallery", "Gallery");

    service.get_by_alias("gallery").unwrap();
    service.get_all(&["gallery"]).unwrap();
    service.save(&entity).unwrap();
    service.delete(&entity).unwrap();

    let log = service.provider().log.borrow();
    assert_eq!(log.units_opened, 5);
    assert_eq!(log.repositories_resolved, 5);
}

#[test]
fn reads_never_commit() {
    let service = MacroService::with_registry(StubProvider::new(Vec::new()), builtins()).unwrap();

    service.get_by_alias("anything").unwrap();
    service.get_all::<&str>(&[]).unwrap();

    assert_eq!(service.provider().log.borrow().commits, 0);
}

#[test]
fn get_all_without_filter_returns_collaborator_result_unmodified() {
    // Deliberately not alias-ordered.
    let macros = vec![
        Macro::new("zeta", "Zeta"),
        Macro::new("alpha", "Alpha"),
        Macro::new("alpha", "Alpha twin"),
    ];
    let service =
        MacroService::with_registry(StubProvider::new(macros.clone()), builtins()).unwrap();

    assert_eq!(service.get_all::<&str>(&[]).unwrap(), macros);
}

#[test]
fn get_all_forwards_filter_verbatim() {
    let service = MacroService::with_registry(StubProvider::new(Vec::new()), builtins()).unwrap();

    service.get_all(&["b".to_string(), "a".to_string(), "b".to_string()]).unwrap();

    let log = service.provider().log.borrow();
    assert_eq!(log.get_all_filters.last().unwrap(), &vec!["b", "a", "b"]);
}

#[test]
fn get_by_alias_forwards_blank_keys() {
    let service = MacroService::with_registry(StubProvider::new(Vec::new()), builtins()).unwrap();

    assert!(service.get_by_alias("").unwrap().is_none());
    assert!(service.get_by_alias("  not an alias  ").unwrap().is_none());

    let log = service.provider().log.borrow();
    assert_eq!(log.get_keys, vec!["", "  not an alias  "]);
}

#[test]
fn failed_writes_propagate_unchanged_and_do_not_commit() {
    let service = MacroService::with_registry(StubProvider::failing(), builtins()).unwrap();
    let entity = Macro::new("gallery", "Gallery");

    let save_err = service.save(&entity).unwrap_err();
    assert!(matches!(save_err, RepoError::InvalidData(message) if message == "stub write failure"));

    let delete_err = service.delete(&entity).unwrap_err();
    assert!(matches!(delete_err, RepoError::NotFound(alias) if alias == "gallery"));

    assert_eq!(service.provider().log.borrow().commits, 0);
}

#[test]
fn property_type_lookup_returns_first_match() {
    let mut registry = MacroPropertyTypeRegistry::with_builtins();
    registry
        .register(MacroPropertyType::new(
            "text",
            "custom.renderings",
            "richText",
            MacroPropertyBaseType::String,
        ))
        .unwrap();
    let service =
        MacroService::with_registry(StubProvider::new(Vec::new()), Arc::new(registry)).unwrap();

    let found = service.get_macro_property_type_by_alias("text").unwrap();
    assert_eq!(found.rendering_type, "text");
    assert_eq!(found.rendering_assembly, "macro.renderings");
    assert!(service.get_macro_property_type_by_alias("missing").is_none());
    assert!(service.get_macro_property_type_by_alias("").is_none());

    let all = service.get_macro_property_types();
    assert_eq!(all.last().unwrap().rendering_type, "richText");
}

#[test]
fn default_registry_serves_builtins() {
    let service = MacroService::new(StubProvider::new(Vec::new())).unwrap();

    assert!(!service.get_macro_property_types().is_empty());
    let number = service.get_macro_property_type_by_alias("number").unwrap();
    assert_eq!(number.base_type, MacroPropertyBaseType::Int32);
}

#[test]
fn sqlite_provider_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("macros.db");

    {
        let provider = SqliteUnitOfWorkProvider::open(&path).unwrap();
        let service = MacroService::with_registry(provider, builtins()).unwrap();

        let mut news = Macro::new("newsList", "News list");
        news.xslt_path = Some("newsList.xslt".to_string());
        news.add_property("count", "Count", "number");
        service.save(&news).unwrap();
        service.save(&Macro::new("breadcrumb", "Breadcrumb")).unwrap();
    }

    let provider = SqliteUnitOfWorkProvider::open(&path).unwrap();
    let service = MacroService::with_registry(provider, builtins()).unwrap();

    let all: Vec<_> = service
        .get_all::<&str>(&[])
        .unwrap()
        .into_iter()
        .map(|m| m.alias)
        .collect();
    assert_eq!(all, vec!["breadcrumb", "newsList"]);

    let news = service.get_by_alias("newsList").unwrap().unwrap();
    assert_eq!(news.property("count").unwrap().property_type_alias, "number");

    service.delete(&news).unwrap();
    assert!(service.get_by_alias("newsList").unwrap().is_none());
}

#[test]
fn sqlite_provider_failed_save_is_rolled_back() {
    let provider = SqliteUnitOfWorkProvider::open_in_memory().unwrap();
    let service = MacroService::with_registry(provider, builtins()).unwrap();
    service.save(&Macro::new("gallery", "Gallery")).unwrap();

    let err = service
        .save(&Macro::new("gallery", "Clashing gallery"))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateAlias(_)));

    assert_eq!(service.get_all::<&str>(&[]).unwrap().len(), 1);
    assert!(service.provider().connection().is_autocommit());
}

#[test]
fn construction_propagates_warm_up_error() {
    let provider = SqliteUnitOfWorkProvider::from_connection(Connection::open_in_memory().unwrap());

    match MacroService::with_registry(provider, builtins()) {
        Err(RepoError::UninitializedConnection { actual_version, .. }) => {
            assert_eq!(actual_version, 0)
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("warm-up against an unmigrated database must fail"),
    }
}

#[test]
fn large_filter_gives_same_result_on_both_providers() {
    let filter: Vec<String> = (0..40_000).map(|n| format!("m{n}")).collect();

    let memory =
        MacroService::with_registry(InMemoryUnitOfWorkProvider::new(), builtins()).unwrap();
    memory.save(&Macro::new("m1", "M1")).unwrap();
    let provider = SqliteUnitOfWorkProvider::open_in_memory().unwrap();
    let sqlite = MacroService::with_registry(provider, builtins()).unwrap();
    sqlite.save(&Macro::new("m1", "M1")).unwrap();

    assert_eq!(memory.get_all(filter.as_slice()).unwrap().len(), 1);
    assert_eq!(sqlite.get_all(filter.as_slice()).unwrap().len(), 1);
}
