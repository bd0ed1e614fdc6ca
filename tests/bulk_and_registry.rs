use std::sync::Arc;

use fare_dao::bulk::StartupLoader;
use fare_dao::prelude::*;
use fare_dao::test::date;
use fare_dao::test::FareKey;
use fare_dao::test::FareRule;
use fare_dao::test::ScriptedLoader;

type FareRuleDao = CurrentDao<FareKey, ScriptedLoader>;
type FareRuleHistDao = HistoricalDao<FareKey, ScriptedLoader<HistoricalKey<FareKey>>>;

fn atp(rule: &str) -> FareKey {
    FareKey::new("ATP", 100, rule)
}

fn rows() -> Vec<FareRule> {
    let mut keyless = FareRule::new(&atp("R1"), 9, date(2024, 1, 1), date(2024, 12, 31));
    keyless.vendor.clear();
    vec![
        FareRule::new(&atp("R1"), 1, date(2024, 1, 1), date(2024, 12, 31)),
        FareRule::new(&atp("R2"), 1, date(2024, 1, 1), date(2024, 12, 31)),
        keyless,
        FareRule::new(&atp("R1"), 2, date(2024, 1, 1), date(2024, 12, 31)),
        FareRule::new(&atp("R2"), 2, date(2024, 1, 1), date(2024, 12, 31)),
    ]
}

fn settings(json: &str) -> CacheSettings {
    CacheSettings::from_json_str(json).expect("settings parse")
}

fn resident_dao(name: &'static str) -> FareRuleDao {
    let settings = settings(r#"{ "daos": { "fare_rules": { "cache_class": "Rules", "resident": true } } }"#);
    CurrentDao::from_settings(name, ScriptedLoader::new(rows()).with_bulk(), &settings.settings_for("fare_rules"))
        .expect("DAO builds")
}

fn historical_dao(name: &'static str) -> FareRuleHistDao {
    let settings = settings(r#"{ "default": { "cache_class": "Historical", "granularity": { "months": 3 } } }"#);
    HistoricalDao::from_settings(name, ScriptedLoader::new(rows()), &settings.settings_for(name)).expect("DAO builds")
}

#[tokio::test]
async fn bulk_load_groups_rows_by_key() {
    let dao = resident_dao("fare_rules");
    let report = dao.load_resident().await.unwrap();

    assert_eq!(report.rows, 5);
    assert_eq!(report.keys, 2);
    assert_eq!(report.skipped, 1);

    let mut borrow = ScopedBorrow::new();
    let view = dao.get(&atp("R1"), date(2024, 6, 1), &mut borrow).await.unwrap();
    assert_eq!(view.iter().map(|r| r.seq_no).collect::<Vec<_>>(), vec![1, 2]);
    assert!(view.is_shared());

    let loader = dao.cache().loader();
    assert_eq!(loader.calls(), 0, "bulk loaded entries never hit the on-demand path");
    assert_eq!(loader.bulk_calls(), 1);
}

#[tokio::test]
async fn bulk_load_needs_loader_support() {
    let loader: ScriptedLoader = ScriptedLoader::new(rows());
    let cache = KeyedCache::builder().loader(loader).name("no_bulk").build().unwrap();

    let err = StartupLoader::new(&cache).run().await.unwrap_err();
    assert!(matches!(err, DaoError::Config(_)), "{err}");
}

#[tokio::test]
async fn failed_bulk_load_publishes_nothing() {
    let dao = resident_dao("fare_rules");
    dao.cache().loader().fail_next(1);

    let err = dao.load_resident().await.unwrap_err();
    assert!(matches!(err, DaoError::BackingStore { operation: "load_all", .. }), "{err}");

    dao.cache().run_pending_tasks().await;
    assert_eq!(dao.cache().entry_count(), 0);
}

#[tokio::test]
async fn resident_dao_reloads_after_clear() {
    let dao = resident_dao("fare_rules");
    dao.load_resident().await.unwrap();

    dao.cache()
        .loader()
        .set_rows(vec![FareRule::new(&atp("R3"), 1, date(2024, 1, 1), date(2024, 12, 31))]);
    dao.clear().await.unwrap();

    assert_eq!(dao.cache().loader().bulk_calls(), 2);
    assert!(dao.cache().contains_key(&atp("R3")));
    assert!(!dao.cache().contains_key(&atp("R1")));
}

#[tokio::test]
async fn settings_drive_the_dao() {
    let dao = resident_dao("fare_rules");
    assert!(dao.is_resident());
    assert_eq!(dao.cache_class(), CacheClass::Rules);
    assert_eq!(dao.name(), "fare_rules");

    let hist = historical_dao("fare_rules_hist");
    assert!(!hist.is_resident());
    assert_eq!(hist.cache_class(), CacheClass::Historical);
    assert_eq!(hist.strategy().granularity(), Granularity::months(3).unwrap());
}

#[tokio::test]
async fn compressed_settings_build_a_compressing_cache() {
    let settings = settings(r#"{ "default": { "compress": true, "compress_min_records": 1 } }"#);
    let dao: FareRuleDao =
        CurrentDao::from_settings("fare_rules", ScriptedLoader::new(rows()), &settings.default).unwrap();
    let mut borrow = ScopedBorrow::new();

    let view = dao.get(&atp("R2"), date(2024, 6, 1), &mut borrow).await.unwrap();
    assert_eq!(view.len(), 2);
    assert!(dao.cache().get_if_present(&atp("R2")).await.unwrap().is_compressed());
}

#[tokio::test]
async fn registry_administration() {
    let rules = Arc::new(resident_dao("fare_rules"));
    let hist = Arc::new(historical_dao("fare_rules_hist"));

    let mut registry = DaoRegistry::new()
        .with(Arc::clone(&rules))
        .unwrap()
        .with(Arc::clone(&hist))
        .unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["fare_rules", "fare_rules_hist"]);

    let err = registry.register(Arc::new(historical_dao("fare_rules_hist"))).unwrap_err();
    assert!(matches!(err, DaoError::Config(_)));

    let typed = registry.get::<FareRuleDao>("fare_rules").unwrap();
    assert!(Arc::ptr_eq(&typed, &rules));
    assert!(matches!(
        registry.get::<FareRuleHistDao>("fare_rules").unwrap_err(),
        DaoError::TypeMismatch { .. }
    ));
    assert!(matches!(
        registry.get::<FareRuleDao>("carriers").unwrap_err(),
        DaoError::Unregistered { .. }
    ));

    let reports = registry.load_resident().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "fare_rules");
    assert_eq!(reports[0].1.keys, 2);

    let mut borrow = ScopedBorrow::new();
    hist.get(&atp("R1"), date(2024, 2, 1), &mut borrow).await.unwrap();
    assert!(registry.admin("fare_rules_hist").unwrap().cached_key_attrs().len() == 1);

    registry.clear_class(CacheClass::Historical).await.unwrap();
    assert!(hist.cached_keys().is_empty());
    assert_eq!(rules.cache().loader().bulk_calls(), 1, "other classes are left alone");

    registry.clear_all().await.unwrap();
    assert_eq!(rules.cache().loader().bulk_calls(), 2, "resident DAOs reload on clear");

    let installed = registry.install().unwrap();
    assert!(std::ptr::eq(installed, DaoRegistry::global().unwrap()));
    assert!(matches!(
        DaoRegistry::new().install().unwrap_err(),
        DaoError::RegistryInitialized
    ));
    assert!(installed.get::<FareRuleDao>("fare_rules").is_ok());
}
