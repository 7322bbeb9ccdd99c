use fnstage_core::{Manifest, ManifestEntry, ManifestStore, Prefix, ResourceId};
use tempfile::TempDir;

fn id(s: &str) -> ResourceId {
    ResourceId::parse(s).unwrap()
}

fn manifest(prefix: &str) -> Manifest {
    Manifest::new(
        Prefix::new(prefix).unwrap(),
        Some("my-project".to_owned()),
        "us-central1",
    )
}

#[test]
fn load_missing_manifest_is_none() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());

    let loaded = store.load(&Prefix::new("dev").unwrap()).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn load_or_new_keeps_existing_entries() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    let dev = Prefix::new("dev").unwrap();

    let fresh = store.load_or_new(&dev, None, "europe-west1").unwrap();
    assert!(fresh.is_empty());
    assert_eq!(fresh.region, "europe-west1");

    let mut m = manifest("dev");
    m.record(ManifestEntry::new(id("dev-func1"), None));
    store.save(&m).unwrap();

    let loaded = store.load_or_new(&dev, None, "europe-west1").unwrap();
    assert_eq!(loaded, m);
}

#[test]
fn save_then_load_preserves_entries() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());

    let mut m = manifest("dev");
    m.record(ManifestEntry::new(
        id("dev-func1"),
        Some("https://example.test/dev-func1".to_owned()),
    ));
    m.record(ManifestEntry::new(id("dev-func2"), None));
    store.save(&m).unwrap();

    assert!(tmp.path().join(".fnstage/manifests/dev.json").exists());

    let loaded = store.load(&m.prefix).unwrap().unwrap();
    assert_eq!(loaded, m);
    assert_eq!(loaded.resources[0].local_name, "func1");
}

#[test]
fn record_replaces_existing_entry() {
    let mut m = manifest("dev");
    m.record(ManifestEntry::new(id("dev-func1"), None));
    m.record(ManifestEntry::new(
        id("dev-func1"),
        Some("https://new".to_owned()),
    ));

    assert_eq!(m.resources.len(), 1);
    assert_eq!(m.resources[0].url.as_deref(), Some("https://new"));
}

#[test]
fn forget_reports_presence() {
    let mut m = manifest("dev");
    m.record(ManifestEntry::new(id("dev-func1"), None));

    assert!(m.forget(&id("dev-func1")));
    assert!(!m.forget(&id("dev-func1")));
    assert!(m.is_empty());
}

#[test]
fn saving_empty_manifest_removes_file() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());

    let mut m = manifest("dev");
    m.record(ManifestEntry::new(id("dev-func1"), None));
    store.save(&m).unwrap();

    m.forget(&id("dev-func1"));
    store.save(&m).unwrap();

    assert!(store.load(&m.prefix).unwrap().is_none());
}

#[test]
fn list_returns_sorted_prefixes_and_ignores_strays() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());

    for p in ["staging", "dev"] {
        let mut m = manifest(p);
        m.record(ManifestEntry::new(id(&format!("{p}-func1")), None));
        store.save(&m).unwrap();
    }
    std::fs::write(store.dir().join("README.txt"), "notes").unwrap();
    std::fs::write(store.dir().join("Not-A-Prefix.json"), "{}").unwrap();

    let listed: Vec<String> = store
        .list()
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(listed, vec!["dev", "staging"]);
}

#[test]
fn list_without_directory_is_empty() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn corrupt_manifest_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.dir().join("dev.json"), "{ not json").unwrap();

    let err = store.load(&Prefix::new("dev").unwrap()).unwrap_err();
    assert!(matches!(err, fnstage_core::Error::ManifestParse { .. }));
}
