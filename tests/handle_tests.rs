//! Integration tests for the genders handle lifecycle

use genders_core::*;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::NamedTempFile;

fn write_db(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn rewrite(file: &NamedTempFile, text: &str) {
    std::fs::write(file.path(), text).unwrap();
}

#[test]
fn test_unloaded_guard() {
    let handle = Genders::create();
    let checks: Vec<Result<()>> = vec![
        handle.is_node("n1").map(|_| ()),
        handle.is_attr("a").map(|_| ()),
        handle.is_attr_val("a", "1").map(|_| ()),
        handle.getnodes(None, None).map(|_| ()),
        handle.query("a").map(|_| ()),
        handle.test_query("a", "n1").map(|_| ()),
        handle.stats().map(|_| ()),
    ];
    for result in checks {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotLoaded);
    }
}

#[test]
fn test_load_and_query() {
    let file = write_db("A rack=1,compute\nB rack=2,compute\nC rack=1\n");
    let handle = Genders::open(Some(file.path()), GendersConfig::default()).unwrap();

    assert!(handle.is_node("B").unwrap());
    assert!(handle.is_attr("compute").unwrap());
    assert!(handle.is_attr_val("rack", "2").unwrap());
    assert_eq!(handle.getnodes(Some("rack"), Some("1")).unwrap(), vec!["A", "C"]);
    assert_eq!(handle.query("rack=1&&compute").unwrap(), vec!["A"]);
    assert!(handle.test_query("!compute", "C").unwrap());
    assert_eq!(handle.stats().unwrap().num_nodes, 3);
    assert_eq!(handle.last_error(), None);
}

#[test]
fn test_default_path() {
    let file = write_db("n1 a\n");
    let config = GendersConfig::default().with_default_path(file.path());
    let handle = Genders::new(config);
    handle.load(None).unwrap();
    assert_eq!(handle.getnodes(None, None).unwrap(), vec!["n1"]);
}

#[test]
fn test_failed_load_keeps_prior_state() {
    let handle = Genders::create();
    let bad = write_db("@G1 a,@G2\n@G2 b,@G1\nn1 @G1\n");

    let err = handle.load(Some(bad.path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CycleDetected);
    assert_eq!(handle.state(), HandleState::Unloaded);
    assert_eq!(handle.errnum(), ErrorKind::CycleDetected.errnum());

    let good = write_db("n1 a\n");
    handle.load(Some(good.path())).unwrap();
    assert!(handle.load(Some(bad.path())).is_err());
    assert_eq!(handle.state(), HandleState::Loaded);
    assert_eq!(handle.getnodes(None, None).unwrap(), vec!["n1"]);
}

#[test]
fn test_idempotent_reload() {
    let file = write_db("n[1-4] compute\nn2 gpu\n");
    let handle = Genders::open(Some(file.path()), GendersConfig::default()).unwrap();

    let before = (
        handle.query("compute -- gpu").unwrap(),
        handle.stats().unwrap(),
    );
    handle.reload().unwrap();
    let after = (
        handle.query("compute -- gpu").unwrap(),
        handle.stats().unwrap(),
    );
    assert_eq!(before, after);
}

#[test]
fn test_reload_publishes_new_snapshot() {
    let file = write_db("n1 a\n");
    let handle = Genders::open(Some(file.path()), GendersConfig::default()).unwrap();
    let old = handle.snapshot().unwrap();

    rewrite(&file, "n1 a\nn2 a\n");
    handle.reload().unwrap();

    assert_eq!(handle.getnodes(Some("a"), None).unwrap(), vec!["n1", "n2"]);
    assert_eq!(old.nodes_with(Some("a"), None).unwrap(), vec!["n1"]);
}

#[test]
fn test_reload_failure_keeps_snapshot() {
    let file = write_db("n1 a\n");
    let handle = Genders::open(Some(file.path()), GendersConfig::default()).unwrap();

    rewrite(&file, "n1 a,,\n");
    let err = handle.reload().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseSyntax);
    assert_eq!(handle.last_error().unwrap().operation, "reload");
    assert!(handle.is_node("n1").unwrap());
}

#[test]
fn test_reload_policy() {
    let file = write_db("n1 a\n");
    let config = GendersConfig::default().with_allow_reload(false);
    let handle = Genders::open(Some(file.path()), config).unwrap();
    assert_eq!(
        handle.load(Some(file.path())).unwrap_err().kind(),
        ErrorKind::AlreadyLoaded
    );
    handle.reload().unwrap();
}

#[test]
fn test_destroy_is_terminal() {
    let file = write_db("n1 a\n");
    let handle = Genders::open(Some(file.path()), GendersConfig::default()).unwrap();
    handle.destroy();
    assert_eq!(handle.state(), HandleState::Destroyed);
    assert_eq!(handle.query("a").unwrap_err().kind(), ErrorKind::NotLoaded);
    assert_eq!(handle.reload().unwrap_err().kind(), ErrorKind::NotLoaded);
    assert_eq!(
        handle.load(Some(file.path())).unwrap_err().kind(),
        ErrorKind::NotLoaded
    );
}

#[test]
fn test_concurrent_readers_during_reload() {
    let file = write_db("n[1-50] compute\n");
    let handle = Arc::new(Genders::open(Some(file.path()), GendersConfig::default()).unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                for _ in 0..200 {
                    let nodes = handle.query("compute").unwrap();
                    assert!(nodes.len() == 50 || nodes.len() == 100);
                }
            })
        })
        .collect();

    rewrite(&file, "n[1-100] compute\n");
    for _ in 0..5 {
        handle.reload().unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(handle.stats().unwrap().num_nodes, 100);
}

#[test]
fn test_parse_file_does_not_install() {
    let file = write_db("n[1-3] a\n");
    let handle = Genders::create();
    assert_eq!(handle.parse_file(file.path()).unwrap().num_nodes, 3);
    assert_eq!(handle.state(), HandleState::Unloaded);
}

#[test]
fn test_getnodename() {
    let name = Genders::create().getnodename().unwrap();
    assert!(!name.contains('.'));
}

#[test]
fn test_deep_query_through_handle() {
    let file = write_db("n1 a\n");
    let handle = Genders::open(Some(file.path()), GendersConfig::default()).unwrap();
    let query = format!("{}a", "~".repeat(100_000));
    assert_eq!(handle.query(&query).unwrap_err().kind(), ErrorKind::ParseSyntax);
    assert_eq!(handle.last_error().unwrap().operation, "query");
    assert_eq!(handle.query("~~a").unwrap(), vec!["n1"]);
}

#[test]
fn test_unload_is_not_undone_by_reload() {
    let file = write_db("n[1-200] compute\n");
    let handle = Arc::new(Genders::open(Some(file.path()), GendersConfig::default()).unwrap());

    let reloader = {
        let handle = Arc::clone(&handle);
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = handle.reload();
            }
        })
    };
    handle.unload().unwrap();
    reloader.join().unwrap();

    assert_eq!(handle.state(), HandleState::Unloaded);
    assert_eq!(handle.reload().unwrap_err().kind(), ErrorKind::NotLoaded);
    assert_eq!(handle.query("compute").unwrap_err().kind(), ErrorKind::NotLoaded);
}
