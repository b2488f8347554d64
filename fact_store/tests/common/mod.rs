#![allow(dead_code)]

use std::path::PathBuf;

use diesel::SqliteConnection;
use fact_store::db::{connect_sqlite, run_pending};
use tempfile::TempDir;

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub path: String,
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    run_pending(&path).expect("migrations");

    let conn = connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}
