//! Test helpers for running sync commands against a temporary database.

use super::*;
use crate::options::{RemoteOptions, StoreOptions};
use camino::{Utf8Path, Utf8PathBuf};
use geosync_core::RemoteClient;
use geosync_core::test_support::StubRemoteClient;
use std::time::Duration;
use tempfile::TempDir;

pub(super) const TOKEN: &str = "test-token";

/// Hands out a borrowed stub so tests can inspect requests afterwards.
#[derive(Debug, Default)]
pub(super) struct StubClientBuilder {
    pub(super) client: StubRemoteClient,
}

impl StubClientBuilder {
    pub(super) fn new(client: StubRemoteClient) -> Self {
        Self { client }
    }
}

impl ClientBuilder for StubClientBuilder {
    fn build(&self, _options: &RemoteOptions) -> Result<Box<dyn RemoteClient + '_>, CliError> {
        Ok(Box::new(&self.client))
    }
}

/// Temporary directory holding the database under test.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("reference.db")
    }

    pub(super) fn store_options(&self) -> StoreOptions {
        StoreOptions {
            database: self.database(),
            mapping: None,
        }
    }

    /// Create the default schema in the workspace database.
    pub(super) fn initialise(&self) {
        let mut sink = Vec::new();
        init::initialise(&self.store_options(), &mut sink).expect("initialise schema");
    }

    /// Count the rows of `table` in the workspace database.
    pub(super) fn count_rows(&self, table: &str) -> i64 {
        let connection = rusqlite::Connection::open(self.database()).expect("open database");
        connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .expect("count rows")
    }
}

pub(super) fn remote_options() -> RemoteOptions {
    RemoteOptions {
        api_url: "https://provider.test/v2/references/".to_owned(),
        api_token: TOKEN.to_owned(),
        language: "en".to_owned(),
        timeout: Duration::from_secs(5),
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path.as_std_path(), contents).expect("write file");
}
