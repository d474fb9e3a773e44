use std::{
    env, fs,
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use lazy_static::lazy_static;

use crate::{registry::MetricRegistry, snapshot::Snapshot};

lazy_static! {
    pub static ref TEST_DIR: &'static str = "metric_nexus_test";
}

mod tests {
    use super::*;

    #[ctor::ctor]
    fn init() {
        let dir = env::temp_dir().join(*TEST_DIR);
        let _ = fs::remove_dir_all(&dir);
        println!("create metric_nexus_test dir: {}", dir.to_string_lossy().into_owned());
        assert!(fs::create_dir(&dir).is_ok());
    }

    #[ctor::dtor]
    fn cleanup() {
        let dir = env::temp_dir().join(*TEST_DIR);
        let _ = fs::remove_dir_all(&dir);
    }
}

/// Returns a fresh state file path under the test dir. The file itself is not created.
pub fn test_state_file(name: &str) -> PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let test_dir = env::temp_dir().join(format!("{}/{}-{}", *TEST_DIR, name, now).as_str());
    assert!(fs::create_dir(&test_dir).is_ok());

    println!("test state file dir: {}", test_dir.to_string_lossy());

    test_dir.join("state.yaml")
}

/// Loads a registry from a fresh state file, as the server does at startup.
pub fn test_registry(name: &str) -> (PathBuf, Arc<MetricRegistry>) {
    let state_file = test_state_file(name);
    let snapshot = Snapshot::load(&state_file);
    assert!(snapshot.is_ok());

    let registry = MetricRegistry::from_snapshot(Arc::new(snapshot.unwrap()));
    assert!(registry.is_ok());

    (state_file, Arc::new(registry.unwrap()))
}
