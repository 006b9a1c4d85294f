//! Process-wide, module-namespaced memoisation with periodic disk sync.
//!
//! Grounded on `original_source/code/app/common/cache.py`: values are addressed by a
//! `(module, key)` pair, held in memory, and flushed to one JSON file per module no more often
//! than every [`Cache::DISK_SYNC_SECONDS`]. `CACHE_DISABLED=1` in the environment short-circuits
//! both reads and writes, matching the source's `is_disabled` check.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;

struct ModuleState {
    data: HashMap<String, Value>,
    last_sync: Instant,
    synced_once: bool,
}

/// A namespaced, disk-backed memoisation cache.
pub struct Cache {
    dir: PathBuf,
    modules: Mutex<HashMap<String, ModuleState>>,
}

impl Cache {
    pub const DISK_SYNC_SECONDS: u64 = 30;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide default cache, rooted at `./data/cache` unless overridden.
    pub fn global() -> &'static Cache {
        static GLOBAL: OnceLock<Cache> = OnceLock::new();
        GLOBAL.get_or_init(|| Cache::new("./data/cache"))
    }

    pub fn is_disabled(&self) -> bool {
        env::var("CACHE_DISABLED").map(|v| v == "1").unwrap_or(false)
    }

    fn cache_file(&self, module: &str) -> PathBuf {
        self.dir.join(format!("{module}.json"))
    }

    fn load_from_file(&self, module: &str) -> HashMap<String, Value> {
        if self.is_disabled() {
            return HashMap::new();
        }
        let path = self.cache_file(module);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    /// Returns a deep-copied value for `key` in `module`, or `None` if absent or disabled.
    pub fn get_from_key(&self, module: &str, key: &str) -> Option<Value> {
        if self.is_disabled() {
            return None;
        }
        let mut modules = self.modules.lock().unwrap();
        let state = modules.entry(module.to_string()).or_insert_with(|| ModuleState {
            data: self.load_from_file(module),
            last_sync: Instant::now(),
            synced_once: false,
        });
        state.data.get(key).cloned()
    }

    /// Writes `value` for `key` in `module`, then syncs to disk if the module's cache is stale.
    pub fn save_to_key(&self, module: &str, key: &str, value: Value) {
        if self.is_disabled() {
            return;
        }
        let mut modules = self.modules.lock().unwrap();
        let loaded = if modules.contains_key(module) {
            None
        } else {
            Some(self.load_from_file(module))
        };
        let state = modules.entry(module.to_string()).or_insert_with(|| ModuleState {
            data: loaded.unwrap_or_default(),
            last_sync: Instant::now(),
            synced_once: false,
        });
        state.data.insert(key.to_string(), value);

        let expired = !state.synced_once || state.last_sync.elapsed().as_secs() >= Self::DISK_SYNC_SECONDS;
        if expired {
            let _ = fs::create_dir_all(&self.dir);
            if let Ok(serialized) = serde_json::to_string_pretty(&state.data) {
                let _ = fs::write(self.cache_file(module), serialized);
            }
            state.last_sync = Instant::now();
            state.synced_once = true;
        }
    }

    pub fn clear_all(&self) {
        let mut modules = self.modules.lock().unwrap();
        for module in modules.keys() {
            let _ = fs::remove_file(self.cache_file(module));
        }
        modules.clear();
    }
}

pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_then_get_round_trips_and_is_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path());
        cache.save_to_key("routes", "a-b", json!(["a", "b"]));
        let mut value = cache.get_from_key("routes", "a-b").unwrap();
        value.as_array_mut().unwrap().push(json!("c"));
        let reread = cache.get_from_key("routes", "a-b").unwrap();
        assert_eq!(reread, json!(["a", "b"]));
    }

    #[test]
    fn missing_key_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path());
        assert!(cache.get_from_key("routes", "missing").is_none());
    }

    #[test]
    fn disabled_cache_never_stores_anything() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path());
        unsafe {
            env::set_var("CACHE_DISABLED", "1");
        }
        cache.save_to_key("routes", "a-b", json!(1));
        assert!(cache.get_from_key("routes", "a-b").is_none());
        unsafe {
            env::remove_var("CACHE_DISABLED");
        }
    }
}
