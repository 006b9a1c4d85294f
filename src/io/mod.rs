//! Data persistence.
//!
//! Grounded on the teacher's `io/bin.rs` + `io/json.rs`: a `DataPersistence` trait naming a
//! type's on-disk locations, implemented per result type, with free functions doing the actual
//! reading/writing. Chosen as the canonical shape over three other inconsistent sketches found
//! in the teacher tree (`ensemble/io.rs`, `simulation/io.rs`, and a third `Persistable`/`BinIO`
//! pair that referenced types defined nowhere in that tree) — see DESIGN.md.

pub mod bin;
pub mod json;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A result type that knows where it lives on disk in both of this crate's two formats: a
/// compact `bincode` blob for round-tripping, and a human-readable `serde_json` export.
pub trait DataPersistence: Serialize + DeserializeOwned {
    fn binary_path(&self) -> PathBuf;
    fn json_path(&self) -> PathBuf;
}

/// Ensures the `./data` tree exists before anything tries to write into it.
pub fn ensure_data_directories() -> std::io::Result<()> {
    std::fs::create_dir_all("./data/simulation")?;
    std::fs::create_dir_all("./data/cache")?;
    Ok(())
}
