//! Compact binary persistence via `bincode`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::io::DataPersistence;

pub fn save_file<T: DataPersistence>(data: &T) -> Result<(), Box<dyn std::error::Error>> {
    let file_path = data.binary_path();

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let binary_data = bincode::serialize(data)?;
    fs::write(&file_path, binary_data)?;
    Ok(())
}

pub fn load_file<T: DataPersistence>(file_path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let binary_data = fs::read(file_path)?;
    let data: T = bincode::deserialize(&binary_data)?;
    Ok(data)
}

pub fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("bin") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
