//! Plain-text label files: one `<name> <x0> <y0> <x1> <y1>` line per image,
//! coordinates normalized to [0, 1]. Line order defines the row order the
//! metric function sees.

use std::fs;
use std::path::Path;

use crate::types::{DatasetError, DatasetResult};

pub fn read_label_file(path: &Path) -> DatasetResult<Vec<(String, [f32; 4])>> {
    let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(DatasetError::Label {
                path: path.to_path_buf(),
                line: idx + 1,
                msg: format!("expected 5 fields, got {}", fields.len()),
            });
        }
        let mut bbox = [0.0f32; 4];
        for (slot, field) in bbox.iter_mut().zip(&fields[1..]) {
            *slot = field.parse().map_err(|_| DatasetError::Label {
                path: path.to_path_buf(),
                line: idx + 1,
                msg: format!("invalid coordinate {field:?}"),
            })?;
        }
        entries.push((fields[0].to_string(), bbox));
    }
    Ok(entries)
}

pub fn write_label_file(path: &Path, entries: &[(String, [f32; 4])]) -> DatasetResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut out = String::new();
    for (name, b) in entries {
        out.push_str(&format!("{name} {} {} {} {}\n", b[0], b[1], b[2], b[3]));
    }
    fs::write(path, out).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}
