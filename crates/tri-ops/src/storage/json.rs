//! Atomic JSON record storage.
//!
//! Every record in the state directory is written through the same sequence:
//! serialize to a canonical byte string, write it to a hidden sibling temp
//! file, force the bytes to durable storage, then rename over the final path.
//! Same-directory rename is the one primitive that guarantees, on POSIX-like
//! and Windows filesystems alike, that a concurrent reader sees either the old
//! record or the new record and never a truncated one.
//!
//! The canonical form is compact (no extra whitespace), ASCII-safe (non-ASCII
//! characters escaped as `\uXXXX`), keeps keys in declaration order, and ends
//! with a newline. Readers treat a missing or unparseable file as "no record";
//! corruption never surfaces as an error from this layer.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Compact formatter that escapes non-ASCII characters as `\uXXXX`.
///
/// Characters outside the Basic Multilingual Plane become surrogate pairs,
/// matching what every JSON parser expects.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Serialize a record to its canonical single-line form.
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    value
        .serialize(&mut serializer)
        .context("failed to serialize record")?;
    String::from_utf8(buf).context("serialized record was not UTF-8")
}

/// Atomically replace `path` with the canonical serialization of `value`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("record path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("record path has no file name: {}", path.display()))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name));

    let mut payload = to_canonical_string(value)?;
    payload.push('\n');

    let mut file = File::create(&temp_path)
        .with_context(|| format!("failed to create {}", temp_path.display()))?;
    file.write_all(payload.as_bytes())
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", temp_path.display()))?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Read a record, mapping absence and parse failure to `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn canonical_form_is_compact_with_declaration_order() {
        let sample = Sample {
            name: "alpha".to_string(),
            count: 3,
        };
        assert_eq!(
            to_canonical_string(&sample).unwrap(),
            r#"{"name":"alpha","count":3}"#
        );
    }

    #[test]
    fn canonical_form_escapes_non_ascii() {
        let sample = Sample {
            name: "héllo \u{1F600}".to_string(),
            count: 0,
        };
        let json = to_canonical_string(&sample).unwrap();
        assert!(json.is_ascii());
        assert!(json.contains("h\\u00e9llo"));
        // Astral-plane characters become surrogate pairs.
        assert!(json.contains("\\ud83d\\ude00"));

        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        let sample = Sample {
            name: "beta".to_string(),
            count: 7,
        };

        write_json_atomic(&path, &sample).unwrap();
        assert_eq!(read_json::<Sample>(&path), Some(sample));
    }

    #[test]
    fn written_record_is_newline_terminated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        write_json_atomic(
            &path,
            &Sample {
                name: "gamma".to_string(),
                count: 1,
            },
        )
        .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(!raw[..raw.len() - 1].contains('\n'));
    }

    #[test]
    fn write_leaves_no_temp_residue() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        write_json_atomic(
            &path,
            &Sample {
                name: "delta".to_string(),
                count: 2,
            },
        )
        .unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| Some(entry.ok()?.file_name().to_string_lossy().into_owned()))
            .collect();
        assert_eq!(names, vec!["sample.json".to_string()]);
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/sample.json");
        write_json_atomic(
            &path,
            &Sample {
                name: "nested".to_string(),
                count: 9,
            },
        )
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn missing_or_corrupt_files_read_as_none() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(read_json::<Sample>(&missing), None);

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{\"name\": \"trunc").unwrap();
        assert_eq!(read_json::<Sample>(&corrupt), None);
    }

    #[test]
    fn unknown_keys_are_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        fs::write(&path, r#"{"name":"x","count":1,"added_later":true}"#).unwrap();

        let parsed: Sample = read_json(&path).unwrap();
        assert_eq!(parsed.count, 1);
    }

    #[test]
    fn overwrite_replaces_whole_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        write_json_atomic(
            &path,
            &Sample {
                name: "first".to_string(),
                count: 1,
            },
        )
        .unwrap();
        write_json_atomic(
            &path,
            &Sample {
                name: "second".to_string(),
                count: 2,
            },
        )
        .unwrap();

        let value: Value = read_json(&path).unwrap();
        assert_eq!(value["name"], "second");
    }
}
