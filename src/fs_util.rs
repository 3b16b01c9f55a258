use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use zip::ZipArchive;

use crate::error::HarvestError;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]+"#).expect("valid regex"));

/// Turns a dataset title into a file stem that is safe on every platform.
pub fn sanitize_file_stem(title: &str) -> String {
    let replaced = UNSAFE_FILE_CHARS.replace_all(title.trim(), "_");
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "dataset".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Unpacks a downloaded dataset archive into `dataset_dir` and returns the
/// number of files written.
///
/// Every entry is read to the end before anything is written, so a truncated
/// or hostile archive leaves no partial folder behind. Files are unpacked into
/// a staging folder next to `dataset_dir` and swapped in last, replacing an
/// earlier copy of the same dataset.
pub fn unpack_dataset_archive(
    archive_path: &Path,
    dataset_dir: &Path,
) -> Result<usize, HarvestError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        HarvestError::Filesystem(format!("open archive {}: {err}", archive_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| archive_error(archive_path, err))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| archive_error(archive_path, err))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            HarvestError::Filesystem(format!(
                "archive {} has an entry outside the dataset folder: {}",
                archive_path.display(),
                entry.name()
            ))
        })?;
        if !entry.is_dir() {
            io::copy(&mut entry, &mut io::sink())
                .map_err(|err| archive_error(archive_path, err))?;
        }
        entries.push((i, relative, entry.is_dir()));
    }

    let parent = dataset_dir
        .parent()
        .ok_or_else(|| HarvestError::Filesystem("invalid dataset folder".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    let staging = tempfile::Builder::new()
        .prefix(".unpack")
        .tempdir_in(parent)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

    let mut files = 0;
    for (i, relative, is_dir) in entries {
        let target = staging.path().join(relative);
        if is_dir {
            fs::create_dir_all(&target).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
            continue;
        }
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        let mut entry = archive
            .by_index(i)
            .map_err(|err| archive_error(archive_path, err))?;
        let mut out =
            fs::File::create(&target).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut out).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        files += 1;
    }

    if dataset_dir.exists() {
        fs::remove_dir_all(dataset_dir).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    }
    fs::rename(staging.path(), dataset_dir)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(files)
}

fn archive_error(archive_path: &Path, err: impl std::fmt::Display) -> HarvestError {
    HarvestError::Filesystem(format!("corrupt archive {}: {err}", archive_path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use zip::write::SimpleFileOptions;

    use super::*;

    #[test]
    fn sanitize_titles() {
        assert_eq!(sanitize_file_stem("Iris"), "Iris");
        assert_eq!(sanitize_file_stem("a/b: c?"), "a_b_ c_");
        assert_eq!(sanitize_file_stem("../.."), "_");
        assert_eq!(sanitize_file_stem("  "), "dataset");
    }

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn unpack_replaces_previous_copy() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("uciml_iris.zip");
        write_archive(
            &archive,
            &[("Iris.csv", b"a,b\n1,2\n"), ("docs/README.md", b"iris")],
        );
        let dataset_dir = temp.path().join("uciml_iris");
        fs::create_dir_all(&dataset_dir).unwrap();
        fs::write(dataset_dir.join("stale.csv"), b"old").unwrap();

        let files = unpack_dataset_archive(&archive, &dataset_dir).unwrap();
        assert_eq!(files, 2);
        assert_eq!(
            fs::read_to_string(dataset_dir.join("Iris.csv")).unwrap(),
            "a,b\n1,2\n"
        );
        assert!(dataset_dir.join("docs/README.md").exists());
        assert!(!dataset_dir.join("stale.csv").exists());
    }

    #[test]
    fn unpack_rejects_non_zip_without_touching_folder() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("bad.zip");
        fs::write(&archive, b"not a zip").unwrap();
        let dataset_dir = temp.path().join("bad");

        assert_matches!(
            unpack_dataset_archive(&archive, &dataset_dir),
            Err(HarvestError::Filesystem(msg)) if msg.contains("corrupt archive")
        );
        assert!(!dataset_dir.exists());
    }

    #[test]
    fn unpack_rejects_entries_escaping_the_folder() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("evil.zip");
        write_archive(&archive, &[("../escape.txt", b"x")]);
        let dataset_dir = temp.path().join("evil");

        assert!(unpack_dataset_archive(&archive, &dataset_dir).is_err());
        assert!(!temp.path().join("escape.txt").exists());
        assert!(!dataset_dir.exists());
    }
}
