//! Archive unpacking into a scratch directory.
//!
//! A fetched archive is either a ZIP holding the JSON data file or the bare
//! JSON document itself. The format is detected from the leading bytes, not
//! the file name. Whatever happens, the original archive file is deleted
//! before [`unpack_archive`] returns.

mod error;

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

pub use error::UnpackError;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SNIFF_LEN: usize = 512;
const COPY_BUFFER_LEN: usize = 64 * 1024;
const MAX_DIR_SUFFIX: usize = 1000;

/// Format of an archive as detected from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// ZIP container.
    Zip,
    /// Uncompressed JSON document.
    Json,
}

/// Files produced by unpacking one archive.
#[derive(Debug)]
pub struct UnpackedArchive {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl UnpackedArchive {
    /// Directory holding the extracted files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every extracted file, in archive order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Extracted files with a `.json` extension.
    #[must_use]
    pub fn data_files(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .map(PathBuf::as_path)
            .collect()
    }

    /// Removes the extraction directory.
    ///
    /// # Errors
    ///
    /// Returns [`UnpackError::Io`] if the directory cannot be removed.
    pub async fn cleanup(self) -> Result<(), UnpackError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UnpackError::io(&self.dir, e)),
        }
    }
}

/// Deletes the source archive when dropped.
struct ArchiveGuard<'a> {
    path: &'a Path,
}

impl Drop for ArchiveGuard<'_> {
    fn drop(&mut self) {
        match fs::remove_file(self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove archive"),
        }
    }
}

/// Removes a partially populated extraction directory unless disarmed.
struct ExtractionDir {
    path: PathBuf,
    keep: bool,
}

impl ExtractionDir {
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ExtractionDir {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Unpacks `archive` into a fresh sub-directory of `work_dir`.
///
/// The archive file is always deleted, on success and on failure alike. On
/// failure the partially written extraction directory is removed too.
///
/// # Errors
///
/// Returns [`UnpackError`] if the format is unsupported, the ZIP is corrupt
/// or empty, or the file system fails.
#[instrument(skip_all, fields(archive = %archive.display()))]
pub async fn unpack_archive(archive: &Path, work_dir: &Path) -> Result<UnpackedArchive, UnpackError> {
    let archive_path = archive.to_path_buf();
    let work_dir = work_dir.to_path_buf();

    let unpacked = tokio::task::spawn_blocking(move || unpack_archive_blocking(&archive_path, &work_dir))
        .await
        .map_err(|e| UnpackError::TaskPanicked {
            archive: archive.to_path_buf(),
            message: e.to_string(),
        })??;

    info!(
        dir = %unpacked.dir.display(),
        files = unpacked.files.len(),
        "archive unpacked"
    );
    Ok(unpacked)
}

/// Blocking implementation of [`unpack_archive`].
///
/// # Errors
///
/// See [`unpack_archive`].
pub fn unpack_archive_blocking(
    archive: &Path,
    work_dir: &Path,
) -> Result<UnpackedArchive, UnpackError> {
    let _guard = ArchiveGuard { path: archive };

    let format = detect_format(archive)?;
    debug!(?format, "detected archive format");

    let dir = create_extraction_dir(archive, work_dir)?;
    let files = match format {
        ArchiveFormat::Zip => extract_zip(archive, &dir.path)?,
        ArchiveFormat::Json => vec![move_json(archive, &dir.path)?],
    };

    Ok(UnpackedArchive {
        dir: dir.into_path(),
        files,
    })
}

/// Sniffs the leading bytes of `path`.
///
/// # Errors
///
/// Returns [`UnpackError::EmptyArchive`] for a zero-byte file and
/// [`UnpackError::UnsupportedFormat`] for anything that is neither ZIP nor JSON.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, UnpackError> {
    let mut file = File::open(path).map_err(|e| UnpackError::io(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    Read::by_ref(&mut file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| UnpackError::io(path, e))?;

    if head.is_empty() {
        return Err(UnpackError::EmptyArchive {
            archive: path.to_path_buf(),
        });
    }
    if head.starts_with(ZIP_LOCAL_HEADER) || head.starts_with(ZIP_EMPTY_ARCHIVE) {
        return Ok(ArchiveFormat::Zip);
    }

    let text = head.strip_prefix(UTF8_BOM).unwrap_or(&head);
    match text.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(ArchiveFormat::Json),
        _ => Err(UnpackError::UnsupportedFormat {
            archive: path.to_path_buf(),
        }),
    }
}

fn create_extraction_dir(archive: &Path, work_dir: &Path) -> Result<ExtractionDir, UnpackError> {
    fs::create_dir_all(work_dir).map_err(|e| UnpackError::io(work_dir, e))?;

    let stem = archive
        .file_name()
        .map_or_else(|| "archive".to_string(), |n| n.to_string_lossy().into_owned());

    for suffix in 0..MAX_DIR_SUFFIX {
        let name = if suffix == 0 {
            format!("{stem}.unpacked")
        } else {
            format!("{stem}.unpacked_{suffix}")
        };
        let candidate = work_dir.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => {
                return Ok(ExtractionDir {
                    path: candidate,
                    keep: false,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(UnpackError::io(candidate, e)),
        }
    }

    Err(UnpackError::io(
        work_dir,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free extraction directory name",
        ),
    ))
}

fn move_json(archive: &Path, dest_dir: &Path) -> Result<PathBuf, UnpackError> {
    let mut name = archive
        .file_name()
        .map_or_else(|| "data".into(), std::ffi::OsStr::to_os_string);
    let has_json_ext = Path::new(&name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !has_json_ext {
        name.push(".json");
    }
    let target = dest_dir.join(name);

    if fs::rename(archive, &target).is_err() {
        fs::copy(archive, &target).map_err(|e| UnpackError::io(&target, e))?;
    }
    Ok(target)
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, UnpackError> {
    let file = File::open(archive_path).map_err(|e| UnpackError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| UnpackError::corrupt(archive_path, format!("failed to read ZIP archive: {e}")))?;

    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            UnpackError::corrupt(archive_path, format!("failed to read ZIP entry {index}: {e}"))
        })?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| UnpackError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| UnpackError::io(parent, e))?;
        }

        let outfile = File::create(&out_path).map_err(|e| UnpackError::io(&out_path, e))?;
        let mut writer = BufWriter::new(outfile);
        let mut buffer = vec![0u8; COPY_BUFFER_LEN];
        loop {
            let read = entry.read(&mut buffer).map_err(|e| {
                UnpackError::corrupt(archive_path, format!("failed to decompress {}: {e}", out_path.display()))
            })?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .map_err(|e| UnpackError::io(&out_path, e))?;
        }
        writer.flush().map_err(|e| UnpackError::io(&out_path, e))?;

        debug!(path = %out_path.display(), "extracted entry");
        extracted.push(out_path);
    }

    if extracted.is_empty() {
        return Err(UnpackError::EmptyArchive {
            archive: archive_path.to_path_buf(),
        });
    }
    Ok(extracted)
}
