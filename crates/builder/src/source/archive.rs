//! Source archive extraction

use std::path::{Path, PathBuf};

use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder};
use kiln_errors::{BuildError, Error};
use tokio::io::{AsyncWriteExt, BufReader};

/// Archive formats recognised by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveKind {
    pub(crate) fn detect(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

fn extraction_failed(what: &str, e: &dyn std::fmt::Display) -> BuildError {
    BuildError::ExtractionFailed {
        message: format!("{what}: {e}"),
    }
}

/// Unpack `archive` into `dest` and return the source root
///
/// When the archive holds a single top-level directory, that directory is
/// the root; otherwise `dest` itself is.
///
/// # Errors
///
/// Returns `BuildError::UnsupportedArchive` for unknown formats and
/// `BuildError::ExtractionFailed` for corrupt archives.
pub(crate) async fn extract(archive: &Path, dest: &Path) -> Result<PathBuf, Error> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = ArchiveKind::detect(&name).ok_or_else(|| BuildError::UnsupportedArchive {
        path: archive.display().to_string(),
    })?;

    match kind {
        ArchiveKind::Zip => unpack_zip(archive.to_path_buf(), dest.to_path_buf()).await?,
        ArchiveKind::Tar => unpack_tar(archive.to_path_buf(), dest.to_path_buf()).await?,
        ArchiveKind::TarGz | ArchiveKind::TarBz2 | ArchiveKind::TarXz => {
            let plain = archive.with_extension("decompressed.tar");
            decompress(archive, &plain, kind).await?;
            let result = unpack_tar(plain.clone(), dest.to_path_buf()).await;
            let _ = tokio::fs::remove_file(&plain).await;
            result?;
        }
    }

    source_root(dest).await
}

async fn decompress(archive: &Path, out: &Path, kind: ArchiveKind) -> Result<(), Error> {
    let input = tokio::fs::File::open(archive)
        .await
        .map_err(|e| Error::io_with_path(&e, archive))?;
    let mut output = tokio::fs::File::create(out)
        .await
        .map_err(|e| Error::io_with_path(&e, out))?;
    let reader = BufReader::new(input);

    let copied = match kind {
        ArchiveKind::TarGz => tokio::io::copy(&mut GzipDecoder::new(reader), &mut output).await,
        ArchiveKind::TarBz2 => tokio::io::copy(&mut BzDecoder::new(reader), &mut output).await,
        ArchiveKind::TarXz => tokio::io::copy(&mut XzDecoder::new(reader), &mut output).await,
        ArchiveKind::Zip | ArchiveKind::Tar => return Ok(()),
    };
    copied.map_err(|e| extraction_failed("failed to decompress archive", &e))?;
    output
        .flush()
        .await
        .map_err(|e| Error::io_with_path(&e, out))?;
    Ok(())
}

async fn unpack_tar(archive: PathBuf, dest: PathBuf) -> Result<(), Error> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive).map_err(|e| Error::io_with_path(&e, &archive))?;
        let mut tar = tar::Archive::new(file);
        tar.set_preserve_permissions(true);
        for entry in tar
            .entries()
            .map_err(|e| extraction_failed("failed to read tar archive", &e))?
        {
            let mut entry = entry.map_err(|e| extraction_failed("failed to read tar entry", &e))?;
            // unpack_in refuses entries that would land outside dest
            entry
                .unpack_in(&dest)
                .map_err(|e| extraction_failed("failed to extract tar entry", &e))?;
        }
        Ok::<(), Error>(())
    })
    .await
    .map_err(|e| extraction_failed("extraction task failed", &e))?
}

async fn unpack_zip(archive: PathBuf, dest: PathBuf) -> Result<(), Error> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive).map_err(|e| Error::io_with_path(&e, &archive))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| extraction_failed("failed to read zip archive", &e))?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| extraction_failed("failed to read zip entry", &e))?;
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let out = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out).map_err(|e| Error::io_with_path(&e, &out))?;
                continue;
            }
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
            }
            let mut file = std::fs::File::create(&out).map_err(|e| Error::io_with_path(&e, &out))?;
            std::io::copy(&mut entry, &mut file)
                .map_err(|e| extraction_failed("failed to extract zip entry", &e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&out, std::fs::Permissions::from_mode(mode)).ok();
                }
            }
        }
        Ok::<(), Error>(())
    })
    .await
    .map_err(|e| extraction_failed("extraction task failed", &e))?
}

/// The single top-level directory of `dest`, or `dest`
pub(crate) async fn source_root(dest: &Path) -> Result<PathBuf, Error> {
    let mut entries = tokio::fs::read_dir(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;
    let mut only: Option<PathBuf> = None;
    let mut count = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?
    {
        count += 1;
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            only = Some(entry.path());
        }
    }
    match (count, only) {
        (1, Some(dir)) => Ok(dir),
        _ => Ok(dest.to_path_buf()),
    }
}
