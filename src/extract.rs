//! Archive extraction
//!
//! Unpacks zip, tar, tar.gz and tar.zst archives, either from a file on disk
//! or from an in-memory payload such as an embedded asset. The format is
//! chosen from the file name, never sniffed from the content.

use crate::error::{SelfextError, SelfextResult};
use std::fs;
use std::io::{self, Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info};

/// Archive container formats understood by [`Extractor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format from a file name (case-insensitive)
    pub fn from_file_name(name: &str) -> SelfextResult<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".zip") {
            Ok(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Ok(Self::TarZst)
        } else if lower.ends_with(".tar") {
            Ok(Self::Tar)
        } else {
            Err(SelfextError::UnsupportedFormat(name.to_string()))
        }
    }

    /// Detect the format from a path's final component
    pub fn from_path(path: &Path) -> SelfextResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SelfextError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_file_name(name)
    }

    /// Whether a generated wrapper can unpack this format at run time.
    ///
    /// The wrapper only links the Go standard library, which has no zstd.
    pub fn is_self_extractable(&self) -> bool {
        !matches!(self, Self::TarZst)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
        }
    }

    /// Fixed file name the archive is staged and embedded under.
    ///
    /// `//go:embed` refuses many legal file names (`=`, glob characters,
    /// reserved Windows names), so the user's name never reaches it.
    pub fn payload_name(&self) -> String {
        format!("payload.{}", self.name())
    }
}

/// Unpacks archives into a destination directory
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Unpack an archive file into `dest`
    pub fn unpack(&self, archive_path: &Path, dest: &Path) -> SelfextResult<()> {
        let format = ArchiveFormat::from_path(archive_path)?;
        info!(
            "Extracting {} to {} ({})",
            archive_path.display(),
            dest.display(),
            format.name()
        );

        fs::create_dir_all(dest)?;
        let file = fs::File::open(archive_path)?;
        self.unpack_reader(format, io::BufReader::new(file), dest)
    }

    /// Unpack an in-memory archive into `dest`, using `file_name_hint` for format detection
    pub fn unpack_bytes(&self, bytes: &[u8], file_name_hint: &str, dest: &Path) -> SelfextResult<()> {
        let format = ArchiveFormat::from_file_name(file_name_hint)?;
        debug!(
            "Extracting {} ({} bytes, {}) to {}",
            file_name_hint,
            bytes.len(),
            format.name(),
            dest.display()
        );

        fs::create_dir_all(dest)?;
        self.unpack_reader(format, Cursor::new(bytes), dest)
    }

    fn unpack_reader<R: Read + Seek>(
        &self,
        format: ArchiveFormat,
        reader: R,
        dest: &Path,
    ) -> SelfextResult<()> {
        match format {
            ArchiveFormat::Zip => self.extract_zip(reader, dest),
            ArchiveFormat::Tar => self.extract_tar(reader, dest),
            ArchiveFormat::TarGz => self.extract_tar(flate2::read::GzDecoder::new(reader), dest),
            ArchiveFormat::TarZst => {
                let decoder = zstd::stream::read::Decoder::new(reader)?;
                self.extract_tar(decoder, dest)
            }
        }
    }

    fn extract_zip<R: Read + Seek>(&self, reader: R, dest: &Path) -> SelfextResult<()> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| invalid_data(format!("Failed to read zip: {}", e)))?;

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| invalid_data(format!("Failed to read zip entry: {}", e)))?;

            // enclosed_name rejects absolute paths and `..` escapes
            let Some(file_path) = file.enclosed_name() else {
                return Err(invalid_data(format!(
                    "Zip entry escapes destination: {}",
                    file.name()
                ))
                .into());
            };
            let full_path = dest.join(file_path);

            if file.is_dir() {
                fs::create_dir_all(&full_path)?;
                continue;
            }

            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&full_path)?;
            io::copy(&mut file, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    if mode & 0o111 != 0 {
                        fs::set_permissions(&full_path, fs::Permissions::from_mode(mode & 0o777))?;
                    }
                }
            }
        }

        Ok(())
    }

    fn extract_tar<R: Read>(&self, reader: R, dest: &Path) -> SelfextResult<()> {
        let mut archive = tar::Archive::new(reader);
        archive.set_preserve_permissions(true);
        // unpack() refuses entries outside `dest`
        archive.unpack(dest)?;
        Ok(())
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
