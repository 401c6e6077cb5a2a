use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::constants::{WHISPER_MODEL_BASE_URL, WHISPER_MODEL_SIZES};
use super::hardware::ComputeType;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("unknown model size '{0}' (expected one of: {sizes})", sizes = WHISPER_MODEL_SIZES.join(", "))]
    UnknownModel(String),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// A whisper.cpp model picked by size and precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    size: String,
    compute_type: ComputeType,
}

impl ModelSpec {
    pub fn new(size: &str, compute_type: ComputeType) -> Result<Self, ModelResolveError> {
        if !WHISPER_MODEL_SIZES.contains(&size) {
            return Err(ModelResolveError::UnknownModel(size.to_string()));
        }
        Ok(Self {
            size: size.to_string(),
            compute_type,
        })
    }

    /// ggml file name, e.g. `ggml-small-q8_0.bin` for int8.
    ///
    /// `large` means `large-v3`, which is only published as q5_0 when
    /// quantized.
    pub fn file_name(&self) -> String {
        let size = match self.size.as_str() {
            "large" => "large-v3",
            other => other,
        };
        match (self.compute_type, size) {
            (ComputeType::Float16, _) => format!("ggml-{size}.bin"),
            (ComputeType::Int8, "large-v3") => format!("ggml-{size}-q5_0.bin"),
            (ComputeType::Int8, _) => format!("ggml-{size}-q8_0.bin"),
        }
    }

    pub fn url(&self) -> String {
        format!("{WHISPER_MODEL_BASE_URL}/{}", self.file_name())
    }
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Find the model file for `spec`, downloading it on first use.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled directory, if given
/// 3. Download into the cache
pub fn resolve(
    spec: &ModelSpec,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let name = spec.file_name();
    let cache_dir = model_cache_dir()?;
    let cached_path = cache_dir.join(&name);
    if cached_path.exists() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    if let Some(path) = bundled_dir.map(|dir| dir.join(&name)).filter(|p| p.exists()) {
        return Ok(path);
    }

    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {name}");
    download(&spec.url(), &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/VidSearch/models/`
/// - Linux: `$XDG_CACHE_HOME/VidSearch/models/` or `~/.cache/VidSearch/models/`
/// - Windows: `%LOCALAPPDATA%/VidSearch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("VidSearch").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_err = |e: reqwest::Error| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);

    // Stream into a .part file and rename once complete
    let temp_path = dest.with_extension("part");
    let write_err = |path: &Path, e: io::Error| ModelResolveError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    let file = fs::File::create(&temp_path).map_err(|e| write_err(&temp_path, e))?;
    let mut writer = ProgressWriter::new(file, total, progress);

    let copied = io::copy(&mut response, &mut writer).and_then(|_| writer.flush());
    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(&temp_path, e));
    }
    drop(writer);

    fs::rename(&temp_path, dest).map_err(|e| write_err(dest, e))
}

/// Counts bytes on their way to disk and reports every megabyte.
struct ProgressWriter<W> {
    inner: W,
    written: u64,
    reported: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl<W: Write> ProgressWriter<W> {
    const REPORT_EVERY: u64 = 1024 * 1024;

    fn new(inner: W, total: u64, progress: Option<ProgressFn>) -> Self {
        Self {
            inner,
            written: 0,
            reported: 0,
            total,
            progress,
        }
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        if self.written - self.reported >= Self::REPORT_EVERY || self.written == self.total {
            self.reported = self.written;
            if let Some(ref cb) = self.progress {
                cb(self.written, self.total);
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
