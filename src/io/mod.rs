//! I/O module for reading and writing embroidery pattern files.
//!
//! Every supported format is a [`FormatAdapter`] held in an ordered
//! [`FormatRegistry`]. The free functions pick an adapter from an explicit
//! format hint, the file extension, or by asking each adapter in priority
//! order whether it recognizes the bytes.

pub mod batch;
pub mod bitio;
pub mod compound;
pub mod formats;
pub mod huffman;
pub mod lzh;
pub mod stitch_stream;

use crate::error::{EmbroideryError, Result};
use crate::geometry::DEFAULT_TOLERANCE;
use crate::notification::NotificationCollection;
use crate::pattern::Pattern;
use bitflags::bitflags;
use compound::ContainerConfig;
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};

pub use compound::CompoundFile;
pub use formats::{DstFormat, EcfFormat, ExpFormat, HusFormat, JefFormat, OfmFormat};

/// Detection score from which an adapter claims the input
pub const CONFIDENT_SCORE: u8 = 50;

bitflags! {
    /// Pattern content a format can store
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFeatures: u32 {
        const STITCHES = 0x001;
        const COLOR_CHANGES = 0x002;
        const TRIMS = 0x004;
        const STOPS = 0x008;
        /// Thread colors (not just a count of color changes)
        const THREAD_COLORS = 0x010;
        const HOOP = 0x020;
        const LAYERS = 0x040;
        /// Geometry blocks kept as geometry instead of flattened
        const GEOMETRY = 0x080;
        const DIMENSIONS = 0x100;
        const METADATA = 0x200;
        /// Payload is entropy coded (Huffman or LZH)
        const COMPRESSED = 0x400;
        /// Payload is stored in a compound container
        const CONTAINER = 0x800;
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options for saving patterns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoConfiguration {
    /// Maximum deviation, in pattern units, when geometry is flattened to
    /// stitches for formats without the `GEOMETRY` feature.
    ///
    /// Default: [`DEFAULT_TOLERANCE`] (0.1 mm).
    pub flatten_tolerance: f64,

    /// Container layout for compound-file formats
    pub container: ContainerConfig,

    /// When `true`, a thread color that is not in the format's palette is an
    /// error instead of being snapped to the nearest palette entry.
    ///
    /// Default: `false`.
    pub strict_threads: bool,
}

impl Default for IoConfiguration {
    fn default() -> Self {
        Self {
            flatten_tolerance: DEFAULT_TOLERANCE,
            container: ContainerConfig::default(),
            strict_threads: false,
        }
    }
}

impl IoConfiguration {
    pub fn with_flatten_tolerance(mut self, tolerance: f64) -> Self {
        self.flatten_tolerance = tolerance;
        self
    }

    pub fn with_container(mut self, container: ContainerConfig) -> Self {
        self.container = container;
        self
    }

    pub fn with_strict_threads(mut self, strict: bool) -> Self {
        self.strict_threads = strict;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.flatten_tolerance.is_finite() || self.flatten_tolerance <= 0.0 {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "flatten tolerance {} must be positive",
                self.flatten_tolerance
            )));
        }
        self.container.validate()
    }
}

// ---------------------------------------------------------------------------
// Adapters and registry
// ---------------------------------------------------------------------------

/// One file format
pub trait FormatAdapter: Send + Sync {
    /// Short lowercase identifier, also accepted as a format hint
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Lowercase file extensions without the dot
    fn extensions(&self) -> &'static [&'static str];

    fn features(&self) -> FormatFeatures;

    /// How sure the adapter is that `bytes` are in its format (0-100,
    /// [`CONFIDENT_SCORE`] and above claims the input)
    fn detect(&self, bytes: &[u8]) -> u8;

    fn load(&self, bytes: &[u8], notifications: &mut NotificationCollection) -> Result<Pattern>;

    fn save(
        &self,
        pattern: &Pattern,
        config: &IoConfiguration,
        notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>>;
}

/// Ordered set of adapters; order is detection priority
pub struct FormatRegistry {
    adapters: Vec<Box<dyn FormatAdapter>>,
}

impl FormatRegistry {
    /// An empty registry
    pub fn new() -> Self {
        FormatRegistry { adapters: Vec::new() }
    }

    /// All built-in formats in detection priority order
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(EcfFormat));
        registry.register(Box::new(OfmFormat));
        registry.register(Box::new(HusFormat));
        registry.register(Box::new(JefFormat));
        registry.register(Box::new(DstFormat));
        registry.register(Box::new(ExpFormat));
        registry
    }

    /// Append an adapter at the lowest priority
    pub fn register(&mut self, adapter: Box<dyn FormatAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> impl Iterator<Item = &dyn FormatAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }

    pub fn by_id(&self, id: &str) -> Option<&dyn FormatAdapter> {
        self.adapters().find(|a| a.id().eq_ignore_ascii_case(id))
    }

    pub fn by_extension(&self, extension: &str) -> Option<&dyn FormatAdapter> {
        let extension = extension.trim_start_matches('.');
        self.adapters()
            .find(|a| a.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension)))
    }

    /// Adapter named by a hint: a format id or an extension
    pub fn by_hint(&self, hint: &str) -> Result<&dyn FormatAdapter> {
        self.by_id(hint)
            .or_else(|| self.by_extension(hint))
            .ok_or_else(|| EmbroideryError::UnrecognizedFormat(format!("no format named '{}'", hint)))
    }

    /// First adapter, in priority order, confident about `bytes`
    pub fn detect(&self, bytes: &[u8]) -> Option<&dyn FormatAdapter> {
        self.adapters().find(|a| {
            let score = a.detect(bytes);
            tracing::trace!(format = a.id(), score, "format detection");
            score >= CONFIDENT_SCORE
        })
    }

    fn resolve(&self, bytes: &[u8], hint: Option<&str>) -> Result<&dyn FormatAdapter> {
        match hint {
            Some(hint) => self.by_hint(hint),
            None => self.detect(bytes).ok_or_else(|| {
                EmbroideryError::UnrecognizedFormat(format!("{} bytes matched no known format", bytes.len()))
            }),
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

static DEFAULT_REGISTRY: Lazy<FormatRegistry> = Lazy::new(FormatRegistry::with_defaults);

/// The registry of built-in formats
pub fn registry() -> &'static FormatRegistry {
    &DEFAULT_REGISTRY
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a pattern from bytes
pub fn load(bytes: &[u8], hint: Option<&str>) -> Result<Pattern> {
    load_with_notifications(bytes, hint).map(|(pattern, _)| pattern)
}

/// Load a pattern from bytes, returning the non-fatal issues met on the way
pub fn load_with_notifications(bytes: &[u8], hint: Option<&str>) -> Result<(Pattern, NotificationCollection)> {
    let adapter = registry().resolve(bytes, hint)?;
    load_with(adapter, bytes)
}

fn load_with(adapter: &dyn FormatAdapter, bytes: &[u8]) -> Result<(Pattern, NotificationCollection)> {
    let mut notifications = NotificationCollection::new();
    let pattern = adapter.load(bytes, &mut notifications)?;
    tracing::debug!(
        format = adapter.id(),
        bytes = bytes.len(),
        layers = pattern.layers.len(),
        stitches = pattern.stitch_count(),
        notifications = notifications.len(),
        "loaded pattern"
    );
    Ok((pattern, notifications))
}

/// Load a pattern file; without a hint the extension picks the format,
/// then content detection
pub fn load_file<P: AsRef<Path>>(path: P, hint: Option<&str>) -> Result<Pattern> {
    load_file_with_notifications(path, hint).map(|(pattern, _)| pattern)
}

pub fn load_file_with_notifications<P: AsRef<Path>>(
    path: P,
    hint: Option<&str>,
) -> Result<(Pattern, NotificationCollection)> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(EmbroideryError::Io)?;
    let registry = registry();
    let adapter = match hint {
        Some(hint) => registry.by_hint(hint)?,
        None => match path.extension().and_then(|e| e.to_str()).and_then(|e| registry.by_extension(e)) {
            Some(adapter) => adapter,
            None => registry.resolve(&bytes, None)?,
        },
    };
    load_with(adapter, &bytes)
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Save a pattern in the named format
pub fn save(pattern: &Pattern, format: &str) -> Result<Vec<u8>> {
    save_with_notifications(pattern, format).map(|(bytes, _)| bytes)
}

pub fn save_with_notifications(pattern: &Pattern, format: &str) -> Result<(Vec<u8>, NotificationCollection)> {
    save_with_config(pattern, format, &IoConfiguration::default())
}

/// Save with explicit options
pub fn save_with_config(
    pattern: &Pattern,
    format: &str,
    config: &IoConfiguration,
) -> Result<(Vec<u8>, NotificationCollection)> {
    config.validate()?;
    let adapter = registry().by_hint(format)?;
    let mut notifications = NotificationCollection::new();
    let bytes = adapter.save(pattern, config, &mut notifications)?;
    tracing::debug!(
        format = adapter.id(),
        bytes = bytes.len(),
        notifications = notifications.len(),
        "saved pattern"
    );
    Ok((bytes, notifications))
}

/// Save to a file through a sibling temporary file renamed into place
pub fn save_file<P: AsRef<Path>>(path: P, pattern: &Pattern, format: &str) -> Result<NotificationCollection> {
    save_file_with_config(path, pattern, format, &IoConfiguration::default())
}

pub fn save_file_with_config<P: AsRef<Path>>(
    path: P,
    pattern: &Pattern,
    format: &str,
    config: &IoConfiguration,
) -> Result<NotificationCollection> {
    let path = path.as_ref();
    let (bytes, notifications) = save_with_config(pattern, format, config)?;
    let temp = temp_path(path);
    let written = fs::write(&temp, &bytes).and_then(|_| fs::rename(&temp, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&temp);
        return Err(EmbroideryError::Io(err));
    }
    Ok(notifications)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pattern".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
