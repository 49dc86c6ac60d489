//! Loading pipeline: finds data files, deserializes them and builds the
//! variant catalog and engine config.
//!
//! A data directory holds:
//!
//! - `variants.{ron,toml,json}` (required) -- the variant list
//! - `engine.{ron,toml,json}` (optional) -- [`EngineConfig`] overrides
//!
//! File-level problems (missing, unreadable, unparsable, conflicting
//! formats) are errors. A single bad variant entry is logged and skipped.

use crate::schema::{TomlVariants, VariantData};
use ductwork_core::catalog::{CatalogBuilder, VariantCatalog, VariantDef};
use ductwork_core::sim::EngineConfig;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const VARIANTS_FILE: &str = "variants";
pub const ENGINE_FILE: &str = "engine";

/// Largest magnitude accepted for a drop-shape value.
const MAX_DROP_VALUE: f64 = 1_000.0;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A config value parsed but is out of range.
    #[error("invalid value for '{field}' in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        detail: String,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `Err(ConflictingFormats)` if more
/// than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &'static str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name,
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Read the variant list. TOML files hold it as `[[variants]]` tables; RON
/// and JSON files hold a bare list.
pub fn deserialize_variants(path: &Path) -> Result<Vec<VariantData>, DataLoadError> {
    match detect_format(path)? {
        Format::Toml => deserialize_file::<TomlVariants>(path).map(|w| w.variants),
        Format::Ron | Format::Json => deserialize_file(path),
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything loaded from one data directory.
#[derive(Debug, Clone)]
pub struct PipeData {
    pub catalog: VariantCatalog,
    pub config: EngineConfig,
}

/// Build the catalog from `variants.*` in `dir`. Entries the catalog
/// rejects are logged and skipped.
pub fn load_catalog(dir: &Path) -> Result<VariantCatalog, DataLoadError> {
    let path = require_data_file(dir, VARIANTS_FILE)?;
    let entries = deserialize_variants(&path)?;
    let total = entries.len();

    let mut builder = CatalogBuilder::new();
    for entry in entries {
        builder.register_or_skip(VariantDef::from(entry));
    }
    let skipped = total - builder.len();
    if skipped > 0 {
        tracing::warn!(file = %path.display(), skipped, "skipped invalid pipe variants");
    }
    Ok(builder.build())
}

/// Read `engine.*` from `dir`, or the defaults when there is none.
pub fn load_engine_config(dir: &Path) -> Result<EngineConfig, DataLoadError> {
    let Some(path) = find_data_file(dir, ENGINE_FILE)? else {
        tracing::debug!(dir = %dir.display(), "no engine config, using defaults");
        return Ok(EngineConfig::default());
    };
    let config: EngineConfig = deserialize_file(&path)?;
    validate_config(&config, &path)?;
    Ok(config)
}

/// Load the catalog and engine config from `dir`.
pub fn load_pipe_data(dir: &Path) -> Result<PipeData, DataLoadError> {
    let catalog = load_catalog(dir)?;
    let config = load_engine_config(dir)?;
    tracing::info!(
        dir = %dir.display(),
        variants = catalog.len(),
        "loaded pipe data"
    );
    Ok(PipeData { catalog, config })
}

/// Drop-shape values are converted to fixed point, so they must be finite
/// and within range.
fn validate_config(config: &EngineConfig, path: &Path) -> Result<(), DataLoadError> {
    let drop = &config.drop;
    let fields = [
        ("drop.base_speed", drop.base_speed),
        ("drop.spread", drop.spread),
        ("drop.exit_offset", drop.exit_offset),
        ("drop.horizontal_height", drop.horizontal_height),
        ("drop.vertical_height", drop.vertical_height),
        ("drop.down_nudge", drop.down_nudge),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value.abs() > MAX_DROP_VALUE {
            return Err(DataLoadError::InvalidValue {
                file: path.to_path_buf(),
                field,
                detail: format!("{value} is not a finite value within ±{MAX_DROP_VALUE}"),
            });
        }
    }
    if drop.spread < 0.0 {
        return Err(DataLoadError::InvalidValue {
            file: path.to_path_buf(),
            field: "drop.spread",
            detail: "must not be negative".to_string(),
        });
    }
    if config.tick_duration_ms == 0 {
        return Err(DataLoadError::InvalidValue {
            file: path.to_path_buf(),
            field: "tick_duration_ms",
            detail: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
