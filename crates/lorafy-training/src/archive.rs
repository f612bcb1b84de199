//! Size-aware normalization of uploaded image archives.
//!
//! Archives within the size budget pass through untouched. Larger archives are
//! rebuilt with every image downscaled to a maximum side length and
//! re-encoded as JPEG; all other entries are copied as-is. When budget
//! enforcement is on, progressively smaller passes are tried before giving up.

use crate::error::{NormalizationError, NormalizationResult};
use bytes::Bytes;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// 100 MiB, the upload limit of the hosted Files API.
pub const DEFAULT_SIZE_BUDGET: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
/// 512 MiB; every entry is decompressed into memory.
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;
/// Largest `max_dimension` accepted, matching the JPEG format's limit.
pub const MAX_DIMENSION_LIMIT: u32 = 65_535;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];
const MIN_JPEG_QUALITY: u8 = 40;
const QUALITY_STEP: u8 = 10;

/// An archive as received from the user. Never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArchive {
    bytes: Bytes,
    filename: String,
}

impl UploadedArchive {
    pub fn new(bytes: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Summary of what normalization did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub original_size: u64,
    pub normalized_size: u64,
    /// Entries in the output archive; zero for a passthrough.
    pub entries: usize,
    pub images_reencoded: usize,
    /// Rebuild passes performed; zero for a passthrough.
    pub passes: u32,
}

/// An archive ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArchive {
    bytes: Bytes,
    report: NormalizationReport,
}

impl NormalizedArchive {
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn report(&self) -> &NormalizationReport {
        &self.report
    }

    /// Whether the archive was rebuilt rather than passed through.
    pub fn was_rebuilt(&self) -> bool {
        self.report.passes > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    /// Archives at or below this many bytes are not touched.
    pub size_budget: u64,
    /// Longest image side after the first pass, in pixels.
    pub max_dimension: u32,
    /// JPEG quality of the first pass (1-100).
    pub jpeg_quality: u8,
    /// Retry with smaller images and fail if the budget still cannot be met.
    pub enforce_budget: bool,
    /// Entries larger than this when decompressed are rejected.
    pub max_entry_size: u64,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            size_budget: DEFAULT_SIZE_BUDGET,
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            enforce_budget: true,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

impl NormalizerOptions {
    pub fn validate(&self) -> NormalizationResult<()> {
        if self.size_budget == 0 {
            return Err(NormalizationError::InvalidOptions(
                "size_budget must be > 0".to_string(),
            ));
        }
        if !(1..=MAX_DIMENSION_LIMIT).contains(&self.max_dimension) {
            return Err(NormalizationError::InvalidOptions(format!(
                "max_dimension must be within 1..={MAX_DIMENSION_LIMIT}"
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(NormalizationError::InvalidOptions(
                "jpeg_quality must be within 1..=100".to_string(),
            ));
        }
        if self.max_entry_size == 0 {
            return Err(NormalizationError::InvalidOptions(
                "max_entry_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Rebuild passes in the order they are tried.
    fn passes(&self) -> Vec<Pass> {
        let first = Pass {
            max_dimension: self.max_dimension,
            quality: self.jpeg_quality,
        };
        if !self.enforce_budget {
            return vec![first];
        }

        let mut passes = vec![first];
        let smaller = [self.max_dimension / 4 * 3, self.max_dimension / 2];
        for (step, dimension) in smaller.into_iter().enumerate() {
            let quality = self
                .jpeg_quality
                .saturating_sub(QUALITY_STEP * (step as u8 + 1))
                .max(MIN_JPEG_QUALITY.min(self.jpeg_quality));
            passes.push(Pass {
                max_dimension: dimension.max(1),
                quality,
            });
        }
        passes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pass {
    max_dimension: u32,
    quality: u8,
}

/// Whether an entry name has an image extension this normalizer re-encodes.
pub fn is_image_entry(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS.iter().any(|candidate| ext.eq_ignore_ascii_case(candidate))
    })
}

/// Brings an uploaded archive within the size budget.
///
/// Archives within budget are returned as the same buffer. Otherwise the
/// archive is rebuilt; see the module docs for the pass ladder.
pub fn normalize(
    archive: UploadedArchive,
    options: &NormalizerOptions,
) -> NormalizationResult<NormalizedArchive> {
    normalize_with_cancel(archive, options, &CancellationToken::new())
}

/// Like [`normalize`], but stops between entries once `cancel` fires.
pub fn normalize_with_cancel(
    archive: UploadedArchive,
    options: &NormalizerOptions,
    cancel: &CancellationToken,
) -> NormalizationResult<NormalizedArchive> {
    options.validate()?;
    let original_size = archive.size();

    if original_size <= options.size_budget {
        debug!(
            filename = %archive.filename,
            size_bytes = original_size,
            budget = options.size_budget,
            "Archive within budget; passing through"
        );
        return Ok(NormalizedArchive {
            bytes: archive.bytes,
            report: NormalizationReport {
                original_size,
                normalized_size: original_size,
                entries: 0,
                images_reencoded: 0,
                passes: 0,
            },
        });
    }

    info!(
        filename = %archive.filename,
        size_bytes = original_size,
        budget = options.size_budget,
        "Archive exceeds budget; re-encoding images"
    );

    let passes = options.passes();
    let mut last_size = original_size;
    for (index, pass) in passes.iter().enumerate() {
        let rebuilt = rebuild(&archive.bytes, *pass, options.max_entry_size, cancel)?;
        let size = rebuilt.bytes.len() as u64;
        let report = NormalizationReport {
            original_size,
            normalized_size: size,
            entries: rebuilt.entries,
            images_reencoded: rebuilt.images,
            passes: index as u32 + 1,
        };
        debug!(
            pass = index + 1,
            max_dimension = pass.max_dimension,
            quality = pass.quality,
            size_bytes = size,
            "Rebuilt archive"
        );

        if !options.enforce_budget || size <= options.size_budget {
            if size > options.size_budget {
                warn!(
                    size_bytes = size,
                    budget = options.size_budget,
                    "Archive still exceeds budget after re-encoding"
                );
            }
            return Ok(NormalizedArchive {
                bytes: Bytes::from(rebuilt.bytes),
                report,
            });
        }
        last_size = size;
    }

    Err(NormalizationError::BudgetExceeded {
        size: last_size,
        budget: options.size_budget,
        passes: passes.len() as u32,
    })
}

struct Rebuilt {
    bytes: Vec<u8>,
    entries: usize,
    images: usize,
}

fn rebuild(
    source: &[u8],
    pass: Pass,
    max_entry_size: u64,
    cancel: &CancellationToken,
) -> NormalizationResult<Rebuilt> {
    let mut archive = ZipArchive::new(Cursor::new(source))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0;
    let mut images = 0;
    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            return Err(NormalizationError::Cancelled);
        }

        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        entries += 1;

        if entry.is_dir() {
            writer.add_directory(name.as_str(), options)?;
            continue;
        }

        // The declared size is untrusted; the read below is bounded too.
        let too_large = || NormalizationError::EntryTooLarge {
            entry: name.clone(),
            limit: max_entry_size,
        };
        if entry.size() > max_entry_size {
            return Err(too_large());
        }
        let mut contents = Vec::new();
        entry
            .by_ref()
            .take(max_entry_size.saturating_add(1))
            .read_to_end(&mut contents)?;
        if contents.len() as u64 > max_entry_size {
            return Err(too_large());
        }

        writer.start_file(name.as_str(), options)?;
        if is_image_entry(&name) {
            writer.write_all(&reencode_image(&name, &contents, pass)?)?;
            images += 1;
        } else {
            writer.write_all(&contents)?;
        }
    }

    let bytes = writer.finish()?.into_inner();
    Ok(Rebuilt {
        bytes,
        entries,
        images,
    })
}

fn reencode_image(name: &str, contents: &[u8], pass: Pass) -> NormalizationResult<Vec<u8>> {
    let image_error = |source| NormalizationError::Image {
        entry: name.to_string(),
        source,
    };

    let decoded = image::load_from_memory(contents).map_err(image_error)?;
    let rgb = fit_within(decoded, pass.max_dimension).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, pass.quality)
        .encode_image(&rgb)
        .map_err(image_error)?;
    Ok(out)
}

/// Downscales so the longest side is at most `max_dimension`, keeping aspect
/// ratio. Smaller images are returned unchanged.
fn fit_within(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    if image.width().max(image.height()) <= max_dimension {
        return image;
    }
    image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}
