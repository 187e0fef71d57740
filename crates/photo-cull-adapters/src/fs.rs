//! Filesystem catalog adapter.
//!
//! Scans files and directories, reads the metadata the core needs from the
//! image itself and its EXIF block, and persists rating/label write-backs to
//! a JSON sidecar next to each file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use exif::{In, Reader, Tag, Value};
use image::{DynamicImage, GenericImageView};
use photo_cull_core::domain::{RAW_FORMATS, RASTER_FORMATS};
use photo_cull_core::ports::keys;
use photo_cull_core::{Catalog, ItemId, MetadataValue, PhotoItem};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{debug, warn};

/// Suffix appended to an image path to name its sidecar.
pub const SIDECAR_SUFFIX: &str = ".cull.json";

/// Longest edge the histogram is computed on.
const HISTOGRAM_EDGE: u32 = 512;

/// Keys persisted to the sidecar.
const SIDECAR_KEYS: &[&str] = &[keys::RATING, keys::LABEL];

struct Record {
    path: PathBuf,
    metadata: HashMap<String, MetadataValue>,
}

impl Record {
    fn write_sidecar(&self) -> Result<()> {
        let persisted: BTreeMap<&str, &MetadataValue> = SIDECAR_KEYS
            .iter()
            .filter_map(|key| self.metadata.get(*key).map(|value| (*key, value)))
            .collect();
        let sidecar = sidecar_path(&self.path);
        let json = serde_json::to_vec_pretty(&persisted)?;
        std::fs::write(&sidecar, json)
            .with_context(|| format!("Failed to write sidecar: {}", sidecar.display()))
    }
}

/// Catalog backed by image files on disk.
///
/// Item ids are the file paths as given (or as found while walking a
/// directory). Files named explicitly are kept even when their format is not
/// supported, so the batch can report them as invalid; directory walks only
/// pick up supported images.
pub struct FsCatalog {
    ids: Vec<ItemId>,
    records: HashMap<ItemId, Mutex<Record>>,
}

impl FsCatalog {
    /// Scans `paths` and reads metadata for every file found.
    #[must_use]
    pub fn scan(paths: &[PathBuf], recursive: bool) -> Self {
        let mut files = Vec::new();
        for path in paths {
            if path.is_file() {
                if !is_supported_image(path) {
                    warn!("Unsupported file type: {}", path.display());
                }
                files.push(path.clone());
            } else if path.is_dir() {
                collect_from_dir(path, recursive, &mut files);
            } else {
                warn!("Path does not exist: {}", path.display());
            }
        }

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(files.len());
        let mut records = HashMap::with_capacity(files.len());
        for path in files {
            let id = ItemId::new(path.to_string_lossy());
            if !seen.insert(id.clone()) {
                debug!(item = %id, "skipping repeated path");
                continue;
            }
            let metadata = read_metadata(&path);
            ids.push(id.clone());
            records.insert(id, Mutex::new(Record { path, metadata }));
        }
        debug!("Found {} files", ids.len());

        Self { ids, records }
    }

    /// Item ids in scan order.
    #[must_use]
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Snapshots of every scanned item, in scan order.
    #[must_use]
    pub fn items(&self) -> Vec<PhotoItem> {
        self.ids
            .iter()
            .map(|id| PhotoItem::from_catalog(self, id.clone()))
            .collect()
    }

    /// Number of scanned files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// File path of an item.
    #[must_use]
    pub fn path(&self, id: &ItemId) -> Option<PathBuf> {
        let record = self.records.get(id)?.lock().ok()?;
        Some(record.path.clone())
    }
}

impl Catalog for FsCatalog {
    fn get_metadata(&self, id: &ItemId, key: &str) -> Option<MetadataValue> {
        let record = self.records.get(id)?.lock().ok()?;
        record.metadata.get(key).cloned()
    }

    fn set_metadata(&self, id: &ItemId, key: &str, value: MetadataValue) -> Result<()> {
        let record = self
            .records
            .get(id)
            .with_context(|| format!("unknown item {id}"))?;
        let mut record = record
            .lock()
            .map_err(|_| anyhow!("catalog record for {id} is poisoned"))?;
        record.metadata.insert(key.to_string(), value);
        if SIDECAR_KEYS.contains(&key) {
            record.write_sidecar()?;
        }
        Ok(())
    }
}

fn collect_from_dir(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to read directory {}: {e}", dir.display());
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_file() && is_supported_image(&path) {
            files.push(path);
        } else if path.is_dir() && recursive {
            collect_from_dir(&path, recursive, files);
        }
    }
}

/// Upper-case extension of a path.
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_uppercase)
        .unwrap_or_default()
}

/// Checks if a path has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    let ext = extension(path);
    RASTER_FORMATS.contains(&ext.as_str()) || RAW_FORMATS.contains(&ext.as_str())
}

/// Sidecar file that persists write-backs for `path`.
#[must_use]
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Reads everything the catalog knows about one file.
///
/// Never fails: unreadable parts are logged and left out, and the batch's
/// validation reports the item.
fn read_metadata(path: &Path) -> HashMap<String, MetadataValue> {
    let mut metadata = HashMap::new();
    let ext = extension(path);
    metadata.insert(
        keys::PATH.to_string(),
        MetadataValue::Text(path.to_string_lossy().into_owned()),
    );
    metadata.insert(keys::FILE_FORMAT.to_string(), MetadataValue::Text(ext.clone()));
    if let Ok(meta) = std::fs::metadata(path) {
        let size = i64::try_from(meta.len()).unwrap_or(i64::MAX);
        metadata.insert(keys::FILE_SIZE.to_string(), MetadataValue::Integer(size));
    }

    if RAW_FORMATS.contains(&ext.as_str()) {
        read_raw(path, &mut metadata);
    } else if RASTER_FORMATS.contains(&ext.as_str()) {
        read_raster(path, &mut metadata);
    } else {
        return metadata;
    }

    read_exif(path, &mut metadata);
    read_sidecar(path, &mut metadata);
    metadata
}

fn insert_dimensions(metadata: &mut HashMap<String, MetadataValue>, width: u64, height: u64) {
    let to_value = |v: u64| MetadataValue::Integer(i64::try_from(v).unwrap_or(i64::MAX));
    metadata.insert(keys::WIDTH.to_string(), to_value(width));
    metadata.insert(keys::HEIGHT.to_string(), to_value(height));
}

fn read_raster(path: &Path, metadata: &mut HashMap<String, MetadataValue>) {
    let image = match image::open(path) {
        Ok(image) => image,
        Err(e) => {
            warn!("Failed to open image {}: {e}", path.display());
            return;
        }
    };
    let (width, height) = image.dimensions();
    insert_dimensions(metadata, u64::from(width), u64::from(height));
    metadata.insert(
        keys::HISTOGRAM.to_string(),
        MetadataValue::Buckets(histogram(&image)),
    );
}

fn read_raw(path: &Path, metadata: &mut HashMap<String, MetadataValue>) {
    match rawloader::decode_file(path) {
        Ok(raw) => {
            let width = u64::try_from(raw.width).unwrap_or(0);
            let height = u64::try_from(raw.height).unwrap_or(0);
            insert_dimensions(metadata, width, height);
        }
        Err(e) => warn!("Failed to decode RAW {}: {e}", path.display()),
    }
}

/// 256-bucket histogram with the three RGB channels summed, as fractions of
/// the pixel count (so the buckets add up to 3).
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#[must_use]
pub fn histogram(image: &DynamicImage) -> Vec<f32> {
    let rgb = if image.width() > HISTOGRAM_EDGE || image.height() > HISTOGRAM_EDGE {
        image.thumbnail(HISTOGRAM_EDGE, HISTOGRAM_EDGE).to_rgb8()
    } else {
        image.to_rgb8()
    };

    let mut counts = [0_u64; 256];
    for pixel in rgb.pixels() {
        for channel in pixel.0 {
            counts[usize::from(channel)] += 1;
        }
    }

    let pixels = u64::from(rgb.width()) * u64::from(rgb.height());
    if pixels == 0 {
        return vec![0.0; 256];
    }
    counts
        .iter()
        .map(|&count| (count as f64 / pixels as f64) as f32)
        .collect()
}

fn read_exif(path: &Path, metadata: &mut HashMap<String, MetadataValue>) {
    let Ok(file) = File::open(path) else {
        return;
    };
    let mut reader = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF in {}: {e}", path.display());
            return;
        }
    };

    let field = |tag| exif.get_field(tag, In::PRIMARY).map(|f| &f.value);

    let taken = field(Tag::DateTimeOriginal).or_else(|| field(Tag::DateTime));
    if let Some(time) = taken.and_then(ascii).and_then(|raw| {
        let offset = field(Tag::OffsetTimeOriginal).and_then(ascii);
        parse_exif_datetime(&raw, offset.as_deref())
    }) {
        metadata.insert(keys::CAPTURE_TIME.to_string(), MetadataValue::Timestamp(time));
    }

    if let Some(iso) = field(Tag::PhotographicSensitivity).and_then(|v| v.get_uint(0)) {
        metadata.insert(keys::ISO.to_string(), MetadataValue::Integer(i64::from(iso)));
    }
    if let Some(aperture) = field(Tag::FNumber).and_then(rational) {
        metadata.insert(keys::APERTURE.to_string(), MetadataValue::Number(aperture));
    }
    if let Some(focal) = field(Tag::FocalLength).and_then(rational) {
        metadata.insert(keys::FOCAL_LENGTH.to_string(), MetadataValue::Number(focal));
    }
}

fn ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }),
        _ => None,
    }
}

fn rational(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(parts) => parts
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| f64::from(r.num) / f64::from(r.denom)),
        _ => None,
    }
}

/// Parses an EXIF `YYYY:MM:DD HH:MM:SS` timestamp, applying the
/// `+HH:MM` offset tag when present and UTC otherwise.
#[must_use]
pub fn parse_exif_datetime(raw: &str, offset: Option<&str>) -> Option<OffsetDateTime> {
    let local = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]:[month]:[day] [hour]:[minute]:[second]"),
    )
    .ok()?;
    let offset = offset
        .and_then(|o| {
            UtcOffset::parse(
                o,
                format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
            )
            .ok()
        })
        .unwrap_or(UtcOffset::UTC);
    Some(local.assume_offset(offset))
}

fn read_sidecar(path: &Path, metadata: &mut HashMap<String, MetadataValue>) {
    let sidecar = sidecar_path(path);
    let Ok(content) = std::fs::read_to_string(&sidecar) else {
        return;
    };
    match serde_json::from_str::<HashMap<String, MetadataValue>>(&content) {
        Ok(values) => {
            for (key, value) in values {
                if SIDECAR_KEYS.contains(&key.as_str()) {
                    metadata.insert(key, value);
                }
            }
        }
        Err(e) => warn!("Ignoring unreadable sidecar {}: {e}", sidecar.display()),
    }
}
