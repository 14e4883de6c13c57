use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{DynamicImage, ImageFormat};
use tokio::fs;
use tokio::fs::try_exists;

use crate::constants::{
    ALLOWED_IMAGE_EXTENSIONS, APPLIED_TO_SEPARATOR, CANDIDATE_MARKER, OUTPUT_IMAGE_EXTENSION,
    OUTPUT_TIMESTAMP_FORMAT, TRANSFERRED_FROM_SEPARATOR,
};
use crate::error::ItemError;

/// An input image read into memory, ready to be sent inline.
#[derive(Debug, Clone)]
pub struct InputImage {
    pub path: PathBuf,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn is_allowed_image_file_name(file_name: &str) -> bool {
    ALLOWED_IMAGE_EXTENSIONS
        .iter()
        .any(|ext| file_name.ends_with(&format!(".{ext}")))
}

/// Sorted names of the entries in `dir` whose extension is allowed.
/// Symlinks are followed; only directories are left out. A dangling link is
/// kept by name and fails later when the image is opened.
pub async fn list_image_file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if let Ok(metadata) = fs::metadata(entry.path()).await {
            if metadata.is_dir() {
                continue;
            }
        }

        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };

        if is_allowed_image_file_name(&file_name) {
            names.push(file_name);
        }
    }

    names.sort();
    Ok(names)
}

/// `path/to/image.jpg` -> `path/to/image`. Only the last extension goes.
pub fn remove_file_extension(file_name: &str) -> String {
    let path = Path::new(file_name);
    match (path.extension(), path.file_stem()) {
        (Some(_), Some(stem)) => path
            .with_file_name(stem)
            .to_string_lossy()
            .into_owned(),
        _ => file_name.to_string(),
    }
}

pub fn output_timestamp() -> String {
    Local::now().format(OUTPUT_TIMESTAMP_FORMAT).to_string()
}

/// The two output names for a (source, reference) pair. Order matters:
/// the first is the reference applied to the source, the second the source
/// with the reference transferred onto it.
pub fn output_image_names(
    source_image_name: &str,
    reference_image_name: &str,
    timestamp: &str,
) -> (String, String) {
    let source = remove_file_extension(source_image_name);
    let reference = remove_file_extension(reference_image_name);

    let applied = format!(
        "{reference}{APPLIED_TO_SEPARATOR}{source}-{timestamp}.{OUTPUT_IMAGE_EXTENSION}"
    );
    let transferred = format!(
        "{source}{TRANSFERRED_FROM_SEPARATOR}{reference}-{timestamp}.{OUTPUT_IMAGE_EXTENSION}"
    );
    (applied, transferred)
}

/// `out/a.png` with index 2 -> `out/a.candidate.2.png`.
pub fn candidate_output_path(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match path.extension() {
        Some(ext) => format!(
            "{stem}.{CANDIDATE_MARKER}.{index}.{}",
            ext.to_string_lossy()
        ),
        None => format!("{stem}.{CANDIDATE_MARKER}.{index}"),
    };

    path.with_file_name(file_name)
}

/// Output paths for candidate `index`. Candidate 0 keeps the requested paths.
pub fn candidate_output_paths(output_file_path_list: &[PathBuf], index: usize) -> Vec<PathBuf> {
    if index == 0 {
        return output_file_path_list.to_vec();
    }

    output_file_path_list
        .iter()
        .map(|path| candidate_output_path(path, index))
        .collect()
}

pub fn resolve_mime_type(candidate: Option<&str>, path: &Path) -> String {
    if let Some(value) = candidate {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

pub fn default_extension_for_mime(mime_type: &str) -> Option<String> {
    let mime = mime_type.trim().to_lowercase();
    let ext = match mime.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        _ => None,
    };

    if let Some(value) = ext {
        return Some(value.to_string());
    }

    mime.split('/').nth(1).map(|value| value.to_string())
}

pub async fn load_input_image(path: &Path) -> Result<InputImage, ItemError> {
    let bytes = fs::read(path).await.map_err(|err| ItemError::InputImage {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    let sniffed = image::guess_format(&bytes).ok();
    let mime_type = resolve_mime_type(sniffed.map(|format| format.to_mime_type()), path);

    // AVIF brands are not always recognised by the sniffer; trust the name.
    if sniffed.is_none() && mime_type != "image/avif" {
        return Err(ItemError::InputImage {
            path: path.to_path_buf(),
            reason: "unrecognised image format".to_string(),
        });
    }

    Ok(InputImage {
        path: path.to_path_buf(),
        mime_type,
        bytes,
    })
}

/// Decodes a returned image once and saves it to every path, each in the
/// format its extension names.
pub async fn write_output_image(bytes: &[u8], paths: &[PathBuf]) -> Result<(), ItemError> {
    let image = image::load_from_memory(bytes).map_err(|err| ItemError::Decode(err.to_string()))?;

    for path in paths {
        let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
        let mut encoded = Cursor::new(Vec::new());
        // JPEG has no alpha channel.
        let result = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut encoded, format)
        } else {
            image.write_to(&mut encoded, format)
        };
        result
            .map_err(|err| ItemError::Write {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        fs::write(path, encoded.into_inner())
            .await
            .map_err(|err| ItemError::Write {
                path: path.clone(),
                reason: err.to_string(),
            })?;
    }

    Ok(())
}

pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !try_exists(path).await? {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}
