use std::path::Path;

use log::{error, info, warn};

use crate::config::InputOutputSpecConfig;
use crate::fs_utils::{list_image_file_names, output_image_names, output_timestamp};
use crate::models::PathSpec;

/// Builds the path spec for whichever strategy the global config selects.
/// Directory problems are logged and reported as `None`.
pub async fn build_path_spec(config: &InputOutputSpecConfig) -> Option<PathSpec> {
    let timestamp = output_timestamp();
    match config {
        InputOutputSpecConfig::PairOfDirectories {
            source_dir,
            reference_dir,
            output_dir,
        } => build_for_pair_of_directories(source_dir, reference_dir, output_dir, &timestamp).await,
        InputOutputSpecConfig::SingleDirectory {
            input_dir,
            output_dir,
        } => build_for_single_directory(input_dir, output_dir, &timestamp).await,
    }
}

/// Cross-joins every source image with every reference image, source-major.
/// Each item sends `[source, reference]` and writes two derived outputs.
pub async fn build_for_pair_of_directories(
    source_dir: &Path,
    reference_dir: &Path,
    output_dir: &Path,
    timestamp: &str,
) -> Option<PathSpec> {
    let source_files = read_image_names(source_dir).await?;
    let reference_files = read_image_names(reference_dir).await?;

    info!("Source images: {source_files:?}");
    info!("Reference images: {reference_files:?}");

    let mut spec = PathSpec::new();
    for source in &source_files {
        for reference in &reference_files {
            add_pair(
                &mut spec,
                (source_dir, source),
                (reference_dir, reference),
                output_dir,
                timestamp,
            )?;
        }
    }

    Some(spec)
}

/// Groups the sorted images of one directory into consecutive pairs
/// (`image_0000.png` + `image_0001.png`, ...). The first of each pair is the
/// source, the second the reference.
pub async fn build_for_single_directory(
    input_dir: &Path,
    output_dir: &Path,
    timestamp: &str,
) -> Option<PathSpec> {
    let input_files = read_image_names(input_dir).await?;
    info!("Input images: {input_files:?}");

    let mut pairs = input_files.chunks_exact(2);
    let mut spec = PathSpec::new();
    for pair in pairs.by_ref() {
        add_pair(
            &mut spec,
            (input_dir, &pair[0]),
            (input_dir, &pair[1]),
            output_dir,
            timestamp,
        )?;
    }

    if let [leftover] = pairs.remainder() {
        warn!("Skipping unpaired image '{leftover}' in {}", input_dir.display());
    }

    Some(spec)
}

async fn read_image_names(dir: &Path) -> Option<Vec<String>> {
    match list_image_file_names(dir).await {
        Ok(names) => Some(names),
        Err(err) => {
            error!("Error reading directory '{}': {err}", dir.display());
            None
        }
    }
}

fn add_pair(
    spec: &mut PathSpec,
    (source_dir, source): (&Path, &str),
    (reference_dir, reference): (&Path, &str),
    output_dir: &Path,
    timestamp: &str,
) -> Option<()> {
    let (applied, transferred) = output_image_names(source, reference, timestamp);
    info!("Output images: {applied}, {transferred}");

    let result = spec.add_item_with_lists(
        vec![source_dir.join(source), reference_dir.join(reference)],
        vec![output_dir.join(applied), output_dir.join(transferred)],
    );

    match result {
        Ok(()) => Some(()),
        Err(err) => {
            error!("Failed to add path spec item for '{source}' and '{reference}': {err}");
            None
        }
    }
}
