use std::path::Path;

use crate::PullError;

/// Supported layer formats for bundle images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LayerFormat {
    /// Gzip-compressed tar layer.
    TarGz,
    /// Uncompressed tar layer.
    Tar,
}

impl LayerFormat {
    /// Detects the format from an OCI or Docker layer media type.
    pub(crate) fn detect(media_type: &str) -> Result<Self, PullError> {
        if media_type.ends_with("tar+gzip") || media_type.ends_with(".tar.gzip") {
            Ok(Self::TarGz)
        } else if media_type.ends_with(".tar") || media_type.ends_with(".tar.v1") {
            Ok(Self::Tar)
        } else {
            Err(PullError::UnsupportedMediaType(media_type.to_owned()))
        }
    }
}

/// Unpacks a layer blob into the target directory.
pub(crate) fn extract_layer(blob: &Path, target: &Path, format: LayerFormat) -> Result<(), PullError> {
    std::fs::create_dir_all(target)?;

    let file = std::fs::File::open(blob)?;

    match format {
        LayerFormat::TarGz => {
            let decoder = flate2::read::GzDecoder::new(file);
            let mut archive = tar::Archive::new(decoder);
            archive.unpack(target)?;
        }
        LayerFormat::Tar => {
            let mut archive = tar::Archive::new(file);
            archive.unpack(target)?;
        }
    }

    Ok(())
}
