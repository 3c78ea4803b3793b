//! Export of tiles as single images or a zip bundle.
//!
//! Every export uses the best available image of a tile: the enhanced image
//! when present, the original crop otherwise.
//!
//! # Naming
//!
//! ```text
//! single image:   tile-{row+1}-{col+1}.{ext}
//! archive entry:  tile_{row+1}_{col+1}.{ext}
//! archive:        images_collection_{unix_millis}.zip
//! ```
//!
//! `{ext}` comes from the detected format of the image bytes, so an enhanced
//! JPEG is exported as `.jpg` even though the original crop was PNG.

use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use image::ImageFormat;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExportError;
use crate::tile::Tile;

/// Conventional folder for nested archive entries.
pub const DEFAULT_ARCHIVE_FOLDER: &str = "split_images";

/// An image ready to be served or saved.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    /// Encoded image bytes
    pub data: Bytes,

    /// Suggested file name
    pub filename: String,

    /// MIME type of `data`
    pub content_type: &'static str,
}

/// Builds single-image exports and zip archives of tiles.
#[derive(Debug, Clone, Default)]
pub struct BundleExporter {
    folder: Option<String>,
}

impl BundleExporter {
    /// Exporter writing archive entries at the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nest archive entries inside `folder`.
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        let folder = folder.trim_matches('/');
        self.folder = if folder.is_empty() {
            None
        } else {
            Some(folder.to_string())
        };
        self
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// Best available image of one tile, with its download name.
    pub fn export_single(&self, tile: &Tile) -> ExportedImage {
        let data = tile.best_image().clone();
        let format = detect_format(&data);

        ExportedImage {
            filename: format!(
                "tile-{}-{}.{}",
                tile.row() + 1,
                tile.col() + 1,
                extension(format)
            ),
            content_type: format.to_mime_type(),
            data,
        }
    }

    /// Zip archive with one entry per tile, in the given order.
    ///
    /// # Errors
    ///
    /// - [`ExportError::EmptySet`] if `tiles` is empty
    /// - [`ExportError::Archive`] if the zip writer fails
    pub fn export_all<'a, I>(&self, tiles: I) -> Result<Bytes, ExportError>
    where
        I: IntoIterator<Item = &'a Tile>,
    {
        let mut tiles = tiles.into_iter().peekable();
        if tiles.peek().is_none() {
            return Err(ExportError::EmptySet);
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut entries = 0usize;

        for tile in tiles {
            let data = tile.best_image();
            let name = self.entry_name(tile, detect_format(data));

            writer
                .start_file(name.as_str(), options)
                .map_err(|e| ExportError::Archive(e.to_string()))?;
            writer
                .write_all(data)
                .map_err(|e| ExportError::Archive(e.to_string()))?;
            entries += 1;
        }

        let archive = writer
            .finish()
            .map_err(|e| ExportError::Archive(e.to_string()))?
            .into_inner();

        debug!(entries, bytes = archive.len(), "Built tile archive");
        Ok(Bytes::from(archive))
    }

    fn entry_name(&self, tile: &Tile, format: ImageFormat) -> String {
        let file = format!(
            "tile_{}_{}.{}",
            tile.row() + 1,
            tile.col() + 1,
            extension(format)
        );
        match &self.folder {
            Some(folder) => format!("{folder}/{file}"),
            None => file,
        }
    }
}

/// Suggested download name for an archive, stamped with the current time.
pub fn archive_filename() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("images_collection_{millis}.zip")
}

fn detect_format(data: &[u8]) -> ImageFormat {
    image::guess_format(data).unwrap_or(ImageFormat::Png)
}

fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("png")
}

// =============================================================================
// Tests
// =============================================================================
