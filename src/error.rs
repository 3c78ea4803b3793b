use thiserror::Error;

/// Errors raised while turning a source image into a tile set
#[derive(Debug, Clone, Error)]
pub enum SliceError {
    /// Source bytes could not be decoded as a raster image
    #[error("Failed to decode source image: {message}")]
    Decode { message: String },

    /// Grid dimensions cannot partition the image
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// A cropped tile could not be encoded
    #[error("Failed to encode tile ({row}, {col}): {message}")]
    Encode { row: u32, col: u32, message: String },
}

/// Errors surfaced by an enhancement request
#[derive(Debug, Clone, Error)]
pub enum EnhanceError {
    /// No credential is available; nothing was sent to the service
    #[error("No credential configured for the enhancement service")]
    CredentialMissing,

    /// The service rejected the credential for the requested tier
    #[error("Permission denied by enhancement service: {message}")]
    PermissionDenied { message: String },

    /// Any other service failure (network, malformed response, safety block)
    #[error("Enhancement service error: {message}")]
    Service { message: String },

    /// The tile id is not part of the current tile set
    #[error("Tile not found: {tile_id}")]
    TileNotFound { tile_id: String },
}

/// Errors raised while exporting tiles
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// Export requested with zero tiles
    #[error("Cannot export an empty tile set")]
    EmptySet,

    /// The archive writer failed
    #[error("Failed to build archive: {0}")]
    Archive(String),
}

/// Raw failure reported by an enhancement client before classification.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct VendorError {
    /// HTTP status code, when the failure came from a response
    pub status: Option<u16>,

    /// Vendor-provided or transport error message
    pub message: String,
}

impl VendorError {
    /// Failure without an HTTP status (transport, decoding, etc.).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Failure carried by an HTTP response.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}
