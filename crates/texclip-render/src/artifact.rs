//! Rendered image with metadata

/// PNG file signature
const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Final encoded image handed to the caller exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderArtifact {
    /// PNG-encoded image bytes
    pub png: Vec<u8>,
    /// Image width in pixels, padding included
    pub width: u32,
    /// Image height in pixels, padding included
    pub height: u32,
}

impl RenderArtifact {
    /// Create a new artifact
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self { png, width, height }
    }

    /// Check if the data starts with the PNG signature
    pub fn is_valid_png(&self) -> bool {
        self.png.len() >= PNG_SIGNATURE.len() && &self.png[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
    }

    /// Consume the artifact, returning the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.png
    }
}
