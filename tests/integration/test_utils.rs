//! Test utilities for integration tests.
//!
//! This module provides a mock enhancement client and helpers for creating
//! fixture images.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::Notify;

use tilesmith::enhance::{Credential, EnhancementClient, QualityLevel};
use tilesmith::VendorError;

// =============================================================================
// Fixture Images
// =============================================================================

/// Gradient image where each pixel encodes its own coordinates.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x / 256 + y / 256) % 256) as u8])
    })
}

/// Encode an RGB image in `format`.
pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// A small solid-colour PNG standing in for an enhanced result.
pub fn enhanced_png(shade: u8) -> Bytes {
    let image = RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade]));
    Bytes::from(encode(&image, ImageFormat::Png))
}

/// Decode bytes and return their dimensions.
pub fn decoded_dimensions(data: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(data).unwrap();
    (image.width(), image.height())
}

// =============================================================================
// Mock Enhancement Client
// =============================================================================

/// Behaviour of [`MockEnhancementClient`] for the next calls.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed(Bytes),
    Fail(VendorError),
}

struct Gate {
    started: Notify,
    release: Notify,
}

struct MockState {
    behavior: Mutex<MockBehavior>,
    calls: AtomicUsize,
    qualities: Mutex<Vec<QualityLevel>>,
    credentials: Mutex<Vec<String>>,
    gate: Option<Gate>,
}

/// Enhancement client with scripted results and call tracking.
///
/// Clones share state, so a test can keep a handle after moving one into
/// the code under test.
#[derive(Clone)]
pub struct MockEnhancementClient {
    state: Arc<MockState>,
}

impl MockEnhancementClient {
    fn build(behavior: MockBehavior, gate: Option<Gate>) -> Self {
        Self {
            state: Arc::new(MockState {
                behavior: Mutex::new(behavior),
                calls: AtomicUsize::new(0),
                qualities: Mutex::new(Vec::new()),
                credentials: Mutex::new(Vec::new()),
                gate,
            }),
        }
    }

    /// Client that answers every call with `image`.
    pub fn succeeding(image: Bytes) -> Self {
        Self::build(MockBehavior::Succeed(image), None)
    }

    /// Client that fails every call with `error`.
    pub fn failing(error: VendorError) -> Self {
        Self::build(MockBehavior::Fail(error), None)
    }

    /// Client that blocks each call until [`release`](Self::release).
    pub fn gated(image: Bytes) -> Self {
        Self::build(
            MockBehavior::Succeed(image),
            Some(Gate {
                started: Notify::new(),
                release: Notify::new(),
            }),
        )
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.state.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn qualities(&self) -> Vec<QualityLevel> {
        self.state.qualities.lock().unwrap().clone()
    }

    pub fn credentials_seen(&self) -> Vec<String> {
        self.state.credentials.lock().unwrap().clone()
    }

    /// Wait until a gated call has started.
    pub async fn started(&self) {
        if let Some(gate) = &self.state.gate {
            gate.started.notified().await;
        }
    }

    /// Let one gated call finish.
    pub fn release(&self) {
        if let Some(gate) = &self.state.gate {
            gate.release.notify_one();
        }
    }
}

#[async_trait]
impl EnhancementClient for MockEnhancementClient {
    async fn enhance(
        &self,
        _image: Bytes,
        quality: QualityLevel,
        credential: &Credential,
    ) -> Result<Bytes, VendorError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.qualities.lock().unwrap().push(quality);
        self.state
            .credentials
            .lock()
            .unwrap()
            .push(credential.expose().to_string());

        if let Some(gate) = &self.state.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        let behavior = self.state.behavior.lock().unwrap().clone();
        match behavior {
            MockBehavior::Succeed(image) => Ok(image),
            MockBehavior::Fail(error) => Err(error),
        }
    }
}
