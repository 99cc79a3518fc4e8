//! Camera capture.
//!
//! A `Camera` is an exclusively-held device. `CaptureSession` acquires it on `open` and releases
//! it exactly once, whether the session ends with a capture, a cancel, or by being dropped.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Error, Result};
use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The text shown over the live feed to help the user frame the receipt.
pub const FRAMING_GUIDE: &str = "Align receipt within frame";

/// The MIME type of every captured image.
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Which way the camera should face.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Away from the user, towards the receipt.
    #[default]
    Environment,
    User,
}

serde_plain::derive_display_from_serialize!(Facing);

/// A device that produces JPEG frames.
#[async_trait::async_trait]
pub trait Camera: Send {
    /// Acquires the device. Fails if permission is denied or there is no such device.
    async fn open(&mut self, facing: Facing) -> Res<()>;

    /// Returns the current frame, JPEG encoded.
    async fn frame(&mut self) -> Res<Vec<u8>>;

    /// Releases the device. Only called after a successful `open`.
    fn release(&mut self);
}

/// A single still image, base64 encoded JPEG.
#[derive(Clone, Eq, PartialEq)]
pub struct CapturedImage {
    base64: String,
}

impl CapturedImage {
    /// Wraps JPEG bytes. Fails if the bytes do not start with a JPEG marker.
    pub fn from_jpeg(bytes: &[u8]) -> Res<Self> {
        if !bytes.starts_with(&JPEG_SOI) {
            bail!("The frame is not a JPEG image")
        }
        Ok(Self {
            base64: STANDARD.encode(bytes),
        })
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn mime_type(&self) -> &'static str {
        JPEG_MIME_TYPE
    }
}

impl Debug for CapturedImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CapturedImage({} base64 chars)", self.base64.len())
    }
}

/// An open camera. Dropping the session releases the camera.
pub struct CaptureSession {
    camera: Box<dyn Camera>,
    released: bool,
}

impl CaptureSession {
    /// Opens the environment-facing camera.
    ///
    /// # Errors
    /// A capture error if the camera cannot be acquired. The camera is not released in that case
    /// because it was never held.
    pub async fn open(mut camera: Box<dyn Camera>) -> Result<Self> {
        camera
            .open(Facing::Environment)
            .await
            .context("Unable to access camera. Please check permissions.")
            .pub_result(ErrorType::Capture)?;
        debug!("Camera opened, showing '{FRAMING_GUIDE}'");
        Ok(Self {
            camera,
            released: false,
        })
    }

    /// Freezes the current frame and returns it. One image per call.
    pub async fn capture(&mut self) -> Result<CapturedImage> {
        if self.released {
            return Err(Error::msg(ErrorType::Capture, "The camera has been closed"));
        }
        let frame = self
            .camera
            .frame()
            .await
            .context("Unable to read a frame from the camera")
            .pub_result(ErrorType::Capture)?;
        let image = CapturedImage::from_jpeg(&frame).pub_result(ErrorType::Capture)?;
        debug!("Captured a {} byte frame", frame.len());
        Ok(image)
    }

    /// Releases the camera. Calling it again, or dropping the session afterwards, does nothing.
    pub fn close(&mut self) {
        if !self.released {
            self.released = true;
            self.camera.release();
            debug!("Camera released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl Debug for CaptureSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("released", &self.released)
            .finish()
    }
}

/// A camera whose single frame is a JPEG file on disk, e.g. the output of a scanner or a photo
/// copied from a phone.
#[derive(Debug, Clone)]
pub struct FileCamera {
    path: PathBuf,
    frame: Option<Vec<u8>>,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
        }
    }
}

#[async_trait::async_trait]
impl Camera for FileCamera {
    async fn open(&mut self, facing: Facing) -> Res<()> {
        if facing != Facing::Environment {
            warn!("A file camera has no {facing} side, using the file anyway");
        }
        if !self.path.is_file() {
            bail!("No image found at '{}'", self.path.display())
        }
        self.frame = Some(utils::read_bytes(&self.path).await?);
        Ok(())
    }

    async fn frame(&mut self) -> Res<Vec<u8>> {
        self.frame.clone().context("The camera is not open")
    }

    fn release(&mut self) {
        self.frame = None;
    }
}

/// An in-memory camera. Counts releases so that tests can check that the device is always freed.
///
/// Note: this is compiled even in the "production" version of this app so that the whole app can
/// be run top-to-bottom without a real image.
#[derive(Debug, Clone)]
pub struct TestCamera {
    frame: Vec<u8>,
    deny: bool,
    open: bool,
    releases: Arc<AtomicUsize>,
}

impl TestCamera {
    /// A camera that produces `frame`.
    pub fn new(frame: Vec<u8>) -> Self {
        Self {
            frame,
            deny: false,
            open: false,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A camera for which permission is always denied.
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    /// How many times the camera has been released. Shared between clones.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl Default for TestCamera {
    /// A camera that produces a tiny, valid-looking JPEG.
    fn default() -> Self {
        Self::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0xFF, 0xD9])
    }
}

#[async_trait::async_trait]
impl Camera for TestCamera {
    async fn open(&mut self, _facing: Facing) -> Res<()> {
        if self.deny {
            bail!("Permission denied")
        }
        self.open = true;
        Ok(())
    }

    async fn frame(&mut self) -> Res<Vec<u8>> {
        if !self.open {
            bail!("The camera is not open")
        }
        Ok(self.frame.clone())
    }

    fn release(&mut self) {
        self.open = false;
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
