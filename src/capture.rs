//! Capture device boundary for test-mode recording.
//!
//! The session controller is the only component allowed to hold a capture
//! handle. Acquisition can take arbitrary time and can fail; finalization
//! is asynchronous and yields the recorded artifact; release is synchronous
//! best-effort and idempotent.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opaque binary blob produced by a finished capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact(pub Vec<u8>);

impl Artifact {
  pub fn bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
  PermissionDenied,
  DeviceUnavailable,
  /// The device dropped the take before it could be finalized
  CaptureLost(String),
}

impl std::fmt::Display for CaptureError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CaptureError::PermissionDenied => write!(f, "Recording permission denied"),
      CaptureError::DeviceUnavailable => write!(f, "Capture device unavailable"),
      CaptureError::CaptureLost(detail) => write!(f, "Capture lost: {}", detail),
    }
  }
}

impl std::error::Error for CaptureError {}

/// A source of capture handles.
///
/// Futures are `Send` so a controller owning the device can run on the
/// runtime's worker threads.
pub trait CaptureDevice: Send + 'static {
  type Handle: CaptureHandle;

  fn acquire(&mut self) -> impl Future<Output = Result<Self::Handle, CaptureError>> + Send;
}

/// One live recording.
pub trait CaptureHandle: Send + 'static {
  /// Stop the recording and yield its artifact.
  fn finalize(&mut self) -> impl Future<Output = Result<Artifact, CaptureError>> + Send;

  /// Release the underlying hardware resource. Idempotent.
  fn release(&mut self);
}

/// Shared counters for a [`MemoryCapture`] device.
///
/// `max_open` makes the single-flight guarantee observable: it must never
/// exceed 1 for a correctly driven session.
#[derive(Debug, Default)]
pub struct CaptureStats {
  open: AtomicUsize,
  max_open: AtomicUsize,
  acquired: AtomicUsize,
  released: AtomicUsize,
}

impl CaptureStats {
  pub fn currently_open(&self) -> usize {
    self.open.load(Ordering::SeqCst)
  }

  pub fn max_open(&self) -> usize {
    self.max_open.load(Ordering::SeqCst)
  }

  pub fn acquired(&self) -> usize {
    self.acquired.load(Ordering::SeqCst)
  }

  pub fn released(&self) -> usize {
    self.released.load(Ordering::SeqCst)
  }
}

/// Deterministic in-memory capture device.
///
/// Every acquire yields a handle whose artifact is a small tagged payload,
/// unless the device was built with a scripted failure. Used by tests and
/// headless runs; real hardware backends implement the same pair of traits.
pub struct MemoryCapture {
  fail_with: Option<CaptureError>,
  stats: Arc<CaptureStats>,
}

impl MemoryCapture {
  pub fn new() -> Self {
    Self {
      fail_with: None,
      stats: Arc::new(CaptureStats::default()),
    }
  }

  /// A device whose every acquisition fails with the given error.
  pub fn failing(error: CaptureError) -> Self {
    Self {
      fail_with: Some(error),
      stats: Arc::new(CaptureStats::default()),
    }
  }

  pub fn stats(&self) -> Arc<CaptureStats> {
    Arc::clone(&self.stats)
  }
}

impl Default for MemoryCapture {
  fn default() -> Self {
    Self::new()
  }
}

impl CaptureDevice for MemoryCapture {
  type Handle = MemoryHandle;

  async fn acquire(&mut self) -> Result<MemoryHandle, CaptureError> {
    if let Some(error) = &self.fail_with {
      return Err(error.clone());
    }

    let seq = self.stats.acquired.fetch_add(1, Ordering::SeqCst);
    let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
    self.stats.max_open.fetch_max(open, Ordering::SeqCst);

    Ok(MemoryHandle {
      seq,
      released: false,
      stats: Arc::clone(&self.stats),
    })
  }
}

#[derive(Debug)]
pub struct MemoryHandle {
  seq: usize,
  released: bool,
  stats: Arc<CaptureStats>,
}

impl CaptureHandle for MemoryHandle {
  async fn finalize(&mut self) -> Result<Artifact, CaptureError> {
    Ok(Artifact(format!("take-{}", self.seq).into_bytes()))
  }

  fn release(&mut self) {
    if self.released {
      return;
    }
    self.released = true;
    self.stats.open.fetch_sub(1, Ordering::SeqCst);
    self.stats.released.fetch_add(1, Ordering::SeqCst);
  }
}

impl Drop for MemoryHandle {
  fn drop(&mut self) {
    self.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_memory_capture_yields_artifacts() {
    let mut device = MemoryCapture::new();

    let mut first = device.acquire().await.unwrap();
    let artifact = first.finalize().await.unwrap();
    assert_eq!(artifact.bytes(), b"take-0");
    first.release();

    let mut second = device.acquire().await.unwrap();
    assert_eq!(second.finalize().await.unwrap().bytes(), b"take-1");
    second.release();
  }

  #[tokio::test]
  async fn test_release_is_idempotent() {
    let mut device = MemoryCapture::new();
    let stats = device.stats();

    let mut handle = device.acquire().await.unwrap();
    assert_eq!(stats.currently_open(), 1);

    handle.release();
    handle.release();
    handle.release();

    assert_eq!(stats.currently_open(), 0);
    assert_eq!(stats.released(), 1);
  }

  #[tokio::test]
  async fn test_drop_releases() {
    let mut device = MemoryCapture::new();
    let stats = device.stats();

    {
      let _handle = device.acquire().await.unwrap();
      assert_eq!(stats.currently_open(), 1);
    }

    assert_eq!(stats.currently_open(), 0);
  }

  #[tokio::test]
  async fn test_failing_device() {
    let mut device = MemoryCapture::failing(CaptureError::PermissionDenied);
    let stats = device.stats();

    assert_eq!(
      device.acquire().await.unwrap_err(),
      CaptureError::PermissionDenied
    );
    assert_eq!(stats.acquired(), 0);
  }

  #[tokio::test]
  async fn test_open_accounting_tracks_concurrency() {
    let mut device = MemoryCapture::new();
    let stats = device.stats();

    let mut a = device.acquire().await.unwrap();
    let mut b = device.acquire().await.unwrap();
    assert_eq!(stats.max_open(), 2);

    a.release();
    b.release();
    assert_eq!(stats.currently_open(), 0);
  }
}
