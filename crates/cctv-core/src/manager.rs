//! Camera manager: owns the capture worker and fans frames and detections out
//! to stream consumers.
//!
//! One OS thread captures, detects, annotates and encodes while a camera is
//! on. The newest encoded frame is published on a `watch` channel, so slow
//! HTTP clients skip frames instead of stalling capture. Detections go to the
//! persistent log and a `broadcast` channel for event subscribers.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::annotate::annotate;
use crate::camera::{available_cameras, CameraBackend, CaptureSettings, Frame, FrameSource};
use crate::config::Config;
use crate::detect::{Detection, Detector};
use crate::encode::encode_jpeg;
use crate::log::{DetectionLog, DetectionRecord};

const READ_RETRY_DELAY: Duration = Duration::from_millis(100);
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlOutcome {
    pub success: bool,
    pub message: String,
}

impl ControlOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub camera_on: bool,
    pub current_idx: u32,
    pub yolo_available: bool,
    pub detection_count: u64,
}

/// One annotated, encoded frame.
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub jpeg: Bytes,
    pub frame_number: u64,
    pub timestamp_ms: i64,
    pub camera_idx: u32,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(flatten)]
    pub record: DetectionRecord,
    pub bbox: [f32; 4],
    pub frame_number: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    pub capture: CaptureSettings,
    pub jpeg_quality: u8,
    pub scan_limit: u32,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ManagerSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            capture: CaptureSettings::from(&cfg.camera),
            jpeg_quality: cfg.camera.jpeg_quality,
            scan_limit: cfg.camera.scan_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared pipeline state
// ---------------------------------------------------------------------------

/// State the capture worker shares with the manager.
struct Pipeline {
    detector: Option<Mutex<Box<dyn Detector>>>,
    log: Arc<DetectionLog>,
    frames: watch::Sender<Option<FramePacket>>,
    events: broadcast::Sender<DetectionEvent>,
    detection_count: AtomicU64,
    jpeg_quality: u8,
}

impl Pipeline {
    fn process(&self, frame: Frame, camera_idx: u32, frame_number: u64) {
        let Frame { mut image, captured_at } = frame;

        let detections = match &self.detector {
            Some(detector) => {
                let mut detector = detector.lock().unwrap_or_else(|e| e.into_inner());
                match detector.detect(&image) {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(camera = camera_idx, frame = frame_number, error = %e, "detection failed");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };
        if !detections.is_empty() {
            annotate(&mut image, &detections);
        }

        let jpeg = match encode_jpeg(&image, self.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!(camera = camera_idx, frame = frame_number, error = %e, "dropping frame");
                return;
            }
        };

        if !detections.is_empty() {
            self.record(&detections, captured_at, camera_idx, frame_number);
        }

        self.frames.send_replace(Some(FramePacket {
            jpeg,
            frame_number,
            timestamp_ms: captured_at.timestamp_millis(),
            camera_idx,
            detections,
        }));
    }

    fn record(
        &self,
        detections: &[Detection],
        at: DateTime<Local>,
        camera_idx: u32,
        frame_number: u64,
    ) {
        let records: Vec<DetectionRecord> = detections
            .iter()
            .map(|d| DetectionRecord::new(at, d.class_name.clone(), d.confidence, camera_idx))
            .collect();

        if let Err(e) = self.log.append(&records) {
            error!(path = %self.log.path().display(), error = %e, "failed to persist detection log");
        }
        self.detection_count
            .fetch_add(records.len() as u64, Ordering::Relaxed);

        for (record, det) in records.into_iter().zip(detections) {
            debug!(class = %record.class_name, confidence = record.confidence, "detection");
            // No subscribers is fine.
            let _ = self.events.send(DetectionEvent {
                record,
                bbox: det.bbox,
                frame_number,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Capture worker
// ---------------------------------------------------------------------------

struct CaptureWorker {
    index: u32,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl CaptureWorker {
    fn spawn(
        mut source: Box<dyn FrameSource>,
        pipeline: Arc<Pipeline>,
    ) -> std::io::Result<Self> {
        let index = source.index();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name(format!("cctv-capture-{index}"))
            .spawn(move || {
                let mut frame_number = 0u64;
                let mut failures = 0u64;
                while flag.load(Ordering::Acquire) {
                    match source.read_frame() {
                        Ok(frame) => {
                            if failures > 0 {
                                info!(camera = index, failures, "camera recovered");
                                failures = 0;
                            }
                            frame_number += 1;
                            pipeline.process(frame, index, frame_number);
                        }
                        Err(e) => {
                            failures += 1;
                            if failures == 1 || failures % 50 == 0 {
                                warn!(camera = index, failures, error = %e, "frame read failed");
                            }
                            thread::sleep(READ_RETRY_DELAY);
                        }
                    }
                }
                debug!(camera = index, frames = frame_number, "capture worker exiting");
            })?;
        Ok(Self {
            index,
            running,
            handle,
        })
    }

    /// Signal the worker and wait for it; the device is released on exit.
    fn shutdown(self) {
        self.running.store(false, Ordering::Release);
        if self.handle.join().is_err() {
            error!(camera = self.index, "capture worker panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// CameraManager
// ---------------------------------------------------------------------------

pub struct CameraManager {
    backend: Arc<dyn CameraBackend>,
    settings: ManagerSettings,
    pipeline: Arc<Pipeline>,
    worker: Mutex<Option<CaptureWorker>>,
    // Mirrors `worker.is_some()` so status reads never wait on open or join.
    camera_on: AtomicBool,
    current_idx: AtomicU32,
}

impl CameraManager {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        detector: Option<Box<dyn Detector>>,
        log: Arc<DetectionLog>,
        settings: ManagerSettings,
    ) -> Self {
        match &detector {
            Some(d) => info!(classes = d.labels().len(), "object detection ready"),
            None => info!("object detection unavailable; streaming raw frames"),
        }
        let (frames, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            settings,
            pipeline: Arc::new(Pipeline {
                detector: detector.map(Mutex::new),
                log,
                frames,
                events,
                detection_count: AtomicU64::new(0),
                jpeg_quality: settings.jpeg_quality,
            }),
            worker: Mutex::new(None),
            camera_on: AtomicBool::new(false),
            current_idx: AtomicU32::new(0),
        }
    }

    /// Open camera `index` and start capturing. Blocks while the device opens.
    pub fn start(&self, index: u32) -> ControlOutcome {
        let mut worker = self.lock_worker();
        if worker.is_some() {
            return ControlOutcome::ok("Camera is already running");
        }

        info!(camera = index, backend = self.backend.name(), "connecting camera");
        let source = match self.backend.open(index, &self.settings.capture) {
            Ok(source) => source,
            Err(e) => {
                warn!(camera = index, error = %e, "camera open failed");
                return ControlOutcome::failed(format!("Failed to connect camera {index}"));
            }
        };

        match CaptureWorker::spawn(source, self.pipeline.clone()) {
            Ok(spawned) => {
                *worker = Some(spawned);
                self.current_idx.store(index, Ordering::Relaxed);
                self.camera_on.store(true, Ordering::Release);
                info!(camera = index, "camera on");
                ControlOutcome::ok(format!("Camera {index} started"))
            }
            Err(e) => {
                error!(camera = index, error = %e, "failed to spawn capture worker");
                ControlOutcome::failed(format!("Failed to connect camera {index}"))
            }
        }
    }

    /// Stop capturing and release the device. Blocks until the worker exits.
    pub fn stop(&self) -> ControlOutcome {
        let mut worker = self.lock_worker();
        let Some(running) = worker.take() else {
            return ControlOutcome::ok("Camera is already stopped");
        };
        self.camera_on.store(false, Ordering::Release);
        running.shutdown();
        self.pipeline.frames.send_replace(None);
        info!("camera off");
        ControlOutcome::ok("Camera stopped")
    }

    pub fn status(&self) -> CameraStatus {
        CameraStatus {
            camera_on: self.is_running(),
            current_idx: self.current_idx.load(Ordering::Relaxed),
            yolo_available: self.yolo_available(),
            detection_count: self.pipeline.detection_count.load(Ordering::Relaxed),
        }
    }

    /// Lock-free; safe to call from async handlers.
    pub fn is_running(&self) -> bool {
        self.camera_on.load(Ordering::Acquire)
    }

    pub fn yolo_available(&self) -> bool {
        self.pipeline.detector.is_some()
    }

    /// Probe for cameras. The running camera is always listed since a busy
    /// device may refuse a second open.
    pub fn list_cameras(&self) -> Vec<u32> {
        let running = self.lock_worker().as_ref().map(|w| w.index);
        let mut found = available_cameras(self.backend.as_ref(), self.settings.scan_limit);
        found.extend(running);
        found.sort_unstable();
        found.dedup();
        found
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<Option<FramePacket>> {
        self.pipeline.frames.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DetectionEvent> {
        self.pipeline.events.subscribe()
    }

    pub fn latest_frame(&self) -> Option<FramePacket> {
        self.pipeline.frames.borrow().clone()
    }

    pub fn recent_detections(&self, limit: usize) -> Vec<DetectionRecord> {
        self.pipeline.log.recent(limit)
    }

    pub fn log(&self) -> &DetectionLog {
        &self.pipeline.log
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<CaptureWorker>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.camera_on.store(false, Ordering::Release);
        if let Some(worker) = self.lock_worker().take() {
            worker.shutdown();
        }
    }
}
