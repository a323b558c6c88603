//! # Capture Encoders
//!
//! Writes frame buffers and camera state to files in the capture directory:
//! - color → tone-mapped 8-bit PNG (via `image`)
//! - depth → world-space point cloud as a `.npy` float32 array of shape `(n, 3)`
//! - camera → pretty-printed JSON

use glam::Vec3;
use image::{ImageFormat, RgbaImage};
use remote_protocol::CameraState;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::camera;
use crate::host::{ColorFrame, DepthFrame};

const DISPLAY_GAMMA: f32 = 2.2;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no {0} frame has been rendered")]
    EmptyFrame(&'static str),

    #[error("{kind} frame holds {len} values, expected {width}x{height}")]
    FrameSize {
        kind: &'static str,
        width: u32,
        height: u32,
        len: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

// ─── Output Naming ──────────────────────────────────────────────

/// Where capture files go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub dir: PathBuf,
    pub prefix: String,
}

impl CaptureSettings {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// A fresh `<dir>/<prefix>-<action>-<8 hex>.<ext>` path. Creates the
    /// directory if needed.
    pub fn output_path(&self, action: &str, ext: &str) -> Result<PathBuf, CaptureError> {
        fs::create_dir_all(&self.dir)?;
        let id = Uuid::new_v4().simple().to_string();
        Ok(self
            .dir
            .join(format!("{}-{}-{}.{}", self.prefix, action, &id[..8], ext)))
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::new(".", "studio")
    }
}

fn check_size(kind: &'static str, width: u32, height: u32, len: usize) -> Result<(), CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyFrame(kind));
    }
    if len != width as usize * height as usize {
        return Err(CaptureError::FrameSize {
            kind,
            width,
            height,
            len,
        });
    }
    Ok(())
}

// ─── Color ──────────────────────────────────────────────────────

/// Linear channel value to an 8-bit display value.
pub fn tone_map_channel(value: f32) -> u8 {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    (v.powf(1.0 / DISPLAY_GAMMA) * 255.0).round() as u8
}

/// Tone-maps a color frame into a top-down RGBA image. Alpha is not
/// gamma-corrected.
pub fn tone_map(frame: &ColorFrame) -> Result<RgbaImage, CaptureError> {
    check_size("color", frame.width, frame.height, frame.pixels.len())?;
    let width = frame.width as usize;

    let mut bytes = Vec::with_capacity(frame.pixels.len() * 4);
    for row in frame.pixels.chunks_exact(width).rev() {
        for &[r, g, b, a] in row {
            bytes.extend_from_slice(&[
                tone_map_channel(r),
                tone_map_channel(g),
                tone_map_channel(b),
                (a.clamp(0.0, 1.0) * 255.0).round() as u8,
            ]);
        }
    }

    RgbaImage::from_raw(frame.width, frame.height, bytes).ok_or(CaptureError::FrameSize {
        kind: "color",
        width: frame.width,
        height: frame.height,
        len: frame.pixels.len(),
    })
}

pub fn save_rgb(frame: &ColorFrame, path: &Path) -> Result<(), CaptureError> {
    let image = tone_map(frame)?;
    image.save_with_format(path, ImageFormat::Png)?;
    debug!("Wrote {}x{} color capture to {}", frame.width, frame.height, path.display());
    Ok(())
}

// ─── Depth ──────────────────────────────────────────────────────

/// Turns per-pixel ray distances into world-space points, top row first.
///
/// Pixels whose depth is not finite (background) become `NaN` points so the
/// output keeps one row per pixel.
pub fn unproject_depth(
    frame: &DepthFrame,
    camera_state: &CameraState,
) -> Result<Vec<[f32; 3]>, CaptureError> {
    check_size("depth", frame.width, frame.height, frame.depth.len())?;
    let (width, height) = (frame.width as usize, frame.height as usize);
    let aspect = frame.width as f32 / frame.height as f32;
    let tan_half = (frame.fovy.to_radians() * 0.5).tan();
    let c2w = camera::camera_to_world(camera_state);

    let mut points = Vec::with_capacity(width * height);
    for (row_from_bottom, row) in frame.depth.chunks_exact(width).enumerate().rev() {
        let ndc_y = (row_from_bottom as f32 + 0.5) / height as f32 * 2.0 - 1.0;
        for (x, &depth) in row.iter().enumerate() {
            if !depth.is_finite() {
                points.push([f32::NAN; 3]);
                continue;
            }
            let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
            let ray = Vec3::new(ndc_x * tan_half * aspect, ndc_y * tan_half, -1.0).normalize();
            points.push(c2w.transform_point3(ray * depth).to_array());
        }
    }
    Ok(points)
}

/// Writes an `(n, 3)` little-endian float32 array in NPY 1.0 format.
pub fn write_npy<W: Write>(mut writer: W, points: &[[f32; 3]]) -> io::Result<()> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, 3), }}",
        points.len()
    );
    // magic (6) + version (2) + header length (2) + header, padded to 64 bytes
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    writer.write_all(b"\x93NUMPY\x01\x00")?;
    let header_len = u16::try_from(header.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "npy header too long"))?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for point in points {
        for value in point {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()
}

pub fn save_depth(
    frame: &DepthFrame,
    camera_state: &CameraState,
    path: &Path,
) -> Result<(), CaptureError> {
    let points = unproject_depth(frame, camera_state)?;
    write_npy(BufWriter::new(File::create(path)?), &points)?;
    debug!("Wrote {} depth points to {}", points.len(), path.display());
    Ok(())
}

// ─── Camera ─────────────────────────────────────────────────────

pub fn save_camera(state: &CameraState, path: &Path) -> Result<(), CaptureError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, state)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
