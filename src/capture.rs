//! Quantization and PCM capture
//!
//! Filtered samples are dithered, clipped to 16 bits and appended to a raw
//! capture stream: little-endian `i16`, one sample per tick, no header. The
//! sample rate is implicit ([`SID_CLOCK_HZ`](crate::SID_CLOCK_HZ)).
//!
//! A second stream takes reference samples computed outside the harness
//! (e.g. by a software SID) so both can be compared offline with
//! [`compare_captures`].

use crate::dither::Dither;
use crate::{HarnessError, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Convert a filtered sample to a 16-bit code
///
/// Adds `dither`, saturates to the `i16` range, then truncates toward zero.
#[inline]
pub fn quantize(filtered: f64, dither: f64) -> i16 {
    let clipped = (filtered + dither).clamp(i16::MIN as f64, i16::MAX as f64);
    clipped as i16
}

/// Raw PCM capture stream, or a no-op when absent
pub struct CaptureSink {
    writer: Option<Box<dyn Write + Send>>,
    path: Option<PathBuf>,
    samples_written: u64,
    closed: bool,
}

impl CaptureSink {
    /// Create (truncate) a capture file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(Box::new(BufWriter::new(file))),
            path: Some(path.to_path_buf()),
            samples_written: 0,
            closed: false,
        })
    }

    /// Open a capture file, degrading to a no-op sink on failure
    ///
    /// The failure is logged as a warning; callers can check
    /// [`is_active`](Self::is_active).
    pub fn create_or_disabled<P: AsRef<Path>>(path: P, label: &str) -> Self {
        match Self::create(path.as_ref()) {
            Ok(sink) => {
                log::debug!("{label} capture -> {}", path.as_ref().display());
                sink
            }
            Err(e) => {
                log::warn!(
                    "cannot open {label} capture {}: {e}; samples will be discarded",
                    path.as_ref().display()
                );
                Self::disabled()
            }
        }
    }

    /// Capture into an arbitrary writer
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            path: None,
            samples_written: 0,
            closed: false,
        }
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self {
            writer: None,
            path: None,
            samples_written: 0,
            closed: false,
        }
    }

    /// True while samples are actually being persisted
    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    /// Destination file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Samples persisted so far
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Append one sample (2 bytes, little-endian)
    ///
    /// A no-op on a disabled sink; an error once the sink has been closed.
    pub fn write_sample(&mut self, sample: i16) -> Result<()> {
        if self.closed {
            return Err(HarnessError::ShutDown);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(&sample.to_le_bytes())?;
            self.samples_written += 1;
        }
        Ok(())
    }

    /// Stop persisting after a write failure
    fn disable(&mut self) {
        self.writer = None;
    }

    /// Flush and close; later calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink")
            .field("path", &self.path)
            .field("active", &self.is_active())
            .field("samples_written", &self.samples_written)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Dither, clip and persist filtered samples
#[derive(Debug)]
pub struct OutputSink {
    dither: Dither,
    primary: CaptureSink,
    reference: CaptureSink,
    emitted: u64,
}

impl OutputSink {
    /// Combine a dither source with primary and reference streams
    pub fn new(dither: Dither, primary: CaptureSink, reference: CaptureSink) -> Self {
        Self {
            dither,
            primary,
            reference,
            emitted: 0,
        }
    }

    /// Quantize one filtered sample and append it to the primary stream
    ///
    /// Quantization happens even when the stream is absent, keeping the dither
    /// sequence aligned with the tick count. A write failure disables the
    /// stream with a warning instead of aborting the batch.
    pub fn emit(&mut self, filtered: f64) -> Result<i16> {
        let sample = quantize(filtered, self.dither.next_offset());
        self.emitted += 1;
        Self::persist(&mut self.primary, sample, "primary")?;
        Ok(sample)
    }

    /// Append an externally computed sample verbatim to the reference stream
    pub fn capture_reference(&mut self, sample: i16) -> Result<()> {
        Self::persist(&mut self.reference, sample, "reference")
    }

    fn persist(sink: &mut CaptureSink, sample: i16, label: &str) -> Result<()> {
        match sink.write_sample(sample) {
            Err(HarnessError::Io(e)) => {
                log::warn!("{label} capture write failed: {e}; disabling capture");
                sink.disable();
                Ok(())
            }
            other => other,
        }
    }

    /// Restart the dither sequence
    pub fn reseed(&mut self, seed: u32) {
        self.dither.reseed(seed);
    }

    /// Samples quantized so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Primary capture stream
    pub fn primary(&self) -> &CaptureSink {
        &self.primary
    }

    /// Reference capture stream
    pub fn reference(&self) -> &CaptureSink {
        &self.reference
    }

    /// Close both streams; later calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        let primary = self.primary.close();
        let reference = self.reference.close();
        primary.and(reference)
    }
}

/// Read a raw capture back into samples
///
/// A trailing odd byte (torn final write) is ignored.
pub fn read_raw_capture<P: AsRef<Path>>(path: P) -> Result<Vec<i16>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Difference between two captures over their common length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureDiff {
    /// Samples compared (length of the shorter capture)
    pub compared: usize,
    /// Largest absolute sample difference
    pub max_abs_diff: u16,
    /// Root-mean-square difference in codes
    pub rms: f64,
}

impl CaptureDiff {
    /// True when the common prefix matches exactly
    pub fn is_identical(&self) -> bool {
        self.max_abs_diff == 0
    }
}

/// Compare a harness capture against reference samples
pub fn compare_captures(captured: &[i16], reference: &[i16]) -> CaptureDiff {
    let compared = captured.len().min(reference.len());
    let mut max_abs_diff = 0u16;
    let mut sum_sq = 0.0f64;

    for (&a, &b) in captured.iter().zip(reference) {
        let diff = (a as i32 - b as i32).unsigned_abs();
        max_abs_diff = max_abs_diff.max(diff.min(u16::MAX as u32) as u16);
        sum_sq += (diff as f64) * (diff as f64);
    }

    let rms = if compared == 0 {
        0.0
    } else {
        (sum_sq / compared as f64).sqrt()
    };

    CaptureDiff {
        compared,
        max_abs_diff,
        rms,
    }
}

/// Wrap a raw capture in a 16-bit mono WAV file
///
/// Returns the number of samples written.
#[cfg(feature = "export-wav")]
pub fn raw_to_wav<P: AsRef<Path>, Q: AsRef<Path>>(
    raw_path: P,
    wav_path: Q,
    sample_rate: u32,
) -> Result<usize> {
    let samples = read_raw_capture(raw_path)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(wav_path.as_ref(), spec)
        .map_err(|e| format!("Failed to create WAV file: {}", e))?;

    for &sample in &samples {
        writer
            .write_sample(sample)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV file: {}", e))?;

    log::info!(
        "wrote {} samples at {} Hz to {}",
        samples.len(),
        sample_rate,
        wav_path.as_ref().display()
    );
    Ok(samples.len())
}
