use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use fastseek_core::pixel::{DecodeQuality, PixelBuffer};
use fastseek_core::track::TrackDescriptor;

use crate::backend::{FfmpegBackend, MediaBackend};
use crate::decoder::{DecoderConfig, DecoderInput, FrameDecoder};
use crate::demuxer::Demuxer;
use crate::error::Result;
use crate::sink::{BufferSink, ImageSink};

/// Default output bound. Thumbnails are capped here regardless of source
/// resolution to keep per-seek decode cost flat.
pub const DEFAULT_MAX_WIDTH: u32 = 426;
pub const DEFAULT_MAX_HEIGHT: u32 = 240;
/// Default bound on each of the two per-cycle dequeue waits.
pub const DEFAULT_DEQUEUE_TIMEOUT_MS: u64 = 10;

/// Tuning knobs for a controller instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeekConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub dequeue_timeout_ms: u64,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            dequeue_timeout_ms: DEFAULT_DEQUEUE_TIMEOUT_MS,
        }
    }
}

impl SeekConfig {
    fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}

/// Observable controller lifecycle states. The transient phases inside
/// `init` and `seek_to_frame` are not observable under the serialized
/// calling model and carry no enum values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Ready,
    Released,
}

enum CycleOutcome {
    Frame { data: Vec<u8>, width: u32, height: u32 },
    NoFrame,
}

/// Orchestrates one demuxer/decoder pair through the seek → flush → feed →
/// drain loop. One instance serves one caller at a time; independent
/// instances are fully independent.
pub struct FastSeekController<B: MediaBackend = FfmpegBackend> {
    backend: B,
    sink: Box<dyn ImageSink>,
    config: SeekConfig,
    demuxer: Option<B::Demuxer>,
    decoder: Option<B::Decoder>,
    track: Option<TrackDescriptor>,
    state: ControllerState,
}

impl FastSeekController<FfmpegBackend> {
    pub fn new() -> Self {
        Self::with_backend(FfmpegBackend)
    }
}

impl Default for FastSeekController<FfmpegBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: MediaBackend> FastSeekController<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            sink: Box::new(BufferSink),
            config: SeekConfig::default(),
            demuxer: None,
            decoder: None,
            track: None,
            state: ControllerState::Uninitialized,
        }
    }

    pub fn with_config(mut self, config: SeekConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn ImageSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Bind the controller to a source. Re-entrant: prior state is fully
    /// released first. Any failure in the open → select → configure → start
    /// chain runs the same teardown as `release` before false is returned,
    /// so no partially-initialized controller is ever reachable.
    pub fn init(&mut self, source: &str) -> bool {
        self.release();
        match self.init_chain(source) {
            Ok(()) => {
                self.state = ControllerState::Ready;
                info!("initialized for {source}");
                true
            }
            Err(e) => {
                warn!("init failed for {source}: {e}");
                self.release();
                self.state = ControllerState::Uninitialized;
                false
            }
        }
    }

    fn init_chain(&mut self, source: &str) -> Result<()> {
        let mut demuxer = self.backend.open_demuxer(source)?;
        let track = demuxer.select_video_track()?;
        let config = DecoderConfig {
            codec: track.mime.clone(),
            track_index: track.index,
            max_width: self.config.max_width,
            max_height: self.config.max_height,
        };
        let decoder = self.backend.create_decoder(&demuxer, &config)?;
        // Stash both handles before start so a start failure tears down
        // through the release path.
        self.demuxer = Some(demuxer);
        self.decoder = Some(decoder);
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.start()?;
        }
        self.track = Some(track);
        Ok(())
    }

    /// Produce a thumbnail for `timestamp_ms`. Always yields an image while
    /// initialized: seek failures and decode misses degrade to the synthetic
    /// gradient rather than an error, so a scrubbing caller never sees a
    /// hole. `None` only when uninitialized or when the sink cannot
    /// allocate.
    pub fn seek_to_frame(&mut self, timestamp_ms: i64) -> Option<PixelBuffer> {
        if self.state != ControllerState::Ready {
            return None;
        }
        let timestamp_us = timestamp_ms.max(0).saturating_mul(1000);
        match self.decode_cycle(timestamp_us) {
            CycleOutcome::Frame {
                data,
                width,
                height,
            } => {
                let mut buffer = self.sink.allocate(width, height)?;
                buffer.fill_from_rgba(&data);
                buffer.quality = DecodeQuality::Real;
                Some(buffer)
            }
            CycleOutcome::NoFrame => self.placeholder(timestamp_ms),
        }
    }

    /// One bounded seek → flush → feed → drain round. Each dequeue waits at
    /// most the configured timeout, so a single call never stalls the
    /// caller; a cold decoder simply misses this round and the caller's next
    /// seek picks up the upgrade.
    fn decode_cycle(&mut self, timestamp_us: i64) -> CycleOutcome {
        let timeout = self.config.dequeue_timeout();
        let (Some(demuxer), Some(decoder)) = (self.demuxer.as_mut(), self.decoder.as_mut()) else {
            return CycleOutcome::NoFrame;
        };

        if let Err(e) = demuxer.seek_to(timestamp_us) {
            warn!("seek to {timestamp_us}us failed: {e}");
            return CycleOutcome::NoFrame;
        }
        // Guarantee the next output reflects post-seek input only.
        decoder.flush();

        if let Some(slot) = decoder.dequeue_input_slot(timeout) {
            match demuxer.read_sample() {
                Ok(Some(sample)) => {
                    let input = DecoderInput::Sample {
                        data: sample.data,
                        pts_us: sample.pts_us,
                    };
                    match decoder.submit(slot, input) {
                        Ok(()) => demuxer.advance(),
                        Err(e) => warn!("sample submit failed: {e}"),
                    }
                }
                Ok(None) => {
                    if let Err(e) = decoder.submit(slot, DecoderInput::EndOfStream) {
                        warn!("end-of-stream submit failed: {e}");
                    }
                }
                Err(e) => {
                    warn!("sample read failed: {e}");
                    if let Err(e) = decoder.submit(slot, DecoderInput::EndOfStream) {
                        warn!("end-of-stream submit failed: {e}");
                    }
                }
            }
        }

        if let Some(mut picture) = decoder.dequeue_output(timeout) {
            if picture.is_displayable() {
                let data = std::mem::take(&mut picture.data);
                let (width, height) = (picture.width, picture.height);
                decoder.release_output(picture, false);
                return CycleOutcome::Frame {
                    data,
                    width,
                    height,
                };
            }
            debug!("non-displayable output at {timestamp_us}us");
            decoder.release_output(picture, false);
        }
        CycleOutcome::NoFrame
    }

    fn placeholder(&self, timestamp_ms: i64) -> Option<PixelBuffer> {
        let mut buffer = self
            .sink
            .allocate(self.config.max_width, self.config.max_height)?;
        buffer.fill_placeholder(timestamp_ms);
        Some(buffer)
    }

    /// Selected track duration in milliseconds, 0 when uninitialized.
    pub fn duration_ms(&self) -> i64 {
        self.track.as_ref().map_or(0, |t| t.duration_us / 1000)
    }

    /// Native dimensions of the selected track, (0, 0) when uninitialized.
    pub fn dimensions(&self) -> (u32, u32) {
        self.track.as_ref().map_or((0, 0), |t| (t.width, t.height))
    }

    /// Codec identifier of the selected track.
    pub fn codec(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.mime.as_str())
    }

    /// Stop and drop the decoder, close the demuxer, reset cached metadata.
    /// Idempotent; safe before any `init` and after failed ones.
    pub fn release(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.stop();
        }
        if let Some(mut demuxer) = self.demuxer.take() {
            demuxer.close();
        }
        self.track = None;
        if self.state == ControllerState::Ready {
            debug!("released");
        }
        self.state = ControllerState::Released;
    }
}

impl<B: MediaBackend> Drop for FastSeekController<B> {
    fn drop(&mut self) {
        self.release();
    }
}
