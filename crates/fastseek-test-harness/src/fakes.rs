use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use fastseek_core::pixel::PixelBuffer;
use fastseek_core::track::TrackDescriptor;
use fastseek_media::backend::MediaBackend;
use fastseek_media::decoder::{DecoderConfig, DecoderInput, FrameDecoder, InputSlot, OutputPicture};
use fastseek_media::demuxer::{Demuxer, Sample};
use fastseek_media::error::{MediaError, Result};
use fastseek_media::sink::ImageSink;

/// Shared counter of live native-resource handles, for leak assertions.
#[derive(Clone, Debug, Default)]
pub struct ResourceCounter {
    live: Rc<Cell<i64>>,
}

impl ResourceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> i64 {
        self.live.get()
    }

    fn acquire(&self) {
        self.live.set(self.live.get() + 1);
    }

    fn release(&self) {
        self.live.set(self.live.get() - 1);
    }
}

/// Scripted decode behaviors for driving controller edge cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeScript {
    /// Every submitted sample yields one displayable picture.
    EchoFrames,
    /// Output never becomes available within the timeout.
    NeverOutputs,
    /// The first `n` submitted samples produce nothing, as a hardware codec
    /// warming up would; later samples produce frames.
    WarmUpAfter(u32),
}

/// Fake demuxer over a scripted sample list. Releases its resource count on
/// `close` or drop, whichever comes first.
pub struct FakeDemuxer {
    counter: ResourceCounter,
    tracks: Vec<TrackDescriptor>,
    samples: Vec<Sample>,
    cursor: usize,
    fail_seek: bool,
    seek_targets: Rc<RefCell<Vec<i64>>>,
    closed: bool,
}

impl Demuxer for FakeDemuxer {
    fn tracks(&self) -> Vec<TrackDescriptor> {
        self.tracks.clone()
    }

    fn select_video_track(&mut self) -> Result<TrackDescriptor> {
        self.tracks
            .iter()
            .find(|t| t.is_video())
            .cloned()
            .ok_or(MediaError::NoVideoTrack)
    }

    fn seek_to(&mut self, timestamp_us: i64) -> Result<()> {
        self.seek_targets.borrow_mut().push(timestamp_us);
        if self.fail_seek {
            return Err(MediaError::SeekFailed("scripted failure".into()));
        }
        // Land on the nearest scripted sample at or before the target.
        self.cursor = self
            .samples
            .iter()
            .rposition(|s| s.pts_us <= timestamp_us)
            .unwrap_or(0);
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<Sample>> {
        Ok(self.samples.get(self.cursor).cloned())
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counter.release();
        }
    }
}

impl Drop for FakeDemuxer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fake decoder following a `DecodeScript`. Tracks outstanding output
/// handles so tests can assert every dequeued picture was released.
pub struct FakeDecoder {
    counter: ResourceCounter,
    script: DecodeScript,
    width: u32,
    height: u32,
    started: bool,
    fail_start: bool,
    flush_count: Rc<Cell<u32>>,
    queued: Option<OutputPicture>,
    feeds: u32,
    outstanding_outputs: Rc<Cell<i64>>,
}

fn solid_rgba(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x80u8; (width * height * 4) as usize];
    for pixel in data.chunks_exact_mut(4) {
        pixel[3] = 0xFF;
    }
    data
}

impl FrameDecoder for FakeDecoder {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(MediaError::StartFailed("scripted failure".into()));
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn flush(&mut self) {
        self.flush_count.set(self.flush_count.get() + 1);
        self.queued = None;
    }

    fn dequeue_input_slot(&mut self, _timeout: Duration) -> Option<InputSlot> {
        if !self.started {
            return None;
        }
        Some(InputSlot(0))
    }

    fn submit(&mut self, _slot: InputSlot, input: DecoderInput) -> Result<()> {
        match input {
            DecoderInput::Sample { pts_us, .. } => {
                self.feeds += 1;
                let ready = match self.script {
                    DecodeScript::EchoFrames => true,
                    DecodeScript::NeverOutputs => false,
                    DecodeScript::WarmUpAfter(n) => self.feeds > n,
                };
                if ready {
                    self.queued = Some(OutputPicture {
                        data: solid_rgba(self.width, self.height),
                        width: self.width,
                        height: self.height,
                        pts_us,
                        end_of_stream: false,
                    });
                }
                Ok(())
            }
            DecoderInput::EndOfStream => {
                self.queued = Some(OutputPicture::end_of_stream());
                Ok(())
            }
        }
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Option<OutputPicture> {
        let picture = self.queued.take()?;
        self.outstanding_outputs
            .set(self.outstanding_outputs.get() + 1);
        Some(picture)
    }

    fn release_output(&mut self, _picture: OutputPicture, _render: bool) {
        self.outstanding_outputs
            .set(self.outstanding_outputs.get() - 1);
    }
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        self.counter.release();
    }
}

/// Builder-style fake backend wiring scripted demuxers and decoders into a
/// controller. Clones share the counter and recorders, so keep one clone
/// outside the controller to observe it.
#[derive(Clone)]
pub struct FakeBackend {
    counter: ResourceCounter,
    duration_us: i64,
    width: u32,
    height: u32,
    video_track: bool,
    sample_count: u32,
    fail_open: bool,
    fail_seek: bool,
    fail_configure: bool,
    fail_start: bool,
    script: DecodeScript,
    seek_targets: Rc<RefCell<Vec<i64>>>,
    flush_count: Rc<Cell<u32>>,
    outstanding_outputs: Rc<Cell<i64>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            counter: ResourceCounter::new(),
            duration_us: 10_000_000,
            width: 1920,
            height: 1080,
            video_track: true,
            sample_count: 30,
            fail_open: false,
            fail_seek: false,
            fail_configure: false,
            fail_start: false,
            script: DecodeScript::EchoFrames,
            seek_targets: Rc::new(RefCell::new(Vec::new())),
            flush_count: Rc::new(Cell::new(0)),
            outstanding_outputs: Rc::new(Cell::new(0)),
        }
    }

    pub fn duration_ms(mut self, ms: i64) -> Self {
        self.duration_us = ms * 1000;
        self
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn no_video_track(mut self) -> Self {
        self.video_track = false;
        self
    }

    pub fn sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn fail_seek(mut self) -> Self {
        self.fail_seek = true;
        self
    }

    pub fn fail_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn script(mut self, script: DecodeScript) -> Self {
        self.script = script;
        self
    }

    pub fn counter(&self) -> ResourceCounter {
        self.counter.clone()
    }

    /// Every seek target the fake demuxer received, in microseconds.
    pub fn seek_targets(&self) -> Vec<i64> {
        self.seek_targets.borrow().clone()
    }

    pub fn flush_count(&self) -> u32 {
        self.flush_count.get()
    }

    /// Output handles dequeued but not yet released.
    pub fn outstanding_outputs(&self) -> i64 {
        self.outstanding_outputs.get()
    }

    fn scripted_tracks(&self) -> Vec<TrackDescriptor> {
        let mut tracks = vec![TrackDescriptor {
            index: 0,
            mime: "audio/aac".into(),
            width: 0,
            height: 0,
            duration_us: self.duration_us,
        }];
        if self.video_track {
            tracks.push(TrackDescriptor {
                index: 1,
                mime: "video/h264".into(),
                width: self.width,
                height: self.height,
                duration_us: self.duration_us,
            });
        }
        tracks
    }

    fn scripted_samples(&self) -> Vec<Sample> {
        // One sync sample per second of scripted media.
        (0..self.sample_count)
            .map(|i| Sample {
                data: vec![0u8; 64],
                pts_us: i as i64 * 1_000_000,
            })
            .collect()
    }
}

impl MediaBackend for FakeBackend {
    type Demuxer = FakeDemuxer;
    type Decoder = FakeDecoder;

    fn open_demuxer(&self, source: &str) -> Result<FakeDemuxer> {
        if self.fail_open {
            return Err(MediaError::SourceUnreadable(source.to_string()));
        }
        self.counter.acquire();
        Ok(FakeDemuxer {
            counter: self.counter.clone(),
            tracks: self.scripted_tracks(),
            samples: self.scripted_samples(),
            cursor: 0,
            fail_seek: self.fail_seek,
            seek_targets: self.seek_targets.clone(),
            closed: false,
        })
    }

    fn create_decoder(
        &self,
        _demuxer: &FakeDemuxer,
        config: &DecoderConfig,
    ) -> Result<FakeDecoder> {
        if self.fail_configure {
            return Err(MediaError::UnsupportedCodec(config.codec.clone()));
        }
        self.counter.acquire();
        Ok(FakeDecoder {
            counter: self.counter.clone(),
            script: self.script,
            // Scripted output at the configured bound, as a down-scaling
            // decoder would produce.
            width: config.max_width.min(self.width),
            height: config.max_height.min(self.height),
            started: false,
            fail_start: self.fail_start,
            flush_count: self.flush_count.clone(),
            queued: None,
            feeds: 0,
            outstanding_outputs: self.outstanding_outputs.clone(),
        })
    }
}

/// Sink that always reports allocation failure.
#[derive(Debug, Default)]
pub struct ExhaustedSink;

impl ImageSink for ExhaustedSink {
    fn allocate(&self, _width: u32, _height: u32) -> Option<PixelBuffer> {
        None
    }
}
