use std::ffi::{CStr, CString};

use log::debug;
use rsmpeg::avformat::AVFormatContextInput;
use rsmpeg::ffi;

use fastseek_core::track::TrackDescriptor;

use crate::error::{MediaError, Result};

/// One compressed sample, with its presentation timestamp in microseconds.
#[derive(Debug, Clone)]
pub struct Sample {
    pub data: Vec<u8>,
    pub pts_us: i64,
}

/// Trait for container demuxers, enabling test mocking.
pub trait Demuxer {
    /// Snapshot of all tracks in the container. Re-enumerable at any time.
    fn tracks(&self) -> Vec<TrackDescriptor>;

    /// Select the first video track and mark it active for sample reads.
    fn select_video_track(&mut self) -> Result<TrackDescriptor>;

    /// Reposition the read cursor to the nearest sync point at or before
    /// `timestamp_us`. The first sample read afterwards is a sync-frame
    /// candidate, not necessarily at the requested time.
    fn seek_to(&mut self, timestamp_us: i64) -> Result<()>;

    /// Peek the next compressed sample for the selected track. Repeated
    /// calls return the same sample until `advance`. `Ok(None)` at end of
    /// stream.
    fn read_sample(&mut self) -> Result<Option<Sample>>;

    /// Consume the sample returned by the last `read_sample`.
    fn advance(&mut self);

    /// Release the underlying container handle. Idempotent.
    fn close(&mut self);
}

/// True when the source carries an explicit URI scheme (`file://`,
/// `http://`, ...) as opposed to a bare filesystem path.
fn has_uri_scheme(source: &str) -> bool {
    source.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    })
}

fn mime_for(codec_type: ffi::AVMediaType, codec_id: ffi::AVCodecID) -> String {
    let name = unsafe {
        CStr::from_ptr(ffi::avcodec_get_name(codec_id))
            .to_string_lossy()
            .into_owned()
    };
    if codec_type == ffi::AVMEDIA_TYPE_VIDEO {
        format!("video/{name}")
    } else if codec_type == ffi::AVMEDIA_TYPE_AUDIO {
        format!("audio/{name}")
    } else if codec_type == ffi::AVMEDIA_TYPE_SUBTITLE {
        format!("text/{name}")
    } else {
        format!("application/{name}")
    }
}

pub struct FfmpegDemuxer {
    input_ctx: Option<AVFormatContextInput>,
    tracks: Vec<TrackDescriptor>,
    selected: Option<usize>,
    pending: Option<Sample>,
    source: String,
}

impl FfmpegDemuxer {
    /// Bind to `source`. The string is tried as given first; a bare
    /// filesystem path that fails to open directly is retried once as a
    /// `file://` URI before the failure is reported.
    pub fn open(source: &str) -> Result<Self> {
        let input_ctx = match Self::open_input(source) {
            Ok(ctx) => ctx,
            Err(direct_err) if !has_uri_scheme(source) => {
                debug!("direct open failed for {source}, retrying as file URI");
                Self::open_input(&format!("file://{source}")).map_err(|_| direct_err)?
            }
            Err(e) => return Err(e),
        };

        let tracks = Self::enumerate_tracks(&input_ctx);
        debug!("opened {source}: {} tracks", tracks.len());
        Ok(Self {
            input_ctx: Some(input_ctx),
            tracks,
            selected: None,
            pending: None,
            source: source.to_string(),
        })
    }

    fn open_input(target: &str) -> Result<AVFormatContextInput> {
        let c_target = CString::new(target.to_string())
            .map_err(|_| MediaError::SourceUnreadable(target.to_string()))?;
        AVFormatContextInput::open(&c_target)
            .map_err(|e| MediaError::SourceUnreadable(format!("{target}: {e}")))
    }

    fn enumerate_tracks(input_ctx: &AVFormatContextInput) -> Vec<TrackDescriptor> {
        let container_duration_us = input_ctx.duration.max(0);
        let mut tracks = Vec::new();
        for (index, stream) in input_ctx.streams().iter().enumerate() {
            let codecpar = stream.codecpar();
            let mime = mime_for(codecpar.codec_type, codecpar.codec_id);
            let (width, height) = if codecpar.codec_type == ffi::AVMEDIA_TYPE_VIDEO {
                (codecpar.width.max(0) as u32, codecpar.height.max(0) as u32)
            } else {
                (0, 0)
            };
            let tb = stream.time_base;
            let duration_us = if stream.duration > 0 && tb.den > 0 {
                (stream.duration as f64 * tb.num as f64 / tb.den as f64 * 1_000_000.0) as i64
            } else {
                container_duration_us
            };
            tracks.push(TrackDescriptor {
                index,
                mime,
                width,
                height,
                duration_us,
            });
        }
        tracks
    }

    pub(crate) fn input(&self) -> Option<&AVFormatContextInput> {
        self.input_ctx.as_ref()
    }
}

impl Demuxer for FfmpegDemuxer {
    fn tracks(&self) -> Vec<TrackDescriptor> {
        self.tracks.clone()
    }

    fn select_video_track(&mut self) -> Result<TrackDescriptor> {
        let track = self
            .tracks
            .iter()
            .find(|t| t.is_video())
            .cloned()
            .ok_or(MediaError::NoVideoTrack)?;
        self.selected = Some(track.index);
        self.pending = None;
        debug!("selected track {} ({})", track.index, track.mime);
        Ok(track)
    }

    fn seek_to(&mut self, timestamp_us: i64) -> Result<()> {
        let Some(input_ctx) = self.input_ctx.as_mut() else {
            return Err(MediaError::SeekFailed("demuxer is closed".into()));
        };
        let Some(index) = self.selected else {
            return Err(MediaError::SeekFailed("no track selected".into()));
        };

        let ts = {
            let streams = input_ctx.streams();
            let tb = streams[index].time_base;
            if tb.num > 0 && tb.den > 0 {
                (timestamp_us as f64 / 1_000_000.0 * tb.den as f64 / tb.num as f64) as i64
            } else {
                timestamp_us
            }
        };

        input_ctx
            .seek(index as i32, ts, ffi::AVSEEK_FLAG_BACKWARD as i32)
            .map_err(|e| MediaError::SeekFailed(format!("{e}")))?;
        self.pending = None;
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<Sample>> {
        if self.pending.is_some() {
            return Ok(self.pending.clone());
        }
        let Some(input_ctx) = self.input_ctx.as_mut() else {
            return Ok(None);
        };
        let Some(index) = self.selected else {
            return Err(MediaError::Decode("no track selected".into()));
        };

        loop {
            match input_ctx.read_packet() {
                Ok(Some(packet)) => {
                    if packet.stream_index as usize != index {
                        continue;
                    }
                    let data = if packet.size > 0 && !packet.data.is_null() {
                        unsafe {
                            std::slice::from_raw_parts(packet.data, packet.size as usize).to_vec()
                        }
                    } else {
                        Vec::new()
                    };
                    let tb = input_ctx.streams()[index].time_base;
                    let raw_ts = if packet.pts != ffi::AV_NOPTS_VALUE {
                        packet.pts
                    } else if packet.dts != ffi::AV_NOPTS_VALUE {
                        packet.dts
                    } else {
                        0
                    };
                    let pts_us = if tb.den > 0 {
                        (raw_ts as f64 * tb.num as f64 / tb.den as f64 * 1_000_000.0) as i64
                    } else {
                        raw_ts
                    };
                    let sample = Sample { data, pts_us };
                    self.pending = Some(sample.clone());
                    return Ok(Some(sample));
                }
                Ok(None) => return Ok(None),
                Err(e) => return Err(MediaError::Decode(format!("read_packet: {e}"))),
            }
        }
    }

    fn advance(&mut self) {
        self.pending = None;
    }

    fn close(&mut self) {
        if self.input_ctx.take().is_some() {
            debug!("closed demuxer for {}", self.source);
        }
        self.selected = None;
        self.pending = None;
    }
}
