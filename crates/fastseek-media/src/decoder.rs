use std::time::Duration;

use log::{debug, warn};
use rsmpeg::avcodec::{AVCodec, AVCodecContext, AVPacket};
use rsmpeg::avutil::AVFrame;
use rsmpeg::ffi;
use rsmpeg::swscale::SwsContext;

use crate::demuxer::FfmpegDemuxer;
use crate::error::{MediaError, Result};

/// Decoder configuration derived from the selected track. Target dimensions
/// are upper bounds on the output, not guaranteed exact geometry; actual
/// output dimensions come back with the first decoded picture.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub codec: String,
    pub track_index: usize,
    pub max_width: u32,
    pub max_height: u32,
}

/// Handle to a reserved decoder input slot.
#[derive(Debug)]
pub struct InputSlot(pub usize);

/// Compressed input submitted through an input slot.
pub enum DecoderInput {
    Sample { data: Vec<u8>, pts_us: i64 },
    EndOfStream,
}

/// One picture dequeued from the decoder's output side.
#[derive(Debug, Clone)]
pub struct OutputPicture {
    /// Packed RGBA pixel data, row-major. Empty when the slot carries no
    /// displayable content.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pts_us: i64,
    pub end_of_stream: bool,
}

impl OutputPicture {
    pub fn end_of_stream() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            pts_us: 0,
            end_of_stream: true,
        }
    }

    /// A picture counts as displayable only when it has pixels and is not
    /// the end-of-stream marker.
    pub fn is_displayable(&self) -> bool {
        !self.end_of_stream && !self.data.is_empty()
    }
}

/// Trait for single-frame video decoders, enabling test mocking.
pub trait FrameDecoder {
    /// Must be called before feeding input.
    fn start(&mut self) -> Result<()>;

    /// No-op when the decoder was never started.
    fn stop(&mut self);

    /// Discard buffered input/output state, including any end-of-stream
    /// latch, without destroying the decoder.
    fn flush(&mut self);

    /// Reserve an input slot, waiting up to `timeout`. `None` means "try
    /// again later", not failure.
    fn dequeue_input_slot(&mut self, timeout: Duration) -> Option<InputSlot>;

    /// Submit compressed data or the end-of-stream marker through a
    /// previously dequeued slot.
    fn submit(&mut self, slot: InputSlot, input: DecoderInput) -> Result<()>;

    /// Dequeue the next decoded picture, waiting up to `timeout`.
    fn dequeue_output(&mut self, timeout: Duration) -> Option<OutputPicture>;

    /// Return an inspected output slot to the decoder's pool. Must be called
    /// for every dequeued picture, displayable or not.
    fn release_output(&mut self, picture: OutputPicture, render: bool);
}

pub struct FfmpegFrameDecoder {
    decode_ctx: AVCodecContext,
    sws_ctx: Option<SwsContext>,
    sws_src: (i32, i32, i32),
    sws_dst_dims: (i32, i32),
    max_width: u32,
    max_height: u32,
    started: bool,
    eos_submitted: bool,
}

impl FfmpegFrameDecoder {
    /// Create and configure a decoder for the selected track of `demuxer`,
    /// with the config's max dimensions as down-scale bounds on the output.
    pub fn configure(demuxer: &FfmpegDemuxer, config: &DecoderConfig) -> Result<Self> {
        let input_ctx = demuxer
            .input()
            .ok_or_else(|| MediaError::ConfigureFailed("demuxer is closed".into()))?;
        let streams = input_ctx.streams();
        let stream = &streams[config.track_index];
        let codecpar = stream.codecpar();

        let decoder = AVCodec::find_decoder(codecpar.codec_id)
            .ok_or_else(|| MediaError::UnsupportedCodec(config.codec.clone()))?;

        let mut decode_ctx = AVCodecContext::new(&decoder);
        decode_ctx
            .apply_codecpar(&codecpar)
            .map_err(|e| MediaError::ConfigureFailed(format!("apply_codecpar: {e}")))?;
        // Single decoding thread: frame threading delays the first output by
        // several packets, and this pipeline drains after feeding one.
        unsafe {
            use rsmpeg::UnsafeDerefMut;
            decode_ctx.deref_mut().thread_count = 1;
        }
        decode_ctx
            .open(None)
            .map_err(|e| MediaError::ConfigureFailed(format!("open: {e}")))?;

        debug!(
            "configured {} decoder, output bounded to {}x{}",
            config.codec, config.max_width, config.max_height
        );
        Ok(Self {
            decode_ctx,
            sws_ctx: None,
            sws_src: (0, 0, 0),
            sws_dst_dims: (0, 0),
            max_width: config.max_width,
            max_height: config.max_height,
            started: false,
            eos_submitted: false,
        })
    }

    fn packet_from_sample(data: &[u8], pts_us: i64) -> Result<AVPacket> {
        use rsmpeg::UnsafeDerefMut;
        let mut packet = AVPacket::new();
        unsafe {
            let raw: *mut ffi::AVPacket = packet.deref_mut();
            if ffi::av_new_packet(raw, data.len() as i32) < 0 {
                return Err(MediaError::Decode("packet allocation failed".into()));
            }
            std::ptr::copy_nonoverlapping(data.as_ptr(), (*raw).data, data.len());
            (*raw).pts = pts_us;
        }
        Ok(packet)
    }

    fn frame_to_rgba(&mut self, frame: &AVFrame) -> Result<OutputPicture> {
        let src_w = frame.width;
        let src_h = frame.height;
        if src_w <= 0 || src_h <= 0 {
            return Ok(OutputPicture {
                data: Vec::new(),
                width: 0,
                height: 0,
                pts_us: 0,
                end_of_stream: false,
            });
        }

        // Bound the output to the configured maximums, preserving aspect
        // ratio. Sources already inside the bounds pass through unscaled.
        let (dst_w, dst_h) = if self.max_width > 0
            && self.max_height > 0
            && (src_w as u32 > self.max_width || src_h as u32 > self.max_height)
        {
            let scale_w = self.max_width as f64 / src_w as f64;
            let scale_h = self.max_height as f64 / src_h as f64;
            let scale = scale_w.min(scale_h);
            let w = ((src_w as f64 * scale) as i32).max(2) & !1; // ensure even
            let h = ((src_h as f64 * scale) as i32).max(2) & !1;
            (w, h)
        } else {
            (src_w, src_h)
        };

        let need_new_sws = self.sws_ctx.is_none()
            || self.sws_src != (src_w, src_h, frame.format)
            || self.sws_dst_dims != (dst_w, dst_h);
        if need_new_sws {
            self.sws_ctx = Some(
                SwsContext::get_context(
                    src_w,
                    src_h,
                    frame.format,
                    dst_w,
                    dst_h,
                    ffi::AV_PIX_FMT_RGBA,
                    ffi::SWS_FAST_BILINEAR,
                    None,
                    None,
                    None,
                )
                .ok_or_else(|| MediaError::Decode("failed to create sws context".into()))?,
            );
            self.sws_src = (src_w, src_h, frame.format);
            self.sws_dst_dims = (dst_w, dst_h);
        }
        let Some(sws) = self.sws_ctx.as_mut() else {
            return Err(MediaError::Decode("scaler unavailable".into()));
        };

        let mut dst_frame = AVFrame::new();
        dst_frame.set_width(dst_w);
        dst_frame.set_height(dst_h);
        dst_frame.set_format(ffi::AV_PIX_FMT_RGBA);
        dst_frame
            .alloc_buffer()
            .map_err(|e| MediaError::Decode(format!("alloc_buffer: {e}")))?;

        sws.scale_frame(frame, 0, src_h, &mut dst_frame)
            .map_err(|e| MediaError::Decode(format!("scale_frame: {e}")))?;

        let width = dst_w as u32;
        let height = dst_h as u32;
        // Copy row by row: the destination frame's stride may exceed width*4.
        let stride = dst_frame.linesize[0] as usize;
        let row_bytes = width as usize * 4;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        unsafe {
            let base = dst_frame.data[0] as *const u8;
            for y in 0..height as usize {
                data.extend_from_slice(std::slice::from_raw_parts(base.add(y * stride), row_bytes));
            }
        }

        let pts_us = if frame.pts != ffi::AV_NOPTS_VALUE {
            frame.pts
        } else {
            0
        };
        Ok(OutputPicture {
            data,
            width,
            height,
            pts_us,
            end_of_stream: false,
        })
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn start(&mut self) -> Result<()> {
        // The codec is opened during configure; start gates the feed side of
        // the protocol.
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn flush(&mut self) {
        self.decode_ctx.flush_buffers();
        self.eos_submitted = false;
    }

    fn dequeue_input_slot(&mut self, _timeout: Duration) -> Option<InputSlot> {
        // A software codec accepts a packet whenever prior output has been
        // drained; no actual waiting is involved.
        if !self.started || self.eos_submitted {
            return None;
        }
        Some(InputSlot(0))
    }

    fn submit(&mut self, _slot: InputSlot, input: DecoderInput) -> Result<()> {
        match input {
            DecoderInput::Sample { data, pts_us } => {
                let packet = Self::packet_from_sample(&data, pts_us)?;
                self.decode_ctx
                    .send_packet(Some(&packet))
                    .map_err(|e| MediaError::Decode(format!("send_packet: {e}")))
            }
            DecoderInput::EndOfStream => {
                self.eos_submitted = true;
                self.decode_ctx
                    .send_packet(None)
                    .map_err(|e| MediaError::Decode(format!("send_packet(eos): {e}")))
            }
        }
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Option<OutputPicture> {
        if !self.started {
            return None;
        }
        match self.decode_ctx.receive_frame() {
            Ok(frame) => match self.frame_to_rgba(&frame) {
                Ok(picture) => Some(picture),
                Err(e) => {
                    warn!("pixel conversion failed: {e}");
                    None
                }
            },
            // A drained codec reports no more frames after end of stream.
            Err(_) if self.eos_submitted => Some(OutputPicture::end_of_stream()),
            Err(_) => None,
        }
    }

    fn release_output(&mut self, picture: OutputPicture, _render: bool) {
        // Pixel ownership already moved out during conversion; dropping the
        // picture is all libavcodec needs, its frame pool recycles on its own.
        drop(picture);
    }
}
