use crate::decoder::{DecoderConfig, FfmpegFrameDecoder, FrameDecoder};
use crate::demuxer::{Demuxer, FfmpegDemuxer};
use crate::error::Result;

/// Factory seam binding a demuxer/decoder pair to a concrete media stack.
/// The controller goes through this to stay mockable end to end.
pub trait MediaBackend {
    type Demuxer: Demuxer;
    type Decoder: FrameDecoder;

    /// Bind a demuxer to the given source identifier.
    fn open_demuxer(&self, source: &str) -> Result<Self::Demuxer>;

    /// Create a decoder for the track selected on `demuxer`.
    fn create_decoder(
        &self,
        demuxer: &Self::Demuxer,
        config: &DecoderConfig,
    ) -> Result<Self::Decoder>;
}

/// FFmpeg-backed media stack.
#[derive(Debug, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    type Demuxer = FfmpegDemuxer;
    type Decoder = FfmpegFrameDecoder;

    fn open_demuxer(&self, source: &str) -> Result<FfmpegDemuxer> {
        FfmpegDemuxer::open(source)
    }

    fn create_decoder(
        &self,
        demuxer: &FfmpegDemuxer,
        config: &DecoderConfig,
    ) -> Result<FfmpegFrameDecoder> {
        FfmpegFrameDecoder::configure(demuxer, config)
    }
}
