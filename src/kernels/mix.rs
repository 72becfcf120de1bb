// N-stream mix. Only S16NE, U8, and FLOAT32NE are
// supported; everything else is a fatal programming error, not a
// recoverable one (callers are expected to have converted upstream).

use crate::memory::Memchunk;
use crate::sample::{CVolume, SampleFormat, SampleSpec, VOLUME_MUTED, VOLUME_NORM};

/// One participating input stream for a single render call: its
/// (windowed) samples plus its own per-channel volume.
#[derive(Clone)]
pub struct MixInfo {
    pub chunk: Memchunk,
    pub volume: CVolume,
}

/// Apply a per-channel volume scalar to a raw sample value already
/// widened to the accumulator type. `NORM`/`MUTED` take the documented
/// fast paths; anything else scales in the wider type before any
/// saturation happens.
#[inline(always)]
fn scale_i32(sample: i32, cvolume: u32) -> i32 {
    if cvolume == VOLUME_MUTED {
        0
    } else if cvolume == VOLUME_NORM {
        sample
    } else {
        // i64 intermediate: volumes above NORM (boosted channels) would
        // overflow i32 here at the top of the sample range.
        ((sample as i64 * cvolume as i64) / VOLUME_NORM as i64) as i32
    }
}

#[inline(always)]
fn scale_f32(sample: f32, cvolume: u32) -> f32 {
    if cvolume == VOLUME_MUTED {
        0.0
    } else if cvolume == VOLUME_NORM {
        sample
    } else {
        sample * cvolume as f32 / VOLUME_NORM as f32
    }
}

fn mix_s16ne(streams: &[MixInfo], dst: &mut [u8], spec: &SampleSpec, master: &CVolume) -> usize {
    let mut channel = 0usize;
    let mut d = 0usize;
    loop {
        if d >= dst.len() {
            return d;
        }

        let mut sum: i32 = 0;
        let mut short = false;
        for stream in streams {
            if d + 2 > stream.chunk.length {
                short = true;
                break;
            }
            let cvolume = stream.volume.get(channel);
            let v = if cvolume == VOLUME_MUTED {
                0
            } else {
                let bytes = stream.chunk.as_slice();
                let raw = i16::from_ne_bytes([bytes[d], bytes[d + 1]]) as i32;
                scale_i32(raw, cvolume)
            };
            sum += v;
        }
        if short {
            return d;
        }

        sum = scale_i32(sum, master.get(channel));
        sum = sum.clamp(-0x8000, 0x7FFF);

        dst[d..d + 2].copy_from_slice(&(sum as i16).to_ne_bytes());
        d += 2;

        channel += 1;
        if channel >= spec.channels as usize {
            channel = 0;
        }
    }
}

fn mix_u8(streams: &[MixInfo], dst: &mut [u8], spec: &SampleSpec, master: &CVolume) -> usize {
    let mut channel = 0usize;
    let mut d = 0usize;
    loop {
        if d >= dst.len() {
            return d;
        }

        let mut sum: i32 = 0;
        let mut short = false;
        for stream in streams {
            if d >= stream.chunk.length {
                short = true;
                break;
            }
            let cvolume = stream.volume.get(channel);
            let v = if cvolume == VOLUME_MUTED {
                0
            } else {
                let raw = stream.chunk.as_slice()[d] as i32 - 0x80;
                scale_i32(raw, cvolume)
            };
            sum += v;
        }
        if short {
            return d;
        }

        sum = scale_i32(sum, master.get(channel));
        sum = sum.clamp(-0x80, 0x7F);

        dst[d] = (sum + 0x80) as u8;
        d += 1;

        channel += 1;
        if channel >= spec.channels as usize {
            channel = 0;
        }
    }
}

fn mix_float32ne(
    streams: &[MixInfo],
    dst: &mut [u8],
    spec: &SampleSpec,
    master: &CVolume,
) -> usize {
    let mut channel = 0usize;
    let mut d = 0usize;
    loop {
        if d >= dst.len() {
            return d;
        }

        let mut sum: f32 = 0.0;
        let mut short = false;
        for stream in streams {
            if d + 4 > stream.chunk.length {
                short = true;
                break;
            }
            let cvolume = stream.volume.get(channel);
            let v = if cvolume == VOLUME_MUTED {
                0.0
            } else {
                let bytes = stream.chunk.as_slice();
                let raw = f32::from_ne_bytes([bytes[d], bytes[d + 1], bytes[d + 2], bytes[d + 3]]);
                scale_f32(raw, cvolume)
            };
            sum += v;
        }
        if short {
            return d;
        }

        sum = scale_f32(sum, master.get(channel));
        sum = sum.clamp(-1.0, 1.0);

        dst[d..d + 4].copy_from_slice(&sum.to_ne_bytes());
        d += 4;

        channel += 1;
        if channel >= spec.channels as usize {
            channel = 0;
        }
    }
}

/// Mix `streams` into `dst`, returning the number of bytes written:
/// `min(dst.len(), min_i streams[i].chunk.length)`, truncated to the
/// enclosing sample boundary. `spec.format` must be one of the three
/// supported mix formats; anything else is a fatal programming error.
pub fn mix(streams: &[MixInfo], dst: &mut [u8], spec: &SampleSpec, master: &CVolume) -> usize {
    match spec.format {
        SampleFormat::S16Ne => mix_s16ne(streams, dst, spec, master),
        SampleFormat::U8 => mix_u8(streams, dst, spec, master),
        SampleFormat::Float32Ne => mix_float32ne(streams, dst, spec, master),
        other => panic!("mix: unsupported sample format {other}"),
    }
}
