// In-place per-channel volume scaling. Mirrors
// `pa_volume_memchunk`, except the channel cycle counter is named
// `channel` rather than reusing the outer sample-index variable, which
// in the original source shadows across the format-specific branches.

use crate::memory::Memchunk;
use crate::sample::{CVolume, SampleFormat, SampleSpec, VOLUME_NORM};

fn volume_s16ne(buf: &mut [u8], channels: usize, volume: &CVolume) {
    let mut channel = 0usize;
    for sample in buf.chunks_exact_mut(2) {
        let cv = volume.get(channel);
        if cv != VOLUME_NORM {
            let raw = i16::from_ne_bytes([sample[0], sample[1]]) as i64;
            let scaled = ((raw * cv as i64) / VOLUME_NORM as i64).clamp(-0x8000, 0x7FFF) as i32;
            sample.copy_from_slice(&(scaled as i16).to_ne_bytes());
        }
        channel += 1;
        if channel >= channels {
            channel = 0;
        }
    }
}

fn volume_u8(buf: &mut [u8], channels: usize, volume: &CVolume) {
    let mut channel = 0usize;
    for sample in buf.iter_mut() {
        let cv = volume.get(channel);
        if cv != VOLUME_NORM {
            let raw = *sample as i64 - 0x80;
            let scaled = ((raw * cv as i64) / VOLUME_NORM as i64).clamp(-0x80, 0x7F) as i32;
            *sample = (scaled + 0x80) as u8;
        }
        channel += 1;
        if channel >= channels {
            channel = 0;
        }
    }
}

fn volume_float32ne(buf: &mut [u8], channels: usize, volume: &CVolume) {
    let mut channel = 0usize;
    for sample in buf.chunks_exact_mut(4) {
        let cv = volume.get(channel);
        if cv != VOLUME_NORM {
            let raw = f32::from_ne_bytes([sample[0], sample[1], sample[2], sample[3]]);
            let scaled = (raw * cv as f32 / VOLUME_NORM as f32).clamp(-1.0, 1.0);
            sample.copy_from_slice(&scaled.to_ne_bytes());
        }
        channel += 1;
        if channel >= channels {
            channel = 0;
        }
    }
}

/// Scale `chunk` in place by `volume`. A no-op if every active channel
/// is at `VOLUME_NORM`.
pub fn volume_memchunk(chunk: &mut Memchunk, spec: &SampleSpec, volume: &CVolume) {
    if volume.channels_equal_to(VOLUME_NORM) {
        return;
    }
    let channels = spec.channels as usize;
    let buf = chunk.as_mut_slice();
    match spec.format {
        SampleFormat::S16Ne => volume_s16ne(buf, channels, volume),
        SampleFormat::U8 => volume_u8(buf, channels, volume),
        SampleFormat::Float32Ne => volume_float32ne(buf, channels, volume),
        other => panic!("volume_memchunk: unsupported sample format {other}"),
    }
}
