// Sample format, sample spec, and per-channel volume — the data model
// every kernel and the sink contract are built on.

use std::fmt;

/// Maximum channel count a `CVolume` can carry. PulseAudio's own limit
/// (`PA_CHANNELS_MAX`) is 32; kept identical since the mix/volume
/// kernels cycle a channel index modulo `spec.channels` and need a
/// fixed-size backing array.
pub const MAX_CHANNELS: usize = 32;

/// Reference volume: `v / NORM` is the linear gain, `NORM` meaning
/// unity gain.
pub const VOLUME_NORM: u32 = 0x1_0000;
/// Zero gain.
pub const VOLUME_MUTED: u32 = 0;

/// A tagged sample format. `S16Ne`/`Float32Ne` resolve "native
/// endianness" to the build's actual endianness; no runtime branch is
/// ever taken in the kernel inner loops over this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    S16Le,
    S16Be,
    S16Ne,
    Float32Ne,
    ALaw,
    ULaw,
}

#[cfg(target_endian = "little")]
pub const NATIVE_S16: SampleFormat = SampleFormat::S16Le;
#[cfg(target_endian = "big")]
pub const NATIVE_S16: SampleFormat = SampleFormat::S16Be;

impl SampleFormat {
    /// Byte size of a single sample in this format.
    pub fn sample_size(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Le | SampleFormat::S16Be | SampleFormat::S16Ne => 2,
            SampleFormat::Float32Ne => 4,
            SampleFormat::ALaw | SampleFormat::ULaw => 1,
        }
    }

    /// Resolve `S16Ne` to the build's actual endianness. All other
    /// formats are returned unchanged.
    pub fn resolve_native(self) -> SampleFormat {
        match self {
            SampleFormat::S16Ne => NATIVE_S16,
            other => other,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16Le => "s16le",
            SampleFormat::S16Be => "s16be",
            SampleFormat::S16Ne => "s16ne",
            SampleFormat::Float32Ne => "float32ne",
            SampleFormat::ALaw => "alaw",
            SampleFormat::ULaw => "ulaw",
        };
        f.write_str(name)
    }
}

/// (format, channels, rate) triple. `channels` is always in `1..=32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
}

impl SampleSpec {
    pub fn new(format: SampleFormat, channels: u8, rate: u32) -> Self {
        assert!(
            (1..=MAX_CHANNELS as u8).contains(&channels),
            "channel count {channels} out of range 1..={MAX_CHANNELS}"
        );
        assert!(rate > 0, "sample rate must be nonzero");
        Self {
            format,
            channels,
            rate,
        }
    }

    /// Bytes in one frame (one sample per channel).
    pub fn frame_size(&self) -> usize {
        self.format.sample_size() * self.channels as usize
    }

    /// Convert a byte count to a duration in microseconds. `bytes` is
    /// rounded down to the enclosing frame boundary first.
    pub fn bytes_to_usec(&self, bytes: usize) -> u64 {
        let frame = self.frame_size();
        let frames = (bytes / frame) as u64;
        frames * 1_000_000 / self.rate as u64
    }

    /// Convert a duration in microseconds to a byte count, rounded down
    /// to the enclosing frame boundary.
    pub fn usec_to_bytes(&self, usec: u64) -> usize {
        let frames = (usec * self.rate as u64) / 1_000_000;
        frames as usize * self.frame_size()
    }
}

/// Per-channel volume vector. Channels beyond `spec.channels` are
/// unused but kept zero-initialized so the backing array never needs a
/// bounds check beyond `channels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CVolume {
    values: [u32; MAX_CHANNELS],
    channels: u8,
}

impl CVolume {
    /// All channels at `NORM` (unity gain).
    pub fn norm(channels: u8) -> Self {
        Self::filled(channels, VOLUME_NORM)
    }

    /// All channels at `MUTED`.
    pub fn muted(channels: u8) -> Self {
        Self::filled(channels, VOLUME_MUTED)
    }

    pub fn filled(channels: u8, value: u32) -> Self {
        assert!((1..=MAX_CHANNELS as u8).contains(&channels));
        Self {
            values: [value; MAX_CHANNELS],
            channels,
        }
    }

    pub fn from_slice(values: &[u32]) -> Self {
        assert!(!values.is_empty() && values.len() <= MAX_CHANNELS);
        let mut arr = [VOLUME_NORM; MAX_CHANNELS];
        arr[..values.len()].copy_from_slice(values);
        Self {
            values: arr,
            channels: values.len() as u8,
        }
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn get(&self, channel: usize) -> u32 {
        self.values[channel % self.channels as usize]
    }

    pub fn set(&mut self, channel: usize, value: u32) {
        self.values[channel % self.channels as usize] = value;
    }

    /// True if every active channel equals `value`. Used by the volume
    /// kernel's NORM/MUTED fast paths.
    pub fn channels_equal_to(&self, value: u32) -> bool {
        self.values[..self.channels as usize]
            .iter()
            .all(|&v| v == value)
    }
}
