// Silence fill. Length-only: every supported format's
// zero-amplitude representation is a byte-wise constant, so there is no
// per-channel logic here at all.

use crate::memory::{Memblock, Memchunk};
use crate::sample::{SampleFormat, SampleSpec};

/// The byte that represents zero amplitude in `format`.
pub fn silence_byte(format: SampleFormat) -> u8 {
    match format.resolve_native() {
        SampleFormat::U8 => 0x80,
        SampleFormat::S16Le | SampleFormat::S16Be | SampleFormat::Float32Ne => 0x00,
        SampleFormat::ALaw | SampleFormat::ULaw => 0x80,
        SampleFormat::S16Ne => unreachable!("resolve_native never returns S16Ne"),
    }
}

/// Fill `buf` with silence for `spec`.
pub fn silence_memory(buf: &mut [u8], spec: &SampleSpec) {
    let c = silence_byte(spec.format);
    for b in buf {
        *b = c;
    }
}

/// Silence a memchunk's window in place.
pub fn silence_memchunk(chunk: &mut Memchunk, spec: &SampleSpec) {
    silence_memory(chunk.as_mut_slice(), spec);
}

/// Silence an entire freshly-allocated memblock. Mirrors
/// `pa_silence_memblock` from the original source, which the distilled
/// spec only names the memory/memchunk variants of.
pub fn silence_block(block: &mut Memblock, spec: &SampleSpec) {
    silence_memory(block.make_mut(), spec);
}
