// Sample kernels. Each kernel exists in a reference scalar
// form plus a dispatch slot an architecture-specific ("vector") kernel
// can be installed into. The reference forms are always correct; the
// dispatch table exists so a faster kernel can be substituted without
// touching any caller, the same role `pa_get_convert_from_s16ne_function`
// and friends play in the original source.

pub mod conv;
pub mod mix;
pub mod silence;
pub mod volume;

use std::sync::OnceLock;

use crate::memory::Memchunk;
use crate::sample::{CVolume, SampleSpec};
pub use mix::MixInfo;

pub type MixFn = fn(&[MixInfo], &mut [u8], &SampleSpec, &CVolume) -> usize;
pub type VolumeFn = fn(&mut Memchunk, &SampleSpec, &CVolume);

static MIX_HOOK: OnceLock<MixFn> = OnceLock::new();
static VOLUME_HOOK: OnceLock<VolumeFn> = OnceLock::new();

/// Install a replacement mix kernel. Intended to be called once at
/// startup (e.g. after CPU-feature detection); later calls are
/// rejected rather than silently overwriting an already-installed
/// hook.
pub fn install_mix_kernel(f: MixFn) -> Result<(), MixFn> {
    MIX_HOOK.set(f)
}

pub fn install_volume_kernel(f: VolumeFn) -> Result<(), VolumeFn> {
    VOLUME_HOOK.set(f)
}

/// Mix via the installed kernel, or the reference kernel if none has
/// been installed.
pub fn mix(streams: &[MixInfo], dst: &mut [u8], spec: &SampleSpec, master: &CVolume) -> usize {
    let f = MIX_HOOK.get_or_init(|| mix::mix as MixFn);
    f(streams, dst, spec, master)
}

/// Scale a memchunk via the installed kernel, or the reference kernel
/// if none has been installed.
pub fn volume_memchunk(chunk: &mut Memchunk, spec: &SampleSpec, volume: &CVolume) {
    let f = VOLUME_HOOK.get_or_init(|| volume::volume_memchunk as VolumeFn);
    f(chunk, spec, volume)
}
