// Float32NE -> S16NE conversion, in a scalar and a "vector" variant.
// Grounded in the conversion routines `cpu-test.c` benchmarks against
// each other: two implementations of the same format conversion that
// must be bit-identical, which is exactly the property the dispatch
// table in `kernels::mod` exists to preserve when a faster kernel is
// swapped in for the reference one.

/// Reference scalar conversion: clamp to `[-1, 1]`, scale, round.
pub fn float_to_s16_scalar(src: &[f32], dst: &mut [i16]) {
    assert_eq!(src.len(), dst.len());
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        let clamped = s.clamp(-1.0, 1.0);
        *d = (clamped * 32767.0).round() as i16;
    }
}

/// Alternate conversion kernel with the same observable output as
/// [`float_to_s16_scalar`], but structured to fold the clamp into the
/// multiply-round instead of branching first — the kind of rewrite a
/// SIMD substitution would make. `cpu_test` asserts the two never
/// disagree.
pub fn float_to_s16_optimized(src: &[f32], dst: &mut [i16]) {
    assert_eq!(src.len(), dst.len());
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        let scaled = (s * 32767.0).round();
        *d = scaled.clamp(-32767.0, 32767.0) as i16;
    }
}
