//! Premultiplied RGBA8 source-over used by the track mixer.

use crate::foundation::error::{ReelflowError, ReelflowResult};
use crate::foundation::math::mul_div255_u8;

pub type PremulRgba8 = [u8; 4];

/// Background every mix starts from.
pub const OPAQUE_BLACK: PremulRgba8 = [0, 0, 0, 255];

/// `src` over `dst`.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let inv = 255 - u16::from(sa);
            let mut out = src;
            for (o, d) in out.iter_mut().zip(dst) {
                *o = o.saturating_add(mul_div255_u8(u16::from(d), inv));
            }
            out
        }
    }
}

/// Lay a whole frame `src` over `dst`, pixel by pixel.
pub fn layer_over(dst: &mut [u8], src: &[u8]) -> ReelflowResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelflowError::validation(format!(
            "layer_over expects equal-length rgba8 buffers, got {} and {}",
            dst.len(),
            src.len()
        )));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
