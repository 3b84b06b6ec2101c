mod lz4_codec;
mod passthrough;
mod zlib_codec;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zlib_codec::ZlibCodec;
pub use zstd_codec::ZstdCodec;

use pbc_core::Codec;
use std::sync::Arc;

/// Names accepted by [`codec_from_name`], for CLI help text.
pub const CODEC_NAMES: &[&str] = &["zlib", "zstd", "lz4", "passthrough"];

/// Resolve a codec from its CLI name.
///
/// `level` is passed to codecs that have one (zlib, zstd) and ignored by the
/// rest; `None` keeps the codec's default.
pub fn codec_from_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "zlib" | "deflate" | "z" => Ok(Arc::new(match level {
            Some(l) => ZlibCodec::new(l.clamp(0, 9) as u32),
            None => ZlibCodec::default(),
        })),
        "zstd" | "zs" => Ok(Arc::new(match level {
            Some(l) => ZstdCodec::new(l),
            None => ZstdCodec::default(),
        })),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: {}",
            other,
            CODEC_NAMES.join(", ")
        ),
    }
}
