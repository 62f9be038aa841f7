//! Content digests.

use md5::Digest;

/// Hex-encoded MD5 of `data`, the value S3 uses as an object's ETag.
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    hex::encode(md5::Md5::digest(data))
}

/// Incremental MD5 for content assembled from several buffers.
#[derive(Debug, Default, Clone)]
pub struct Md5Hasher(md5::Md5);

impl Md5Hasher {
    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Hex-encoded digest of everything fed so far.
    #[must_use]
    pub fn finish(self) -> String {
        hex::encode(self.0.finalize())
    }
}
