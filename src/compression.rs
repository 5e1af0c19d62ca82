// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Per-record compression framing.
//!
//! Each record is written inside its own gzip member or zstd frame, so any
//! prefix of a file that ends on a record boundary decompresses on its own.

use serde::{Deserialize, Deserializer, Serialize};
use std::io::{self, Write};
use std::str::FromStr;

/// Default zstd level (1-22).
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Default gzip level (0-9).
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
    Zstd,
}

impl Compression {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "" | "none" => Some(Self::None),
            "gzip" | "gz" => Some(Self::Gzip),
            "zstd" | "zst" | "zstandard" => Some(Self::Zstd),
            _ => None,
        }
    }

    /// File extension for a sealed file, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => ".warc",
            Self::Gzip => ".warc.gz",
            Self::Zstd => ".warc.zst",
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown compression '{}'", s))
    }
}

// Config files accept the same case-insensitive names as the command line.
impl<'de> Deserialize<'de> for Compression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Writes independently decodable frames over one sink.
///
/// The sink is borrowed by a fresh encoder for the duration of one frame and
/// the encoder is finished before `write_frame` returns.
pub struct FrameWriter<W: Write> {
    inner: W,
    compression: Compression,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W, compression: Compression) -> Self {
        Self { inner, compression }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Run `body` against a writer whose output forms exactly one frame.
    pub fn write_frame<T>(
        &mut self,
        body: impl FnOnce(&mut dyn Write) -> io::Result<T>,
    ) -> io::Result<T> {
        match self.compression {
            Compression::None => body(&mut self.inner),
            Compression::Gzip => {
                let mut enc = flate2::write::GzEncoder::new(
                    &mut self.inner,
                    flate2::Compression::new(DEFAULT_GZIP_LEVEL),
                );
                let out = body(&mut enc)?;
                enc.finish()?;
                Ok(out)
            }
            Compression::Zstd => {
                let mut enc = zstd::stream::write::Encoder::new(&mut self.inner, DEFAULT_ZSTD_LEVEL)?;
                let out = body(&mut enc)?;
                enc.finish()?;
                Ok(out)
            }
        }
    }

    /// Flush the sink. Never called mid-frame.
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Read;

    #[rstest]
    #[case("none", Some(Compression::None))]
    #[case("", Some(Compression::None))]
    #[case("GZIP", Some(Compression::Gzip))]
    #[case("zstd", Some(Compression::Zstd))]
    #[case("brotli", None)]
    fn from_name_cases(#[case] name: &str, #[case] expected: Option<Compression>) {
        assert_eq!(Compression::from_name(name), expected);
    }

    #[rstest]
    #[case(Compression::None, ".warc")]
    #[case(Compression::Gzip, ".warc.gz")]
    #[case(Compression::Zstd, ".warc.zst")]
    fn extensions(#[case] c: Compression, #[case] ext: &str) {
        assert_eq!(c.extension(), ext);
    }

    #[test]
    fn uncompressed_frames_are_passthrough() -> anyhow::Result<()> {
        let mut fw = FrameWriter::new(Vec::new(), Compression::None);
        fw.write_frame(|w| w.write_all(b"one"))?;
        fw.write_frame(|w| w.write_all(b"two"))?;
        assert_eq!(fw.into_inner(), b"onetwo");
        Ok(())
    }

    #[test]
    fn gzip_frames_decode_independently() -> anyhow::Result<()> {
        let mut fw = FrameWriter::new(Vec::new(), Compression::Gzip);
        fw.write_frame(|w| w.write_all(b"first record"))?;
        let boundary = fw.get_ref().len();
        fw.write_frame(|w| w.write_all(b"second record"))?;
        let all = fw.into_inner();

        // A prefix that ends on the frame boundary is a complete gzip file.
        let mut prefix = String::new();
        flate2::read::GzDecoder::new(&all[..boundary]).read_to_string(&mut prefix)?;
        assert_eq!(prefix, "first record");

        // The second member starts exactly at the boundary.
        let mut second = String::new();
        flate2::read::GzDecoder::new(&all[boundary..]).read_to_string(&mut second)?;
        assert_eq!(second, "second record");

        let mut both = String::new();
        flate2::read::MultiGzDecoder::new(&all[..]).read_to_string(&mut both)?;
        assert_eq!(both, "first recordsecond record");
        Ok(())
    }

    #[test]
    fn zstd_frames_decode_independently() -> anyhow::Result<()> {
        let mut fw = FrameWriter::new(Vec::new(), Compression::Zstd);
        fw.write_frame(|w| w.write_all(b"alpha"))?;
        let boundary = fw.get_ref().len();
        fw.write_frame(|w| w.write_all(b"beta"))?;
        let all = fw.into_inner();

        assert_eq!(zstd::decode_all(&all[..boundary])?, b"alpha");
        assert_eq!(zstd::decode_all(&all[boundary..])?, b"beta");
        assert_eq!(zstd::decode_all(&all[..])?, b"alphabeta");
        Ok(())
    }
}
