//! Transparent gzip and bzip2 wrapping for change files.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::str::FromStr;

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

/// Compression applied to a change file on disk.
///
/// # Examples
/// ```
/// use camino::Utf8Path;
/// use osctrim_data::Compression;
///
/// assert_eq!(Compression::from_path(Utf8Path::new("day.osc.gz")), Compression::Gzip);
/// assert_eq!("bzip2".parse::<Compression>(), Ok(Compression::Bzip2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Plain XML.
    #[default]
    None,
    /// gzip, as served by planet replication feeds.
    Gzip,
    /// bzip2.
    Bzip2,
}

impl Compression {
    /// Return the lowercase name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }

    /// Infer compression from a file extension, ignoring case.
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("gz") => Self::Gzip,
            Some("bz2") => Self::Bzip2,
            _ => Self::None,
        }
    }

    /// Wrap `input` in the matching decoder and a buffer.
    #[must_use]
    pub fn reader<'a, R>(self, input: R) -> Box<dyn BufRead + 'a>
    where
        R: Read + 'a,
    {
        match self {
            Self::None => Box::new(BufReader::new(input)),
            Self::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(input))),
            Self::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(input))),
        }
    }

    /// Wrap `output` in the matching encoder.
    ///
    /// Call [`CompressedWriter::finish`] once done so the trailer is written.
    #[must_use]
    pub fn writer<W: Write>(self, output: W) -> CompressedWriter<W> {
        match self {
            Self::None => CompressedWriter::Plain(output),
            Self::Gzip => {
                CompressedWriter::Gzip(GzEncoder::new(output, flate2::Compression::default()))
            }
            Self::Bzip2 => {
                CompressedWriter::Bzip2(BzEncoder::new(output, bzip2::Compression::default()))
            }
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            _ => Err(format!("unknown compression '{s}'")),
        }
    }
}

/// Writer returned by [`Compression::writer`].
pub enum CompressedWriter<W: Write> {
    /// Pass-through.
    Plain(W),
    /// gzip encoder.
    Gzip(GzEncoder<W>),
    /// bzip2 encoder.
    Bzip2(BzEncoder<W>),
}

impl<W: Write + fmt::Debug> fmt::Debug for CompressedWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(inner) => f.debug_tuple("Plain").field(inner).finish(),
            Self::Gzip(encoder) => f.debug_tuple("Gzip").field(encoder).finish(),
            Self::Bzip2(encoder) => f.debug_tuple("Bzip2").field(encoder.get_ref()).finish(),
        }
    }
}

impl<W: Write> CompressedWriter<W> {
    /// Flush the encoder trailer and return the inner writer.
    ///
    /// # Errors
    /// Propagates I/O failures from the encoder or the inner writer.
    pub fn finish(self) -> io::Result<W> {
        let mut inner = match self {
            Self::Plain(inner) => inner,
            Self::Gzip(encoder) => encoder.finish()?,
            Self::Bzip2(encoder) => encoder.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
            Self::Bzip2(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Gzip(encoder) => encoder.flush(),
            Self::Bzip2(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("day.osc", Compression::None)]
    #[case("day.osc.gz", Compression::Gzip)]
    #[case("day.OSC.GZ", Compression::Gzip)]
    #[case("day.osc.bz2", Compression::Bzip2)]
    #[case("day.BZ2", Compression::Bzip2)]
    #[case("daygz", Compression::None)]
    fn infers_compression_from_extension(#[case] name: &str, #[case] expected: Compression) {
        assert_eq!(Compression::from_path(Utf8Path::new(name)), expected, "{name}");
    }

    #[rstest]
    #[case(Compression::Gzip)]
    #[case(Compression::Bzip2)]
    #[case(Compression::None)]
    fn compressed_output_reads_back(#[case] compression: Compression) {
        let mut writer = compression.writer(Vec::new());
        writer.write_all(b"<osmChange/>").expect("write payload");
        let bytes = writer.finish().expect("finish stream");

        let mut text = String::new();
        compression
            .reader(bytes.as_slice())
            .read_to_string(&mut text)
            .expect("decode payload");
        assert_eq!(text, "<osmChange/>");
    }

    #[rstest]
    fn parsing_rejects_unknown_names() {
        let err = Compression::from_str("zstd").expect_err("zstd is unsupported");
        assert!(err.contains("unknown compression"));
    }
}
