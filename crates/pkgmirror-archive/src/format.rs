use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::{Error, Result, tar, zip};

/// Container formats whose entries carry their own timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Plain or compressed tarballs (`.tar`, `.tar.gz`, `.tgz`, `.tar.bz2`, ...).
    TarFamily(TarCompress),
    /// Zip containers, including wheels and eggs.
    ZipFamily,
    /// No internal timestamps: text, markup, sources, checksum files.
    Passthrough,
}

/// Compression codec wrapped around a tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TarCompress {
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl TarCompress {
    /// Create a decoder for this compression codec.
    pub fn decoder<R: Read>(self, reader: R) -> Result<Decoder<R>> {
        match self {
            Self::None => Ok(Decoder::Passthrough(reader)),
            Self::Gzip => Ok(Decoder::Gzip(Box::new(flate2::read::GzDecoder::new(reader)))),
            Self::Bzip2 => Ok(Decoder::Bzip2(Box::new(bzip2::read::BzDecoder::new(reader)))),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Decoder::Xz(Box::new(xz2::read::XzDecoder::new(reader)))),
            #[cfg(not(feature = "xz"))]
            Self::Xz => Err(Error::UnsupportedFormat),
        }
    }
}

/// Decoder wrapper for tar decompression.
pub enum Decoder<R: Read> {
    Passthrough(R),
    Gzip(Box<flate2::read::GzDecoder<R>>),
    Bzip2(Box<bzip2::read::BzDecoder<R>>),
    #[cfg(feature = "xz")]
    Xz(Box<xz2::read::XzDecoder<R>>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(r) => r.read(buf),
            Self::Gzip(d) => d.read(buf),
            Self::Bzip2(d) => d.read(buf),
            #[cfg(feature = "xz")]
            Self::Xz(d) => d.read(buf),
        }
    }
}

const TAR_SUFFIXES: &[(&str, TarCompress)] = &[
    (".tar.gz", TarCompress::Gzip),
    (".tgz", TarCompress::Gzip),
    (".tar.bz2", TarCompress::Bzip2),
    (".tbz2", TarCompress::Bzip2),
    (".tbz", TarCompress::Bzip2),
    (".tar.xz", TarCompress::Xz),
    (".txz", TarCompress::Xz),
    (".tar", TarCompress::None),
];

const ZIP_SUFFIXES: &[&str] = &[".zip", ".whl", ".egg"];

const PASSTHROUGH_SUFFIXES: &[&str] = &[
    ".html", ".htm", ".txt", ".py", ".md", ".rst", ".md5", ".sha1", ".sha256", ".xml", ".asc",
    ".sig", ".json",
];

impl ContainerFormat {
    /// Classify by file name alone. `None` means the extension is unknown and
    /// the content has to be sniffed.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();

        if let Some((_, codec)) = TAR_SUFFIXES.iter().find(|(s, _)| name.ends_with(s)) {
            return Some(Self::TarFamily(*codec));
        }
        if ZIP_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return Some(Self::ZipFamily);
        }
        if PASSTHROUGH_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return Some(Self::Passthrough);
        }
        match Path::new(&name).extension() {
            None => Some(Self::Passthrough),
            Some(_) => None,
        }
    }

    /// Classify a file by extension, falling back to its leading bytes.
    pub fn classify(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(format) = Self::from_file_name(&name) {
            return Ok(format);
        }

        let mut header = Vec::with_capacity(512);
        File::open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?
            .take(512)
            .read_to_end(&mut header)?;
        Ok(detect_format(&header).unwrap_or(Self::Passthrough))
    }

    /// Newest entry modification time inside the container, in Unix seconds.
    ///
    /// Entries are enumerated from their headers; payloads are not extracted.
    pub fn latest_internal_timestamp(&self, path: &Path) -> Result<Option<i64>> {
        match self {
            Self::TarFamily(codec) => tar::latest_timestamp(path, *codec),
            Self::ZipFamily => zip::latest_timestamp(path),
            Self::Passthrough => Ok(None),
        }
    }

    pub fn has_internal_timestamps(&self) -> bool {
        !matches!(self, Self::Passthrough)
    }
}

/// Detect a container from its leading bytes.
///
/// Only signatures that prove a container are accepted: a bare gzip or bzip2
/// stream may wrap anything, so it is not classified here.
pub fn detect_format(data: &[u8]) -> Option<ContainerFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..] => Some(ContainerFormat::ZipFamily),
        _ if is_tar_header(data) => Some(ContainerFormat::TarFamily(TarCompress::None)),
        _ => None,
    }
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 263 && data[257..262] == *b"ustar"
}
