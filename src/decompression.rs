use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

type ChainReader = Chain<Cursor<Vec<u8>>, File>;
type GzipReader = BufReader<MultiGzDecoder<ChainReader>>;
type ZstdReader = BufReader<zstd::Decoder<'static, BufReader<ChainReader>>>;
type PlainReader = BufReader<ChainReader>;

const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Streaming decompression wrapper that implements BufRead
/// Detects gzip (1F 8B 08) and zstd (28 B5 2F FD) compression using magic bytes
pub enum DecompressionReader {
    Gzip(GzipReader),
    Zstd(ZstdReader),
    /// Passthrough for non-compressed files
    Plain(PlainReader),
}

// zstd::Decoder doesn't implement Debug
impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompressionReader::Gzip(_) => write!(f, "DecompressionReader::Gzip"),
            DecompressionReader::Zstd(_) => write!(f, "DecompressionReader::Zstd"),
            DecompressionReader::Plain(_) => write!(f, "DecompressionReader::Plain"),
        }
    }
}

impl BufRead for DecompressionReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            DecompressionReader::Gzip(reader) => reader.fill_buf(),
            DecompressionReader::Zstd(reader) => reader.fill_buf(),
            DecompressionReader::Plain(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DecompressionReader::Gzip(reader) => reader.consume(amt),
            DecompressionReader::Zstd(reader) => reader.consume(amt),
            DecompressionReader::Plain(reader) => reader.consume(amt),
        }
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
        }
    }
}

impl DecompressionReader {
    /// Open `path`, picking a decoder from the first four bytes
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path_ref = path.as_ref();

        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            if extension.eq_ignore_ascii_case("zip") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "ZIP archives are not supported, only gzip and zstd streams. Extract it first: unzip {}",
                        path_ref.display()
                    ),
                ));
            }
        }

        let file = File::open(path_ref)?;
        detect_compression_file(file)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DecompressionReader::Gzip(_) => "gzip",
            DecompressionReader::Zstd(_) => "zstd",
            DecompressionReader::Plain(_) => "plain",
        }
    }
}

fn detect_compression_file(mut file: File) -> io::Result<DecompressionReader> {
    let mut head = [0u8; 4];
    let n = read_prefix(&mut file, &mut head)?;

    // Put the sniffed bytes back in front of the stream
    let chained = Cursor::new(head[..n].to_vec()).chain(file);

    if n >= 3 && head[..3] == GZIP_MAGIC {
        Ok(DecompressionReader::Gzip(BufReader::new(
            MultiGzDecoder::new(chained),
        )))
    } else if n >= 4 && head == ZSTD_MAGIC {
        let decoder = zstd::Decoder::new(chained)?;
        Ok(DecompressionReader::Zstd(BufReader::new(decoder)))
    } else {
        Ok(DecompressionReader::Plain(BufReader::new(chained)))
    }
}

/// Magic-byte detection for any stream, such as stdin
///
/// Gzip and zstd are decoded transparently; anything else passes through with
/// the sniffed bytes put back in front.
pub fn maybe_decompress<R: Read + Send + 'static>(
    mut reader: R,
) -> io::Result<Box<dyn BufRead + Send>> {
    let mut head = [0u8; 4];
    let n = read_prefix(&mut reader, &mut head)?;
    let chained = Cursor::new(head[..n].to_vec()).chain(reader);

    if n >= 3 && head[..3] == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(chained))))
    } else if n >= 4 && head == ZSTD_MAGIC {
        Ok(Box::new(BufReader::new(zstd::Decoder::new(chained)?)))
    } else {
        Ok(Box::new(BufReader::new(chained)))
    }
}

/// Fill as much of `buf` as the stream allows; short inputs are fine
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_plain_file_passthrough() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, r#"{{"auth":"Logged In"}}"#)?;
        writeln!(temp_file, r#"{{"auth":"Logged Out"}}"#)?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert_eq!(reader.kind(), "plain");
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with(r#"{"auth":"Logged In"}"#));
        Ok(())
    }

    #[test]
    fn test_tiny_file_passthrough() -> io::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{{}}")?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "{}");
        Ok(())
    }

    #[test]
    fn test_gzip_detection() -> io::Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"length\":1.5}\n{\"length\":2.5}\n")?;
        let compressed = encoder.finish()?;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert_eq!(reader.kind(), "gzip");
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "{\"length\":1.5}\n{\"length\":2.5}\n");
        Ok(())
    }

    #[test]
    fn test_zstd_detection() -> io::Result<()> {
        let compressed = zstd::encode_all(&b"{\"auth\":\"Logged In\"}\n"[..], 0)?;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&compressed)?;
        temp_file.flush()?;

        let mut reader = DecompressionReader::open(temp_file.path())?;
        assert_eq!(reader.kind(), "zstd");
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "{\"auth\":\"Logged In\"}\n");
        Ok(())
    }

    #[test]
    fn test_zip_file_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("records.zip");
        std::fs::write(&zip_path, b"fake zip content").unwrap();

        let err = DecompressionReader::open(&zip_path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("ZIP archives are not supported"));
    }

    #[test]
    fn test_maybe_decompress_gzip_stream() -> io::Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"auth\":\"Logged Out\"}\n")?;
        let stream = Cursor::new(encoder.finish()?);

        let mut content = String::new();
        maybe_decompress(stream)?.read_to_string(&mut content)?;
        assert_eq!(content, "{\"auth\":\"Logged Out\"}\n");
        Ok(())
    }

    #[test]
    fn test_maybe_decompress_zstd_stream() -> io::Result<()> {
        let stream = Cursor::new(zstd::encode_all(&b"{\"length\":3}\n"[..], 0)?);

        let mut content = String::new();
        maybe_decompress(stream)?.read_to_string(&mut content)?;
        assert_eq!(content, "{\"length\":3}\n");
        Ok(())
    }

    #[test]
    fn test_maybe_decompress_plain_and_short_streams() -> io::Result<()> {
        let mut content = String::new();
        maybe_decompress(Cursor::new(b"{\"a\":1}\n{\"a\":2}\n".to_vec()))?
            .read_to_string(&mut content)?;
        assert_eq!(content, "{\"a\":1}\n{\"a\":2}\n");

        let mut content = String::new();
        maybe_decompress(Cursor::new(b"{}".to_vec()))?.read_to_string(&mut content)?;
        assert_eq!(content, "{}");

        let mut content = String::new();
        maybe_decompress(io::empty())?.read_to_string(&mut content)?;
        assert!(content.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = DecompressionReader::open("/nonexistent/ndstat/input.jsonl").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
