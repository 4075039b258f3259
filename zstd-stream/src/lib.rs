use std::io::{self, BufReader, BufWriter, Read, Write};

/// Settings for zstd compression/decompression.
///
/// Notes:
/// - `include_checksum` adds a content checksum at the end of each frame.
/// - `threads` requires the `zstdmt` cargo feature to enable multithreaded compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZstdOptions {
    /// Compression level. Typical range is ~1-22.
    /// Use 0 to mean "zstd default".
    pub level: i32,

    /// Include a content checksum in the frame.
    pub include_checksum: bool,

    /// Enable long-distance matching (better ratio on some content, often slower).
    pub long_distance_matching: bool,

    /// Multithreaded compression workers (0 = disabled).
    pub threads: u32,

    /// Buffer size used for file/stream IO wrappers.
    pub buffer_size: usize,
}

impl ZstdOptions {
    pub const fn new() -> Self {
        Self {
            level: 3,
            include_checksum: true,
            long_distance_matching: false,
            threads: 0,
            buffer_size: 1024 * 1024, // 1 MiB
        }
    }
}

impl Default for ZstdOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ZstdCodec {
    opts: ZstdOptions,
}

impl ZstdCodec {
    pub const fn new(opts: ZstdOptions) -> Self {
        Self { opts }
    }

    /// Wrap `sink` in a compressing writer.
    ///
    /// Nothing is guaranteed to reach `sink` until [`CompressWriter::finish`]
    /// is called; dropping the writer leaves an unterminated frame behind.
    pub fn writer<W: Write>(&self, sink: W) -> io::Result<CompressWriter<W>> {
        let sink = BufWriter::with_capacity(self.opts.buffer_size, sink);
        let encoder = self.make_encoder(sink)?;
        Ok(CompressWriter { encoder, bytes_in: 0 })
    }

    /// Wrap `source` in a lazily decompressing reader.
    pub fn reader<R: Read>(&self, source: R) -> io::Result<DecompressReader<R>> {
        let source = BufReader::with_capacity(self.opts.buffer_size, source);
        let decoder = zstd::stream::read::Decoder::with_buffer(source)?;
        Ok(DecompressReader { decoder, bytes_out: 0 })
    }

    fn make_encoder<W: Write>(&self, writer: W) -> io::Result<zstd::stream::write::Encoder<'static, W>> {
        // Level 0 means "zstd default" in the zstd crate API.
        let mut enc = zstd::stream::write::Encoder::new(writer, self.opts.level)?;

        enc.include_checksum(self.opts.include_checksum)?;
        enc.long_distance_matching(self.opts.long_distance_matching)?;

        if self.opts.threads > 0 {
            #[cfg(feature = "zstdmt")]
            {
                enc.multithread(self.opts.threads)?;
            }
            #[cfg(not(feature = "zstdmt"))]
            {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("threads={} requested but zstdmt feature is not enabled", self.opts.threads),
                ));
            }
        }

        Ok(enc)
    }
}

/// Write half of the adapter: compresses everything written to it.
pub struct CompressWriter<W: Write> {
    encoder: zstd::stream::write::Encoder<'static, BufWriter<W>>,
    bytes_in: u64,
}

impl<W: Write> CompressWriter<W> {
    /// Uncompressed bytes accepted so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Flush the compressed tail, write the frame trailer and hand back the sink.
    pub fn finish(self) -> io::Result<W> {
        let bytes_in = self.bytes_in;
        let buffered = self.encoder.finish()?;
        let sink = buffered.into_inner().map_err(|e| e.into_error())?;
        log::debug!("zstd stream finished ({} bytes in)", bytes_in);
        Ok(sink)
    }
}

impl<W: Write> Write for CompressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.bytes_in += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Read half of the adapter.
///
/// Corrupt or truncated input is reported as an error from `read`, never as
/// an early end of stream.
pub struct DecompressReader<R: Read> {
    decoder: zstd::stream::read::Decoder<'static, BufReader<R>>,
    bytes_out: u64,
}

impl<R: Read> DecompressReader<R> {
    /// Decompressed bytes produced so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }
}

impl<R: Read> Read for DecompressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.decoder.read(buf) {
            Ok(n) => {
                self.bytes_out += n as u64;
                Ok(n)
            }
            Err(e) => Err(io::Error::new(
                e.kind(),
                format!("zstd stream corrupt after {} bytes: {}", self.bytes_out, e),
            )),
        }
    }
}
