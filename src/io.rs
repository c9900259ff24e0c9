use std::io::{Read, Seek, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

pub trait ReadSeek: Read + Seek {
}

impl<T: Read + Seek> ReadSeek for T {}

pub trait WriteSeek: Write + Seek {
}

impl<T: Write + Seek> WriteSeek for T {}

pub fn new_gz_encoder<W: Write>(writer: W) -> GzEncoder<W> {
    GzEncoder::new(writer, Compression::default())
}

pub fn new_gz_decoder<R: Read>(reader: R) -> GzDecoder<R> {
    GzDecoder::new(reader)
}
