//! LZ77 compression with static Huffman coding of the back-references.
//!
//! The encoder emits (offset, length, literal) triples against a bounded
//! sliding window, then entropy-codes the offset and length streams with
//! two independent Huffman tables.  The file is self-describing:
//!
//! * Offset Huffman header: symbol count (16 bits), then per symbol
//!   (value: 16 bits, code length: 8 bits, code: code length bits)
//! * Length Huffman header: identical structure, independent alphabet
//! * Content: per triple (offset code) (length code) (literal: 8 raw bits)
//!
//! There is no end-of-stream marker; the decoder stops when fewer bits
//! remain than the smallest possible triple, which is how final-byte
//! padding is told apart from content.
//!
//! * This transforms buffers, not files (we expect files that are easily buffered)
//! * All fields are packed MSB first

use std::io::{Cursor,Read,Write,Seek,SeekFrom};
use crate::tools::bit_stream::{BitReader,BitWriter};
use crate::tools::static_huff::{CodeTable,FreqTable,HuffmanDecoder};
use crate::tools::sliding_window::SlidingWindow;
use crate::{Error,Options,DYNERR};

// LZ77 coding constants

const SEARCH_BUFFER_SIZE: usize = 2048; // sliding search buffer
const LOOKAHEAD_SIZE: usize = 255; // lookahead buffer size

/// One emission: copy `length` symbols starting `offset` positions
/// behind the output cursor, then append `literal`.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct Triple {
    pub offset: u16,
    pub length: u8,
    pub literal: u8
}

/// Structure to perform one compression run.  This owns the triple
/// stream and the diagnostic symbol counts; the window index only lives
/// inside `run`.
pub struct Encoder<'a> {
    input: &'a [u8],
    triples: Vec<Triple>,
    symbol_freq: FreqTable
}

impl <'a> Encoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            triples: Vec::new(),
            symbol_freq: FreqTable::new()
        }
    }
    /// Drive the matcher over the whole input and build the triple
    /// stream.  Each step consumes the match plus one literal, so the
    /// match is clamped whenever it would swallow the last symbol.
    pub fn run(&mut self) {
        for &sym in self.input {
            self.symbol_freq.count(sym as u16);
        }
        let mut window = SlidingWindow::create(self.input,SEARCH_BUFFER_SIZE,LOOKAHEAD_SIZE);
        let mut cursor: usize = 0;
        while cursor < self.input.len() {
            let m = window.find_match();
            let mut length = m.length;
            if cursor + length == self.input.len() {
                length -= 1;
            }
            let offset = match length {
                0 => 0,
                _ => m.offset
            };
            let literal = self.input[cursor + length];
            log::trace!("triple ({},{},{})",offset,length,literal);
            self.triples.push(Triple {
                offset: offset as u16,
                length: length as u8,
                literal
            });
            window.advance(length + 1);
            cursor += length + 1;
        }
        log::debug!("encoded {} symbols into {} triples, window held {} entries",
            self.input.len(),self.triples.len(),window.indexed_count());
    }
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }
    /// Build the two frequency tables from the triple stream, then the
    /// two code tables, and pack headers plus content into bytes.
    pub fn serialize(&self) -> Result<Vec<u8>,Error> {
        let mut offset_freq = FreqTable::new();
        let mut length_freq = FreqTable::new();
        for t in &self.triples {
            offset_freq.count(t.offset);
            length_freq.count(t.length as u16);
        }
        let offset_codes = CodeTable::from_frequencies(&offset_freq);
        let length_codes = CodeTable::from_frequencies(&length_freq);
        log::debug!("offset alphabet {} symbols, length alphabet {} symbols",
            offset_codes.len(),length_codes.len());
        let mut writer = BitWriter::new();
        offset_codes.serialize(&mut writer)?;
        length_codes.serialize(&mut writer)?;
        for t in &self.triples {
            writer.append_code(offset_codes.get(t.offset).ok_or(Error::UnknownCode)?);
            writer.append_code(length_codes.get(t.length as u16).ok_or(Error::UnknownCode)?);
            writer.put_bits(t.literal as u64,8);
        }
        log::debug!("serialized {} bits",writer.len());
        Ok(writer.to_bytes())
    }
    /// Diagnostic side channel, not part of the compressed format:
    /// symbol probabilities as CSV rows suitable for histogram plots.
    pub fn write_probability_csv<W: Write>(&self,w: &mut W) -> Result<(),std::io::Error> {
        let total = self.symbol_freq.total();
        writeln!(w,"symbol,probability")?;
        for (&sym,&count) in self.symbol_freq.iter() {
            writeln!(w,"{},{}",sym,count as f64 / total as f64)?;
        }
        Ok(())
    }
}

/// Structure to perform one expansion run.  States are strictly
/// sequential: offset header, length header, triples, done.
pub struct Decoder {
    output: Vec<u8>
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            output: Vec::new()
        }
    }
    /// Rebuild both code tables from the header, then resolve triples
    /// against the already-reconstructed output until the bits run out
    /// at a triple boundary.
    pub fn decode(&mut self,compressed: &[u8]) -> Result<&[u8],Error> {
        let mut reader = BitReader::from_bytes(compressed);
        let offset_table = CodeTable::deserialize(&mut reader)?;
        let length_table = CodeTable::deserialize(&mut reader)?;
        let offset_huff = HuffmanDecoder::from_table(&offset_table)?;
        let length_huff = HuffmanDecoder::from_table(&length_table)?;
        // the smallest possible triple; anything shorter left in the
        // stream is final-byte padding (always under 8 bits)
        let min_triple_bits = match (offset_table.min_code_len(),length_table.min_code_len()) {
            (Some(o),Some(l)) => o + l + 8,
            _ => {
                // empty tables mean no triples were coded
                return Ok(&self.output);
            }
        };
        while reader.remaining() >= min_triple_bits {
            let offset = offset_huff.decode(&mut reader)? as usize;
            let length = length_huff.decode(&mut reader)? as usize;
            let literal = reader.get_bits(8).ok_or(Error::UnknownCode)? as u8;
            if offset > self.output.len() || (offset == 0 && length > 0) {
                log::error!("back reference {} at output position {}",offset,self.output.len());
                return Err(Error::InvalidBackReference);
            }
            // source may overlap destination, copy must run forward
            for _i in 0..length {
                let sym = self.output[self.output.len() - offset];
                self.output.push(sym);
            }
            self.output.push(literal);
        }
        log::debug!("decoded {} symbols",self.output.len());
        Ok(&self.output)
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut expanded_length = expanded_in.seek(SeekFrom::End(0))?;
    if opt.in_offset > expanded_length {
        return Err(Box::new(Error::InputUnavailable));
    }
    expanded_length -= opt.in_offset;
    if expanded_length > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    expanded_in.seek(SeekFrom::Start(opt.in_offset))?;
    let mut ibuf: Vec<u8> = Vec::new();
    expanded_in.read_to_end(&mut ibuf)?;
    let mut encoder = Encoder::new(&ibuf);
    encoder.run();
    if let Some(csv_path) = &opt.csv {
        let mut csv_file = std::fs::File::create(csv_path)?;
        encoder.write_probability_csv(&mut csv_file)?;
    }
    let obuf = encoder.serialize()?;
    compressed_out.seek(SeekFrom::Start(opt.out_offset))?;
    compressed_out.write_all(&obuf)?;
    compressed_out.flush()?;
    Ok((expanded_length,obuf.len() as u64))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut compressed_length = compressed_in.seek(SeekFrom::End(0))?;
    if opt.in_offset > compressed_length {
        return Err(Box::new(Error::InputUnavailable));
    }
    compressed_length -= opt.in_offset;
    if compressed_length > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    compressed_in.seek(SeekFrom::Start(opt.in_offset))?;
    let mut ibuf: Vec<u8> = Vec::new();
    compressed_in.read_to_end(&mut ibuf)?;
    let mut decoder = Decoder::new();
    let obuf = decoder.decode(&ibuf)?;
    expanded_out.seek(SeekFrom::Start(opt.out_offset))?;
    expanded_out.write_all(obuf)?;
    expanded_out.flush()?;
    Ok((compressed_length,obuf.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[test]
fn compression_works() {
    // "aaa" emits (0,0,'a') then (1,1,'a'); both alphabets are {0,1}
    // with equal frequencies, so both tables code 0->0 and 1->1
    let test_data = "aaa".as_bytes();
    let lz77_str = "00 02 00 00 01 00 00 80 C0 00 80 00 00 40 00 20 31 87 61";
    let compressed = compress_slice(test_data,&crate::STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(lz77_str.replace(" ","")).unwrap());
}

#[test]
fn empty_input() {
    // two empty headers and nothing else
    let compressed = compress_slice(&[],&crate::STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,vec![0,0,0,0]);
    let expanded = expand_slice(&compressed,&crate::STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,Vec::<u8>::new());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&crate::STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&crate::STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data = "abababab".as_bytes();
    let compressed = compress_slice(test_data,&crate::STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&crate::STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data: Vec<u8> = (0..4000u32).map(|i| (i*i % 251) as u8).collect();
    let compressed = compress_slice(&test_data,&crate::STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&crate::STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn invertibility_at_window_edge() {
    // length exactly search buffer + lookahead buffer exercises the
    // slide/removal logic without off-by-one corruption of the index
    let test_data: Vec<u8> = (0..SEARCH_BUFFER_SIZE + LOOKAHEAD_SIZE)
        .map(|i| b"the quick brown fox "[i % 20])
        .collect();
    let compressed = compress_slice(&test_data,&crate::STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&crate::STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn repeated_byte_collapses() {
    // 1000 copies of 'x': one literal start, then maximum-length
    // back-references, far fewer triples than symbols
    let test_data = vec![b'x';1000];
    let mut encoder = Encoder::new(&test_data);
    encoder.run();
    assert!(encoder.triples().len() <= 5,"got {} triples",encoder.triples().len());
    let compressed = compress_slice(&test_data,&crate::STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&crate::STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn triples_are_valid() {
    let test_data = "she sells sea shells by the sea shore".as_bytes();
    let mut encoder = Encoder::new(test_data);
    encoder.run();
    let mut consumed: usize = 0;
    for t in encoder.triples() {
        assert!(t.offset as usize <= SEARCH_BUFFER_SIZE);
        assert!(t.length as usize <= LOOKAHEAD_SIZE);
        if t.length == 0 {
            assert_eq!(t.offset,0);
        } else {
            assert!(t.offset as usize <= consumed);
        }
        consumed += t.length as usize + 1;
    }
    assert_eq!(consumed,test_data.len());
}

#[test]
fn corrupt_header_detected() {
    let compressed = compress_slice("some reasonable text".as_bytes(),&crate::STD_OPTIONS)
        .expect("compression failed");
    let mut decoder = Decoder::new();
    match decoder.decode(&compressed[0..1]) {
        Err(Error::CorruptHeader) => {},
        _ => panic!("expected corrupt header")
    }
}

#[test]
fn invalid_back_reference_detected() {
    // hand-build a file whose first triple reaches behind the start of
    // output: offset table {2: 0}, length table {1: 0}
    let mut writer = BitWriter::new();
    writer.put_bits(1,16); // offset header
    writer.put_bits(2,16);
    writer.put_bits(1,8);
    writer.put_bits(0,1);
    writer.put_bits(1,16); // length header
    writer.put_bits(1,16);
    writer.put_bits(1,8);
    writer.put_bits(0,1);
    writer.put_bits(0,1); // offset code
    writer.put_bits(0,1); // length code
    writer.put_bits(0x61,8); // literal
    let mut decoder = Decoder::new();
    match decoder.decode(&writer.to_bytes()) {
        Err(Error::InvalidBackReference) => {},
        _ => panic!("expected invalid back reference")
    }
}

#[test]
fn probability_csv() {
    let test_data = "aab".as_bytes();
    let mut encoder = Encoder::new(test_data);
    encoder.run();
    let mut csv: Vec<u8> = Vec::new();
    encoder.write_probability_csv(&mut csv).expect("csv failed");
    let txt = String::from_utf8(csv).expect("bad utf8");
    let lines: Vec<&str> = txt.lines().collect();
    assert_eq!(lines[0],"symbol,probability");
    assert!(lines.contains(&format!("{},{}",b'a',2.0/3.0).as_str()));
    assert!(lines.contains(&format!("{},{}",b'b',1.0/3.0).as_str()));
}
