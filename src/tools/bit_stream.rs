//! Bit-level framing for the compressed file.
//! Every field of the format goes through one of these two structs,
//! most significant bit first, independent of byte alignment.

use bit_vec::BitVec;

/// Accumulates the output bit sequence.  The final byte is padded
/// with zero bits when the stream is converted to bytes.
pub struct BitWriter {
    bits: BitVec
}

/// Walks an input byte buffer bit by bit based on an internal pointer.
/// Running off the end is reported, never padded; the caller decides
/// whether that means clean termination or a corrupt stream.
pub struct BitReader {
    bits: BitVec,
    ptr: usize
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new()
        }
    }
    pub fn put_bit(&mut self,bit: bool) {
        self.bits.push(bit);
    }
    /// output `num_bits` of `code` starting from the MSB, `num_bits` up to 64
    pub fn put_bits(&mut self,mut code: u64,num_bits: usize) {
        if num_bits == 0 {
            return;
        }
        code <<= u64::BITS as usize - num_bits;
        for _i in 0..num_bits {
            self.bits.push(code & (1 << (u64::BITS - 1)) > 0);
            code <<= 1;
        }
    }
    /// append a pre-built code verbatim
    pub fn append_code(&mut self,code: &BitVec) {
        for bit in code.iter() {
            self.put_bit(bit);
        }
    }
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.to_bytes()
    }
}

impl BitReader {
    pub fn from_bytes(dat: &[u8]) -> Self {
        Self {
            bits: BitVec::from_bytes(dat),
            ptr: 0
        }
    }
    /// get the next bit based on the internal bit pointer, `None` when exhausted
    pub fn get_bit(&mut self) -> Option<bool> {
        match self.bits.get(self.ptr) {
            Some(bit) => {
                self.ptr += 1;
                Some(bit)
            },
            None => None
        }
    }
    /// get the next `num_bits` into a u64 starting from the MSB,
    /// `None` if the stream runs out first
    pub fn get_bits(&mut self,num_bits: usize) -> Option<u64> {
        let mut ans: u64 = 0;
        for _i in 0..num_bits {
            ans <<= 1;
            ans |= self.get_bit()? as u64;
        }
        Some(ans)
    }
    /// bits left between the pointer and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.ptr
    }
}

#[test]
fn bit_order() {
    let mut writer = BitWriter::new();
    writer.put_bits(0b101,3);
    writer.put_bits(0x61,8);
    assert_eq!(writer.len(),11);
    // 101 0110 0001 -> 1010 1100 001 padded
    assert_eq!(writer.to_bytes(),vec![0xac,0x20]);
}

#[test]
fn read_back() {
    let mut writer = BitWriter::new();
    writer.put_bits(0xbeef,16);
    writer.put_bit(true);
    let mut reader = BitReader::from_bytes(&writer.to_bytes());
    assert_eq!(reader.get_bits(16),Some(0xbeef));
    assert_eq!(reader.get_bit(),Some(true));
    // 7 pad bits remain, then exhaustion
    assert_eq!(reader.remaining(),7);
    assert_eq!(reader.get_bits(7),Some(0));
    assert_eq!(reader.get_bit(),None);
    assert_eq!(reader.get_bits(4),None);
}
