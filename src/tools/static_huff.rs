//! Static Huffman coding of the offset and length alphabets.
//!
//! A compressed file carries two independent code tables, one per
//! alphabet.  Only the (value, code length, code) tuples travel in the
//! header; the decoder rebuilds the inverse mapping from them directly
//! and never sees the frequencies.

use bit_vec::BitVec;
use std::collections::BTreeMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use crate::Error;
use super::bit_stream::{BitReader,BitWriter};

/// Occurrence counts for one alphabet.  Built once per stream,
/// consumed once to build a `CodeTable`.
pub struct FreqTable {
    counts: BTreeMap<u16,u64>
}

impl FreqTable {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new()
        }
    }
    pub fn count(&mut self,val: u16) {
        *self.counts.entry(val).or_insert(0) += 1;
    }
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&u16,&u64)> {
        self.counts.iter()
    }
}

/// Tree node used during construction, leaves come first in the pool
/// so that node ids double as insertion order for tie breaking.
#[derive(Clone,Copy)]
enum Node {
    Leaf(u16),
    Branch(usize,usize)
}

/// Prefix-free mapping from value to bit code for one alphabet.
pub struct CodeTable {
    codes: BTreeMap<u16,BitVec>
}

impl CodeTable {
    /// Standard greedy construction: repeatedly merge the two lowest
    /// frequencies.  Ties resolve by node id, so the earlier-inserted
    /// node is treated as lower and takes the 0 branch; this keeps the
    /// table reproducible for any given frequency distribution.
    pub fn from_frequencies(freq: &FreqTable) -> Self {
        let mut codes = BTreeMap::new();
        let mut pool: Vec<Node> = Vec::new();
        let mut heap: BinaryHeap<Reverse<(u64,usize)>> = BinaryHeap::new();
        for (&val,&count) in freq.iter() {
            heap.push(Reverse((count,pool.len())));
            pool.push(Node::Leaf(val));
        }
        if pool.is_empty() {
            return Self { codes };
        }
        if pool.len() == 1 {
            // a 0-bit code is not representable in the framing,
            // give the lone symbol a single bit
            if let Node::Leaf(val) = pool[0] {
                codes.insert(val,BitVec::from_elem(1,false));
            }
            return Self { codes };
        }
        let root = loop {
            let Reverse((f0,n0)) = match heap.pop() {
                Some(node) => node,
                None => break 0
            };
            let Reverse((f1,n1)) = match heap.pop() {
                Some(node) => node,
                None => break n0
            };
            heap.push(Reverse((f0 + f1,pool.len())));
            pool.push(Node::Branch(n0,n1));
        };
        // walk down from the root accumulating path bits
        let mut stack: Vec<(usize,BitVec)> = vec![(root,BitVec::new())];
        while let Some((node,prefix)) = stack.pop() {
            match pool[node] {
                Node::Leaf(val) => {
                    codes.insert(val,prefix);
                },
                Node::Branch(zero,one) => {
                    let mut left = prefix.clone();
                    left.push(false);
                    let mut right = prefix;
                    right.push(true);
                    stack.push((zero,left));
                    stack.push((one,right));
                }
            }
        }
        Self { codes }
    }
    pub fn get(&self,val: u16) -> Option<&BitVec> {
        self.codes.get(&val)
    }
    pub fn len(&self) -> usize {
        self.codes.len()
    }
    /// length of the shortest code, `None` for an empty table
    pub fn min_code_len(&self) -> Option<usize> {
        self.codes.values().map(|code| code.len()).min()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&u16,&BitVec)> {
        self.codes.iter()
    }
    /// Header layout: symbol count (16 bits), then for each symbol in
    /// ascending value order (value: 16 bits, code length: 8 bits,
    /// code: code length bits).
    pub fn serialize(&self,writer: &mut BitWriter) -> Result<(),Error> {
        writer.put_bits(self.codes.len() as u64,16);
        for (&val,code) in self.codes.iter() {
            if code.len() > 255 {
                log::error!("code for symbol {} needs {} bits",val,code.len());
                return Err(Error::CodeTooLong);
            }
            writer.put_bits(val as u64,16);
            writer.put_bits(code.len() as u64,8);
            writer.append_code(code);
        }
        Ok(())
    }
    /// Rebuild the value to code mapping from a header.
    pub fn deserialize(reader: &mut BitReader) -> Result<Self,Error> {
        let count = reader.get_bits(16).ok_or(Error::CorruptHeader)?;
        let mut codes = BTreeMap::new();
        for _i in 0..count {
            let val = reader.get_bits(16).ok_or(Error::CorruptHeader)? as u16;
            let code_len = reader.get_bits(8).ok_or(Error::CorruptHeader)? as usize;
            if code_len == 0 {
                return Err(Error::CorruptHeader);
            }
            let mut code = BitVec::with_capacity(code_len);
            for _b in 0..code_len {
                code.push(reader.get_bit().ok_or(Error::CorruptHeader)?);
            }
            if codes.insert(val,code).is_some() {
                return Err(Error::CorruptHeader);
            }
        }
        Ok(Self { codes })
    }
}

/// Inverse code to value mapping, stored as an explicit binary trie.
/// `down[node]` holds the child on a 0 or 1 bit, `value[node]` is set
/// exactly on the leaves.
pub struct HuffmanDecoder {
    down: Vec<[Option<usize>;2]>,
    value: Vec<Option<u16>>
}

impl HuffmanDecoder {
    pub fn from_table(table: &CodeTable) -> Result<Self,Error> {
        let mut ans = Self {
            down: vec![[None,None]],
            value: vec![None]
        };
        for (&val,code) in table.iter() {
            let mut node = 0;
            for bit in code.iter() {
                if ans.value[node].is_some() {
                    // an existing code is a prefix of this one
                    return Err(Error::CorruptHeader);
                }
                node = match ans.down[node][bit as usize] {
                    Some(next) => next,
                    None => {
                        ans.down.push([None,None]);
                        ans.value.push(None);
                        let next = ans.down.len() - 1;
                        ans.down[node][bit as usize] = Some(next);
                        next
                    }
                };
            }
            if ans.value[node].is_some() || ans.down[node] != [None,None] {
                // duplicate code, or this code is a prefix of another
                return Err(Error::CorruptHeader);
            }
            ans.value[node] = Some(val);
        }
        Ok(ans)
    }
    /// Consume bits until a leaf is reached.  Missing branches and
    /// premature end of bits both mean the stream is corrupt.
    pub fn decode(&self,reader: &mut BitReader) -> Result<u16,Error> {
        let mut node = 0;
        loop {
            if let Some(val) = self.value[node] {
                return Ok(val);
            }
            let bit = reader.get_bit().ok_or(Error::UnknownCode)?;
            node = self.down[node][bit as usize].ok_or(Error::UnknownCode)?;
        }
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn table_from_counts(counts: &[(u16,u64)]) -> CodeTable {
    let mut freq = FreqTable::new();
    for &(val,count) in counts {
        for _i in 0..count {
            freq.count(val);
        }
    }
    CodeTable::from_frequencies(&freq)
}

#[cfg(test)]
fn assert_prefix_free(table: &CodeTable) {
    for (v1,c1) in table.iter() {
        for (v2,c2) in table.iter() {
            if v1 == v2 {
                continue;
            }
            let shared = c1.iter().zip(c2.iter()).take_while(|(a,b)| a==b).count();
            assert!(shared < c1.len() && shared < c2.len(),
                "code for {} is a prefix of code for {}",v1,v2);
        }
    }
}

#[test]
fn deterministic_ties() {
    // equal frequencies: earlier symbol takes the 0 branch
    let table = table_from_counts(&[(0,1),(1,1)]);
    assert_eq!(table.get(0).unwrap().iter().collect::<Vec<bool>>(),vec![false]);
    assert_eq!(table.get(1).unwrap().iter().collect::<Vec<bool>>(),vec![true]);
}

#[test]
fn single_symbol_gets_one_bit() {
    let table = table_from_counts(&[(42,1000)]);
    assert_eq!(table.len(),1);
    assert_eq!(table.get(42).unwrap().len(),1);
}

#[test]
fn skewed_frequencies() {
    // heaviest symbol gets the shortest code
    let table = table_from_counts(&[(10,50),(11,2),(12,1),(13,1)]);
    assert_eq!(table.get(10).unwrap().len(),1);
    assert!(table.get(12).unwrap().len() >= table.get(11).unwrap().len());
    assert_prefix_free(&table);
}

#[test]
fn prefix_free_full_byte_alphabet() {
    let counts: Vec<(u16,u64)> = (0..256).map(|v| (v as u16,1 + (v as u64 * 7) % 23)).collect();
    let table = table_from_counts(&counts);
    assert_eq!(table.len(),256);
    assert_prefix_free(&table);
}

#[test]
fn header_round_trip() {
    for counts in [
        vec![(7,3)],
        vec![(0,1),(2048,9)],
        (0..256).map(|v| (v as u16,1 + v as u64)).collect::<Vec<(u16,u64)>>()
    ] {
        let table = table_from_counts(&counts);
        let mut writer = BitWriter::new();
        table.serialize(&mut writer).expect("serialize failed");
        let mut reader = BitReader::from_bytes(&writer.to_bytes());
        let rebuilt = CodeTable::deserialize(&mut reader).expect("deserialize failed");
        assert_eq!(rebuilt.len(),table.len());
        for (&val,code) in table.iter() {
            assert_eq!(rebuilt.get(val),Some(code));
        }
    }
}

#[test]
fn truncated_header_detected() {
    let table = table_from_counts(&[(1,2),(2,3),(3,5)]);
    let mut writer = BitWriter::new();
    table.serialize(&mut writer).expect("serialize failed");
    let bytes = writer.to_bytes();
    let mut reader = BitReader::from_bytes(&bytes[0..3]);
    match CodeTable::deserialize(&mut reader) {
        Err(Error::CorruptHeader) => {},
        _ => panic!("expected corrupt header")
    }
}

#[test]
fn unknown_code_detected() {
    // table with codes 10 and 11, nothing starts with 0
    let mut writer = BitWriter::new();
    writer.put_bits(2,16);
    writer.put_bits(5,16);
    writer.put_bits(2,8);
    writer.put_bits(0b10,2);
    writer.put_bits(6,16);
    writer.put_bits(2,8);
    writer.put_bits(0b11,2);
    let mut reader = BitReader::from_bytes(&writer.to_bytes());
    let table = CodeTable::deserialize(&mut reader).expect("deserialize failed");
    let decoder = HuffmanDecoder::from_table(&table).expect("bad table");
    let mut content = BitReader::from_bytes(&[0b00000000]);
    match decoder.decode(&mut content) {
        Err(Error::UnknownCode) => {},
        _ => panic!("expected unknown code")
    }
    let mut content = BitReader::from_bytes(&[0b10110000]);
    assert_eq!(decoder.decode(&mut content).unwrap(),5);
    assert_eq!(decoder.decode(&mut content).unwrap(),6);
}

#[test]
fn prefix_violation_rejected() {
    // 0 and 01 cannot coexist
    let mut writer = BitWriter::new();
    writer.put_bits(2,16);
    writer.put_bits(1,16);
    writer.put_bits(1,8);
    writer.put_bits(0b0,1);
    writer.put_bits(2,16);
    writer.put_bits(2,8);
    writer.put_bits(0b01,2);
    let mut reader = BitReader::from_bytes(&writer.to_bytes());
    let table = CodeTable::deserialize(&mut reader).expect("deserialize failed");
    match HuffmanDecoder::from_table(&table) {
        Err(Error::CorruptHeader) => {},
        _ => panic!("expected corrupt header")
    }
}
