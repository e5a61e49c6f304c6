//! Sliding window substring matcher for the LZ77 stage.
//!
//! The window keeps an ordered index of every substring anchored in the
//! search buffer, capped at the look-ahead size.  Because any substring
//! sharing a longer common prefix with a query sorts closer to it, the
//! longest match is always one of the two lexicographic neighbors of the
//! look-ahead buffer, so a match costs two neighbor lookups instead of a
//! scan over the whole window.  Sliding in or out one anchor is one
//! ordered-map operation, so an N symbol input costs O(N log W) overall.

use std::collections::BTreeMap;
use std::ops::Bound;

/// Result of a window query: copy `length` symbols starting `offset`
/// positions behind the cursor.  `length == 0` forces `offset == 0`.
pub struct Match {
    pub offset: usize,
    pub length: usize
}

/// State of the matcher between emissions.  The index maps each
/// anchored substring to its most recent anchor position; an older
/// duplicate is shadowed and sliding it out leaves the entry alone.
pub struct SlidingWindow<'a> {
    input: &'a [u8],
    /// boundary between the search buffer and the look-ahead buffer
    cursor: usize,
    /// first anchor position still indexed
    oldest: usize,
    index: BTreeMap<&'a [u8],usize>,
    search_size: usize,
    lookahead_size: usize
}

fn common_prefix(a: &[u8],b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x,y)| x==y).count()
}

impl <'a> SlidingWindow<'a> {
    pub fn create(input: &'a [u8],search_size: usize,lookahead_size: usize) -> Self {
        Self {
            input,
            cursor: 0,
            oldest: 0,
            index: BTreeMap::new(),
            search_size,
            lookahead_size
        }
    }
    /// substring anchored at `pos`, clamped to the look-ahead size and
    /// to the end of input
    fn anchored(&self,pos: usize) -> &'a [u8] {
        let end = (pos + self.lookahead_size).min(self.input.len());
        &self.input[pos..end]
    }
    /// the not-yet-encoded symbols being matched, clamped to remaining input
    pub fn lookahead(&self) -> &'a [u8] {
        self.anchored(self.cursor)
    }
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }
    /// Find the best match for the look-ahead buffer's prefix against
    /// the search buffer.  Only the two entries adjacent to the query in
    /// lexicographic order are examined; the longer common prefix wins
    /// and equal lengths prefer the smaller offset.
    pub fn find_match(&self) -> Match {
        let query = self.lookahead();
        let mut best = Match { offset: 0, length: 0 };
        if query.is_empty() {
            return best;
        }
        let below = self.index
            .range::<[u8],_>((Bound::Unbounded,Bound::Included(query)))
            .next_back();
        let above = self.index
            .range::<[u8],_>((Bound::Excluded(query),Bound::Unbounded))
            .next();
        for (key,&pos) in below.into_iter().chain(above) {
            let length = common_prefix(key,query);
            let offset = self.cursor - pos;
            if length > best.length || (length == best.length && length > 0 && offset < best.offset) {
                best = Match { offset, length };
            }
        }
        best
    }
    /// Slide the window after emitting a triple that consumed
    /// `consumed` symbols (match length plus the literal).  Newly
    /// consumed positions become anchors, anchors fallen out of the
    /// bounded search buffer are dropped.
    pub fn advance(&mut self,consumed: usize) {
        for pos in self.cursor..self.cursor + consumed {
            self.index.insert(self.anchored(pos),pos);
        }
        self.cursor += consumed;
        while self.cursor - self.oldest > self.search_size {
            let key = self.anchored(self.oldest);
            if self.index.get(key) == Some(&self.oldest) {
                self.index.remove(key);
            }
            self.oldest += 1;
        }
    }
}

// *************** TESTS *****************

#[test]
fn no_match_at_start() {
    let window = SlidingWindow::create(b"abcabc",2048,255);
    let m = window.find_match();
    assert_eq!(m.length,0);
    assert_eq!(m.offset,0);
}

#[test]
fn longest_match_is_found() {
    // at cursor 2 the look-ahead "ababab" must match length 6 at offset 2,
    // extending through the look-ahead region, not just the 2-symbol
    // search buffer
    let window = {
        let mut w = SlidingWindow::create(b"abababab",2048,255);
        w.advance(2);
        w
    };
    let m = window.find_match();
    assert_eq!(m.length,6);
    assert_eq!(m.offset,2);
}

#[test]
fn tie_prefers_smaller_offset() {
    // at cursor 4 the query "ac.." falls between "ab.." (offset 4) and
    // "ad.." (offset 2), both matching a single symbol
    let mut window = SlidingWindow::create(b"abadacxx",2048,255);
    window.advance(4);
    let m = window.find_match();
    assert_eq!(m.length,1);
    assert_eq!(m.offset,2);
}

#[test]
fn lookahead_clamps_at_end() {
    let mut window = SlidingWindow::create(b"xyxy",2048,255);
    window.advance(2);
    assert_eq!(window.lookahead(),b"xy");
    let m = window.find_match();
    assert_eq!(m.length,2);
    assert_eq!(m.offset,2);
}

#[test]
fn length_capped_by_lookahead_size() {
    let dat = vec![b'q';64];
    let mut window = SlidingWindow::create(&dat,16,4);
    window.advance(1);
    let m = window.find_match();
    assert_eq!(m.length,4);
    assert_eq!(m.offset,1);
}

#[test]
fn window_slide_drops_old_anchors() {
    // input exactly search + lookahead long, distinct symbols so every
    // anchor key is unique
    let search = 8;
    let lookahead = 4;
    let dat: Vec<u8> = (0..(search + lookahead) as u8).collect();
    let mut window = SlidingWindow::create(&dat,search,lookahead);
    for _i in 0..dat.len() {
        window.advance(1);
        assert!(window.indexed_count() <= search);
    }
    assert_eq!(window.indexed_count(),search);
    // oldest surviving anchor is at dat.len()-search, so the best match
    // for a stale prefix is gone
    assert_eq!(window.oldest,dat.len() - search);
}

#[test]
fn duplicate_substring_survives_eviction() {
    // "ab" is anchored at 0 and again at 2; sliding out anchor 0 must
    // keep the entry alive under the newer anchor
    let mut window = SlidingWindow::create(b"ababzab",2,255);
    window.advance(4);
    // anchors 0,1 have slid out, 2,3 remain
    let m = window.find_match();
    assert_eq!(m.length,0);
    let mut window = SlidingWindow::create(b"ababab",2,2);
    window.advance(4);
    let m = window.find_match();
    assert_eq!(m.length,2);
    assert_eq!(m.offset,2);
}
