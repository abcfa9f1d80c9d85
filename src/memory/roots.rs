//! Root ranges for conservative collection
//!
//! The collector cannot see the host's stack or registers, so the
//! host registers the memory ranges that hold its live references.
//! Every aligned word in a root range is a potential pointer.

use std::mem::size_of;

/// A span of memory scanned for candidate pointers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RootRange {
    start: usize,
    len: usize,
}

impl RootRange {
    /// Describe the range `[start, start + len)`
    pub fn new(start: *const u8, len: usize) -> Self {
        RootRange {
            start: start as usize,
            len,
        }
    }

    /// Describe the memory backing a slice
    pub fn from_slice<T>(slice: &[T]) -> Self {
        RootRange::new(slice.as_ptr().cast(), std::mem::size_of_val(slice))
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Addresses of every fully contained, word aligned word
    pub fn word_addresses(&self) -> impl Iterator<Item = usize> {
        let word = size_of::<usize>();
        let first = (self.start + word - 1) & !(word - 1);
        let end = self.start + self.len;
        (first..end)
            .step_by(word)
            .take_while(move |addr| addr + word <= end)
    }
}

/// Registered root ranges, keyed by start address
#[derive(Debug, Default)]
pub struct RootSet {
    ranges: Vec<RootRange>,
}

impl RootSet {
    /// Register a range, replacing any range with the same start
    pub fn add(&mut self, range: RootRange) {
        self.remove(range.start());
        self.ranges.push(range);
    }

    /// Remove the range starting at `start`, returning whether one
    /// was registered
    pub fn remove(&mut self, start: usize) -> bool {
        let before = self.ranges.len();
        self.ranges.retain(|r| r.start() != start);
        before != self.ranges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_word_addresses_of_slice() {
        let words = [1usize, 2, 3, 4];
        let range = RootRange::from_slice(&words);
        let addrs: Vec<usize> = range.word_addresses().collect();

        assert_eq!(addrs.len(), 4);
        assert_eq!(addrs[0], words.as_ptr() as usize);
        assert_eq!(addrs[3], &words[3] as *const usize as usize);
    }

    #[test]
    pub fn test_unaligned_range_skips_partial_words() {
        let words = [0usize; 4];
        let base = words.as_ptr() as usize;
        let range = RootRange::new((base + 1) as *const u8, size_of::<usize>() * 3);
        let addrs: Vec<usize> = range.word_addresses().collect();

        // the partial words at either end are not scanned
        assert_eq!(
            addrs,
            vec![base + size_of::<usize>(), base + 2 * size_of::<usize>()]
        );
    }

    #[test]
    pub fn test_root_set_replaces_same_start() {
        let words = [0usize; 8];
        let mut roots = RootSet::default();

        roots.add(RootRange::from_slice(&words[..2]));
        roots.add(RootRange::from_slice(&words[..8]));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots.iter().next().map(|r| r.len()), Some(8 * size_of::<usize>()));

        assert!(roots.remove(words.as_ptr() as usize));
        assert!(!roots.remove(words.as_ptr() as usize));
        assert!(roots.is_empty());
    }
}
