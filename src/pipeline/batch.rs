//! Page batching: split a document's pages into fixed-size windows.
//!
//! A window is the unit handed to the extraction engine. Windows are
//! half-open, 0-indexed page ranges that together cover `[0, total_pages)`
//! exactly once, in ascending order; only the last one may be short.

use crate::error::Pdf2XlsxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Splits `total_pages` into windows of at most `window_size` pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBatcher {
    total_pages: usize,
    window_size: usize,
}

impl PageBatcher {
    /// Rejects `window_size == 0`.
    pub fn new(total_pages: usize, window_size: usize) -> Result<Self, Pdf2XlsxError> {
        if window_size == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "Window size must be ≥ 1 page".into(),
            ));
        }
        Ok(Self {
            total_pages,
            window_size,
        })
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of windows: ⌈total_pages / window_size⌉.
    pub fn window_count(&self) -> usize {
        self.total_pages.div_ceil(self.window_size)
    }

    /// A fresh iterator over the windows. Each call starts from the first window.
    pub fn windows(&self) -> PageWindows {
        PageWindows {
            next_start: 0,
            index: 0,
            total_pages: self.total_pages,
            window_size: self.window_size,
        }
    }
}

impl IntoIterator for &PageBatcher {
    type Item = PageWindow;
    type IntoIter = PageWindows;

    fn into_iter(self) -> PageWindows {
        self.windows()
    }
}

/// Lazy iterator returned by [`PageBatcher::windows`].
#[derive(Debug, Clone)]
pub struct PageWindows {
    next_start: usize,
    index: usize,
    total_pages: usize,
    window_size: usize,
}

impl Iterator for PageWindows {
    type Item = PageWindow;

    fn next(&mut self) -> Option<PageWindow> {
        if self.next_start >= self.total_pages {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.window_size).min(self.total_pages);
        let window = PageWindow {
            index: self.index,
            start,
            end,
        };
        self.next_start = end;
        self.index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .total_pages
            .saturating_sub(self.next_start)
            .div_ceil(self.window_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PageWindows {}

/// One window: pages `start..end` (0-indexed, half-open) at position `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    /// 0-indexed page indices of this window.
    pub fn pages(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 1-indexed window number, as used in artifact names.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// First page, 1-indexed.
    pub fn first_page(&self) -> usize {
        self.start + 1
    }

    /// Last page, 1-indexed and inclusive.
    pub fn last_page(&self) -> usize {
        self.end
    }

    /// The page-range descriptor handed to the extraction engine.
    pub fn page_range(&self) -> PageRange {
        PageRange((self.first_page()..=self.last_page()).collect())
    }
}

/// An ordered list of 1-indexed page numbers.
///
/// Rendered to engines as a comma-separated string (`"1,2,3"`). Parsing also
/// accepts spaces and inclusive spans (`"1-3, 7"`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRange(Vec<usize>);

impl PageRange {
    pub fn new(pages: Vec<usize>) -> Self {
        Self(pages)
    }

    /// 1-indexed page numbers in order.
    pub fn pages(&self) -> &[usize] {
        &self.0
    }

    /// 0-indexed page indices in order.
    pub fn to_indices(&self) -> Vec<usize> {
        self.0.iter().map(|p| p.saturating_sub(1)).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, page) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{page}")?;
        }
        Ok(())
    }
}

impl FromStr for PageRange {
    type Err = Pdf2XlsxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |part: &str| {
            Pdf2XlsxError::InvalidConfig(format!("Invalid page '{part}' in range '{s}'"))
        };
        let parse_page = |part: &str| -> Result<usize, Pdf2XlsxError> {
            match part.trim().parse::<usize>() {
                Ok(p) if p >= 1 => Ok(p),
                _ => Err(invalid(part)),
            }
        };

        let mut pages = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((start, end)) = part.split_once('-') {
                let (start, end) = (parse_page(start)?, parse_page(end)?);
                if start > end {
                    return Err(invalid(part));
                }
                pages.extend(start..=end);
            } else {
                pages.push(parse_page(part)?);
            }
        }
        Ok(Self(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(total: usize, size: usize) {
        let batcher = PageBatcher::new(total, size).unwrap();
        let windows: Vec<PageWindow> = batcher.windows().collect();
        assert_eq!(windows.len(), batcher.window_count(), "P={total} W={size}");

        let mut expected_start = 0;
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
            assert_eq!(w.start, expected_start, "gap or overlap at window {i}");
            assert!(w.len() >= 1 && w.len() <= size);
            expected_start = w.end;
        }
        assert_eq!(expected_start, total, "P={total} W={size} not covered");
    }

    #[test]
    fn windows_partition_pages_exactly() {
        for total in [0, 1, 2, 99, 100, 101, 250, 1000, 1001] {
            for size in [1, 2, 3, 7, 100, 1000, 5000] {
                assert_partition(total, size);
            }
        }
    }

    #[test]
    fn two_hundred_fifty_pages_in_hundreds() {
        let batcher = PageBatcher::new(250, 100).unwrap();
        let lens: Vec<usize> = batcher.windows().map(|w| w.len()).collect();
        assert_eq!(lens, vec![100, 100, 50]);
        let last = batcher.windows().last().unwrap();
        assert_eq!((last.first_page(), last.last_page(), last.number()), (201, 250, 3));
    }

    #[test]
    fn zero_pages_has_no_windows() {
        let batcher = PageBatcher::new(0, 100).unwrap();
        assert_eq!(batcher.window_count(), 0);
        assert!(batcher.windows().next().is_none());
    }

    #[test]
    fn zero_window_size_is_rejected() {
        assert!(matches!(
            PageBatcher::new(10, 0),
            Err(Pdf2XlsxError::InvalidConfig(_))
        ));
    }

    #[test]
    fn windows_are_restartable_and_exact_size() {
        let batcher = PageBatcher::new(25, 10).unwrap();
        let mut it = batcher.windows();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
        let again: Vec<_> = (&batcher).into_iter().collect();
        assert_eq!(again.len(), 3);
        assert_eq!(again[0].start, 0);
    }

    #[test]
    fn page_range_renders_comma_separated() {
        let w = PageWindow {
            index: 1,
            start: 3,
            end: 6,
        };
        assert_eq!(w.page_range().to_string(), "4,5,6");
        assert_eq!(w.page_range().to_indices(), vec![3, 4, 5]);
    }

    #[test]
    fn page_range_parses_lists_and_spans() {
        let r: PageRange = "1, 2,5-7".parse().unwrap();
        assert_eq!(r.pages(), &[1, 2, 5, 6, 7]);
        assert!("0".parse::<PageRange>().is_err());
        assert!("3-1".parse::<PageRange>().is_err());
        assert!("a,b".parse::<PageRange>().is_err());
        assert!("".parse::<PageRange>().unwrap().is_empty());
    }
}
