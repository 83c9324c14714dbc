//! Fixed-stride analysis windows.
//!
//! [`slice`] turns a contiguous sample run into overlapping fixed-length
//! windows. Windows are borrowed slices of the chunk, so they cannot outlive
//! it, and the iterator is `Clone` so a window sequence can be walked again.

use std::iter::FusedIterator;

use crate::error::{NightjarError, Result};

/// Number of windows of `record_length` samples, `hop_length` apart, that fit
/// in `num_samples` samples.
///
/// # Errors
/// `NightjarError::Configuration` if either length is zero or the hop exceeds
/// the record length.
pub fn num_windows(num_samples: usize, record_length: usize, hop_length: usize) -> Result<usize> {
    validate(record_length, hop_length)?;

    if num_samples < record_length {
        return Ok(0);
    }

    let overlap = record_length - hop_length;
    Ok((num_samples - overlap) / hop_length)
}

/// Check window geometry without slicing anything.
pub fn validate(record_length: usize, hop_length: usize) -> Result<()> {
    if record_length == 0 {
        return Err(NightjarError::Configuration(
            "record length must be positive".into(),
        ));
    }
    if hop_length == 0 {
        return Err(NightjarError::Configuration(
            "hop length must be positive".into(),
        ));
    }
    if hop_length > record_length {
        return Err(NightjarError::Configuration(format!(
            "hop length {hop_length} exceeds record length {record_length}"
        )));
    }
    Ok(())
}

/// Slice `samples` into overlapping windows.
pub fn slice(samples: &[f32], record_length: usize, hop_length: usize) -> Result<Windows<'_>> {
    let count = num_windows(samples.len(), record_length, hop_length)?;
    Ok(Windows {
        samples,
        record_length,
        hop_length,
        next: 0,
        count,
    })
}

/// Lazy sequence of analysis windows over one sample run.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    samples: &'a [f32],
    record_length: usize,
    hop_length: usize,
    next: usize,
    count: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a [f32];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let start = self.next * self.hop_length;
        self.next += 1;
        Some(&self.samples[start..start + self.record_length])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

impl FusedIterator for Windows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_count_matches_overlap_formula() {
        assert_eq!(num_windows(9, 10, 5).unwrap(), 0);
        assert_eq!(num_windows(10, 10, 5).unwrap(), 1);
        assert_eq!(num_windows(14, 10, 5).unwrap(), 1);
        assert_eq!(num_windows(15, 10, 5).unwrap(), 2);
        assert_eq!(num_windows(35, 10, 5).unwrap(), 6);
        assert_eq!(num_windows(30, 10, 10).unwrap(), 3);
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(
            num_windows(100, 0, 1),
            Err(NightjarError::Configuration(_))
        ));
        assert!(matches!(
            num_windows(100, 10, 0),
            Err(NightjarError::Configuration(_))
        ));
        assert!(matches!(
            slice(&[0.0; 100], 10, 11),
            Err(NightjarError::Configuration(_))
        ));
    }

    #[test]
    fn windows_overlap_by_record_minus_hop() {
        let samples: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let windows: Vec<&[f32]> = slice(&samples, 4, 3).unwrap().collect();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(windows[1], &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(windows[2], &[6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn clone_restarts_from_same_position() {
        let samples = vec![0.25f32; 20];
        let mut windows = slice(&samples, 5, 5).unwrap();
        assert_eq!(windows.len(), 4);

        windows.next();
        let replay = windows.clone();
        assert_eq!(windows.count(), 3);
        assert_eq!(replay.len(), 3);
    }

    #[test]
    fn short_input_yields_nothing() {
        let samples = vec![1.0f32; 3];
        assert_eq!(slice(&samples, 4, 2).unwrap().count(), 0);
        assert_eq!(slice(&[], 4, 2).unwrap().count(), 0);
    }
}
