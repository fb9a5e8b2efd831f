//! Decision-tree cascade backends.
//!
//! These implement the capability traits against the compact binary cascade
//! format used by the bundled models: a face classifier, a pupil regressor,
//! and a directory of landmark regressors sharing the pupil format. The
//! geometry pipeline never depends on these directly; everything flows
//! through the traits in [`crate::locate`].

mod face;
mod landmark;
mod puploc;

pub use face::FaceFinder;
pub use landmark::{LandmarkFinder, LandmarkSet};
pub use puploc::PupilFinder;

use anyhow::Result;

/// Little-endian cursor over a cascade blob.
///
/// All reads fail loudly on truncated input so a corrupt model file turns
/// into a fatal unpack error rather than a misbehaving classifier.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_i8_slice(&mut self, n: usize) -> Result<Vec<i8>> {
        let bytes = self.take(n)?;
        Ok(bytes.iter().map(|&b| b as i8).collect())
    }

    pub(crate) fn read_f32_slice(&mut self, n: usize) -> Result<Vec<f32>> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.read_f32()?);
        }
        Ok(values)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        anyhow::ensure!(
            self.pos + n <= self.data.len(),
            "cascade data truncated: wanted {} bytes at offset {}, have {}",
            n,
            self.pos,
            self.data.len()
        );
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_values() {
        let mut data = Vec::new();
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.push(0xFF);

        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_i32().unwrap(), 7);
        assert!((reader.read_f32().unwrap() - 1.5).abs() < f32::EPSILON);
        assert_eq!(reader.read_i8_slice(1).unwrap(), vec![-1]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_input_errors() {
        let mut reader = ByteReader::new(&[1, 2]);
        let err = reader.read_i32().unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }
}
