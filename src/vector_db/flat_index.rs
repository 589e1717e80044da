//! Exact (brute-force) L2 vector index with a compact binary encoding

use rayon::prelude::*;
use std::cmp::Ordering;
use thiserror::Error;

/// "FLAT"
const MAGIC: u32 = 0x464C_4154;
const FORMAT_VERSION: u16 = 1;
const METRIC_L2: u16 = 0;
const HEADER_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlatIndexError {
    #[error("vector file is truncated: {0}")]
    Truncated(String),

    #[error("not a vector index file (bad magic)")]
    BadMagic,

    #[error("unsupported vector file version {0}")]
    UnsupportedVersion(u16),

    #[error("unsupported distance metric {0}")]
    UnsupportedMetric(u16),

    #[error("vector has dimension {actual}, index expects {expected}")]
    Dimension { expected: usize, actual: usize },
}

/// Vectors stored contiguously; position `i` is the `i`-th added vector
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn from_vectors(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self, FlatIndexError> {
        let mut index = Self::new(dimension);
        index.data.reserve(dimension * vectors.len());
        for vector in vectors {
            index.add(vector)?;
        }
        Ok(index)
    }

    /// Append a vector, returning its position
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, FlatIndexError> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        Ok(self.len() - 1)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Up to `k` `(position, squared L2 distance)` pairs, nearest first,
    /// ties broken by ascending position
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, FlatIndexError> {
        let mut ranked = self.rank(query)?;
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Every position ordered by distance to `query`
    pub fn rank(&self, query: &[f32]) -> Result<Vec<(usize, f32)>, FlatIndexError> {
        self.check_dimension(query)?;
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(vector, query)))
            .collect();

        scored.par_sort_unstable_by(|a, b| compare_hits(*a, *b));
        Ok(scored)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        buffer.extend_from_slice(&MAGIC.to_le_bytes());
        buffer.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buffer.extend_from_slice(&METRIC_L2.to_le_bytes());
        buffer.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        buffer.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for value in &self.data {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FlatIndexError> {
        if bytes.len() < HEADER_LEN {
            return Err(FlatIndexError::Truncated(format!(
                "{} bytes, header needs {}",
                bytes.len(),
                HEADER_LEN
            )));
        }

        if read_u32(bytes, 0) != MAGIC {
            return Err(FlatIndexError::BadMagic);
        }
        let version = read_u16(bytes, 4);
        if version != FORMAT_VERSION {
            return Err(FlatIndexError::UnsupportedVersion(version));
        }
        let metric = read_u16(bytes, 6);
        if metric != METRIC_L2 {
            return Err(FlatIndexError::UnsupportedMetric(metric));
        }
        let dimension = read_u32(bytes, 8) as usize;
        let count = read_u32(bytes, 12) as usize;

        let expected_len = dimension
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| FlatIndexError::Truncated("header sizes overflow".to_string()))?;
        if bytes.len() != expected_len {
            return Err(FlatIndexError::Truncated(format!(
                "expected {} bytes for {} vectors of dimension {}, found {}",
                expected_len,
                count,
                dimension,
                bytes.len()
            )));
        }

        let data = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { dimension, data })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), FlatIndexError> {
        if vector.len() != self.dimension {
            return Err(FlatIndexError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn compare_hits(a: (usize, f32), b: (usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
