//! Safetensors dumps of workflow results.
//!
//! The workflow draws nothing itself; [`StWriter`] stores signals, sources
//! and averaged responses so any viewer that reads safetensors can plot
//! them.  [`StReader`] reads such a file back.
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::path::Path;

struct Entry {
    name:  String,
    bytes: Vec<u8>,
    dtype: &'static str,
    shape: Vec<usize>,
}

/// Safetensors writer for F64 and I64 tensors plus a string metadata
/// map (`__metadata__`).
///
/// ```rust,no_run
/// use artica::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_metadata("sfreq", "150.0");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries:  Vec<Entry>,
    metadata: BTreeMap<String, String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, bytes, "F64", shape);
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, bytes, "I64", shape);
    }

    pub fn add_arr1(&mut self, name: &str, arr: &Array1<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.len()]);
    }

    /// Row-major copy of `arr`.
    pub fn add_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &str, bytes: Vec<u8>, dtype: &'static str, shape: &[usize]) {
        self.entries.push(Entry { name: name.to_string(), bytes, dtype, shape: shape.to_vec() });
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::to_value(&self.metadata)?);
        }
        let mut offset: usize = 0;
        for e in &self.entries {
            if header_map.contains_key(&e.name) {
                bail!("duplicate tensor name {:?}", e.name);
            }
            header_map.insert(e.name.clone(), serde_json::json!({
                "dtype": e.dtype,
                "shape": e.shape,
                "data_offsets": [offset, offset + e.bytes.len()],
            }));
            offset += e.bytes.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();

        let mut f = std::fs::File::create(path)
            .with_context(|| format!("create {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for e in &self.entries {
            f.write_all(&e.bytes)?;
        }
        log::debug!("wrote {} tensors ({offset} bytes) to {}", self.entries.len(), path.display());
        Ok(())
    }
}

/// Whole-file safetensors reader.
pub struct StReader {
    bytes:      Vec<u8>,
    header:     serde_json::Map<String, serde_json::Value>,
    data_start: usize,
}

impl StReader {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("{}: safetensors file too small", path.display());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len) as usize;
        let data_start = 8 + n;
        if bytes.len() < data_start {
            bail!("{}: header runs past end of file", path.display());
        }
        let header = serde_json::from_slice(&bytes[8..data_start])
            .context("failed to parse safetensors header")?;
        Ok(Self { bytes, header, data_start })
    }

    /// Tensor names, metadata excluded.
    pub fn names(&self) -> Vec<&str> {
        self.header.keys().map(String::as_str).filter(|k| *k != "__metadata__").collect()
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.header.get("__metadata__")?.get(key)?.as_str()
    }

    pub fn shape(&self, name: &str) -> Result<Vec<usize>> {
        let entry = self.entry(name)?;
        entry["shape"]
            .as_array()
            .context("shape is not an array")?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize).context("shape entry is not an integer"))
            .collect()
    }

    /// Values of an F64 tensor.
    pub fn f64(&self, name: &str) -> Result<Vec<f64>> {
        let entry = self.entry(name)?;
        if entry["dtype"] != "F64" {
            bail!("tensor {name:?} has dtype {}, expected F64", entry["dtype"]);
        }
        let raw = self.payload(entry)?;
        Ok(raw
            .chunks_exact(8)
            .map(|b| {
                let mut a = [0u8; 8];
                a.copy_from_slice(b);
                f64::from_le_bytes(a)
            })
            .collect())
    }

    pub fn arr2(&self, name: &str) -> Result<Array2<f64>> {
        let shape = self.shape(name)?;
        if shape.len() != 2 {
            bail!("tensor {name:?} has shape {shape:?}, expected 2-D");
        }
        Ok(Array2::from_shape_vec((shape[0], shape[1]), self.f64(name)?)?)
    }

    fn entry(&self, name: &str) -> Result<&serde_json::Value> {
        self.header.get(name).with_context(|| format!("missing tensor {name:?}"))
    }

    fn payload(&self, entry: &serde_json::Value) -> Result<&[u8]> {
        let off = |i: usize| -> Result<usize> {
            entry["data_offsets"][i]
                .as_u64()
                .map(|v| v as usize)
                .context("bad data_offsets")
        };
        let (s, e) = (self.data_start + off(0)?, self.data_start + off(1)?);
        self.bytes.get(s..e).context("tensor data runs past end of file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.safetensors");

        let arr = Array2::from_shape_fn((2, 3), |(i, j)| i as f64 * 10.0 + j as f64);
        let mut w = StWriter::new();
        w.add_arr2("cleaned", &arr);
        w.add_i64("exclude", &[0, 1], &[2]);
        w.add_metadata("sfreq", "150.0");
        w.write(&path).unwrap();

        let r = StReader::open(&path).unwrap();
        assert_eq!(r.arr2("cleaned").unwrap(), arr);
        assert_eq!(r.shape("exclude").unwrap(), vec![2]);
        assert_eq!(r.metadata("sfreq"), Some("150.0"));
        assert!(r.f64("exclude").is_err());
        assert!(!r.names().contains(&"__metadata__"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = StWriter::new();
        w.add_f64("x", &[1.0], &[1]);
        w.add_f64("x", &[2.0], &[1]);
        assert!(w.write(&dir.path().join("d.safetensors")).is_err());
    }
}
