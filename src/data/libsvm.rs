//! LibSVM format dataset implementation
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Indices are kept as written. They must be strictly increasing within a
//! line; index 0 only appears as the serial number of precomputed-kernel
//! data. Explicit zero values are kept too, since a precomputed row may
//! legitimately contain them.

use crate::core::{Dataset, Problem, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for LibSVM format files
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    problem: Problem,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a dataset from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut problem = Problem::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let sample = Self::parse_line(line).map_err(|e| {
                SVMError::ParseError(format!("line {}: {}", line_num + 1, e))
            })?;
            problem.push(sample);
        }

        if problem.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        Ok(Self { problem })
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> std::result::Result<Sample, String> {
        let mut parts = line.split_whitespace();

        let label_str = parts.next().ok_or_else(|| "empty line".to_string())?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| format!("invalid label: {label_str}"))?;

        let mut pairs: Vec<(usize, f64)> = Vec::new();
        for feature_str in parts {
            let (index_str, value_str) = feature_str
                .split_once(':')
                .ok_or_else(|| format!("invalid feature format: {feature_str}"))?;

            let index = index_str
                .parse::<usize>()
                .map_err(|_| format!("invalid feature index: {index_str}"))?;
            let value = value_str
                .parse::<f64>()
                .map_err(|_| format!("invalid feature value: {value_str}"))?;

            if let Some(&(last, _)) = pairs.last() {
                if index <= last {
                    return Err(format!(
                        "feature indices must be ascending, found {index} after {last}"
                    ));
                }
            }
            pairs.push((index, value));
        }

        let features = SparseVector::from_pairs(&pairs).map_err(|e| e.to_string())?;
        Ok(Sample::new(features, label))
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn into_problem(self) -> Problem {
        self.problem
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.problem.len()
    }

    fn dim(&self) -> usize {
        self.problem.max_index()
    }

    fn get_sample(&self, i: usize) -> &Sample {
        &self.problem.samples()[i]
    }

    fn get_labels(&self) -> Vec<f64> {
        self.problem.labels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line_basic() {
        let sample = LibSVMDataset::parse_line("+1 1:0.5 3:1.2").unwrap();

        assert_eq!(sample.label, 1.0);
        assert_eq!(sample.features.indices, vec![1, 3]);
        assert_eq!(sample.features.values, vec![0.5, 1.2]);
    }

    #[test]
    fn test_parse_line_keeps_labels_and_zeros() {
        let sample = LibSVMDataset::parse_line("3 1:0 4:2.5").unwrap();
        assert_eq!(sample.label, 3.0);
        assert_eq!(sample.features.indices, vec![1, 4]);
        assert_eq!(sample.features.values, vec![0.0, 2.5]);

        let sample = LibSVMDataset::parse_line("-0.75").unwrap();
        assert_eq!(sample.label, -0.75);
        assert!(sample.features.is_empty());
    }

    #[test]
    fn test_parse_line_precomputed_serial() {
        let sample = LibSVMDataset::parse_line("1 0:2 1:4.0 2:1.5").unwrap();
        assert_eq!(sample.features.indices, vec![0, 1, 2]);
        assert_eq!(sample.features.values[0], 2.0);
    }

    #[test]
    fn test_parse_line_invalid_format() {
        assert!(LibSVMDataset::parse_line("+1 1").is_err());
        assert!(LibSVMDataset::parse_line("+1 abc:1.0").is_err());
        assert!(LibSVMDataset::parse_line("+1 1:abc").is_err());
        assert!(LibSVMDataset::parse_line("x 1:1.0").is_err());
        assert!(LibSVMDataset::parse_line("+1 3:1.0 2:1.0").is_err());
        assert!(LibSVMDataset::parse_line("+1 2:1.0 2:1.0").is_err());
    }

    #[test]
    fn test_from_reader_basic() {
        let data = "+1 1:0.5 3:1.2\n-1 2:0.3 5:2.1\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5);

        let sample1 = dataset.get_sample(0);
        assert_eq!(sample1.label, 1.0);
        assert_eq!(sample1.features.indices, vec![1, 3]);

        let sample2 = dataset.get_sample(1);
        assert_eq!(sample2.label, -1.0);
        assert_eq!(sample2.features.indices, vec![2, 5]);
    }

    #[test]
    fn test_from_reader_empty_lines_and_comments() {
        let data = "# Comment line\n+1 1:0.5\n\n# Another comment\n-1 2:0.3\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get_labels(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_from_reader_reports_line_number() {
        let data = "+1 1:0.5\n\n-1 4:1.0 2:0.3\n";
        match LibSVMDataset::from_reader(Cursor::new(data)) {
            Err(SVMError::ParseError(msg)) => assert!(msg.starts_with("line 3:"), "{msg}"),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_reader_empty_dataset() {
        let result = LibSVMDataset::from_reader(Cursor::new("# Only comments\n\n"));
        assert!(matches!(result, Err(SVMError::EmptyDataset)));
    }

    #[test]
    fn test_large_dimension_handling() {
        let data = "+1 1:1.0 1000:2.0 5000:3.0\n-1 2:1.0 500:2.0\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.dim(), 5000);
        let sample = dataset.get_sample(0);
        assert_eq!(sample.features.indices, vec![1, 1000, 5000]);
        assert_eq!(sample.features.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "+1 1:0.5 3:1.2").expect("Failed to write");
        writeln!(temp_file, "-1 2:0.3 5:2.1").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let problem = LibSVMDataset::from_file(temp_file.path())
            .unwrap()
            .into_problem();
        assert_eq!(problem.len(), 2);
        assert_eq!(problem.max_index(), 5);
        assert_eq!(problem.labels(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_from_file_io_error() {
        let result = LibSVMDataset::from_file("/non/existent/file.libsvm");
        assert!(matches!(result, Err(SVMError::IoError(_))));
    }
}
