//! CSV format dataset implementation
//!
//! Supports loading datasets from CSV files where:
//! - The last column is the label
//! - All other columns are features, column `c` becoming index `c + 1`
//! - First row can be headers (automatically detected)
//!
//! Zero-valued features are not stored.

use crate::core::{Dataset, Problem, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for CSV format files
#[derive(Debug, Clone)]
pub struct CSVDataset {
    problem: Problem,
}

impl CSVDataset {
    /// Load a dataset from a CSV file
    ///
    /// The last column is assumed to be the label.
    /// Headers are automatically detected if present.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a dataset from a reader, detecting a header row
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, true)
    }

    /// Load a dataset from a reader with explicit header option
    pub fn from_reader_with_options<R: BufRead>(
        reader: R,
        auto_detect_header: bool,
    ) -> Result<Self> {
        let mut problem = Problem::new();
        let mut first_data_line = true;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if first_data_line {
                first_data_line = false;
                if auto_detect_header && Self::is_header_line(line) {
                    continue;
                }
            }

            let sample = Self::parse_data_line(line).map_err(|e| {
                SVMError::ParseError(format!("line {}: {}", line_num + 1, e))
            })?;
            problem.push(sample);
        }

        if problem.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        Ok(Self { problem })
    }

    /// Check if a line appears to be a header
    fn is_header_line(line: &str) -> bool {
        let fields: Vec<&str> = line.split(',').collect();

        if fields.len() < 2 {
            return false;
        }

        // Most feature columns non-numeric
        let non_numeric_count = fields
            .iter()
            .take(fields.len() - 1)
            .filter(|field| field.trim().parse::<f64>().is_err())
            .count();

        non_numeric_count > fields.len() / 2
    }

    /// Parse a CSV data line into a Sample
    fn parse_data_line(line: &str) -> std::result::Result<Sample, String> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        if fields.len() < 2 {
            return Err(format!("too few fields: {line}"));
        }

        let (label_str, feature_fields) = fields
            .split_last()
            .ok_or_else(|| format!("too few fields: {line}"))?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| format!("invalid label: {label_str}"))?;

        let mut indices = Vec::new();
        let mut values = Vec::new();
        for (column, field) in feature_fields.iter().enumerate() {
            let value = field
                .parse::<f64>()
                .map_err(|_| format!("invalid feature value at column {}: {}", column + 1, field))?;
            if value != 0.0 {
                indices.push(column + 1);
                values.push(value);
            }
        }

        Ok(Sample::new(SparseVector::new(indices, values), label))
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn into_problem(self) -> Problem {
        self.problem
    }
}

impl Dataset for CSVDataset {
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
    fn test_csv_basic() {
        let data = "1.0,2.0,1\n3.0,4.0,-1\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 2);

        let sample1 = dataset.get_sample(0);
        assert_eq!(sample1.label, 1.0);
        assert_eq!(sample1.features.indices, vec![1, 2]);
        assert_eq!(sample1.features.values, vec![1.0, 2.0]);

        let sample2 = dataset.get_sample(1);
        assert_eq!(sample2.label, -1.0);
        assert_eq!(sample2.features.values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_csv_with_headers() {
        let data = "feature1,feature2,label\n1.0,2.0,1\n3.0,4.0,-1\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get_labels(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_csv_header_after_comment() {
        let data = "# exported\nx,y,label\n1.0,2.0,3\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(dataset.get_labels(), vec![3.0]);
    }

    #[test]
    fn test_csv_sparse_features() {
        let data = "1.0,0.0,2.0,1\n0.0,3.0,0.0,-1\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        let sample1 = dataset.get_sample(0);
        assert_eq!(sample1.features.indices, vec![1, 3]);
        assert_eq!(sample1.features.values, vec![1.0, 2.0]);

        let sample2 = dataset.get_sample(1);
        assert_eq!(sample2.features.indices, vec![2]);
        assert_eq!(sample2.features.values, vec![3.0]);
    }

    #[test]
    fn test_csv_all_zeros() {
        let dataset = CSVDataset::from_reader(Cursor::new("0.0,0.0,1\n")).unwrap();

        let sample = dataset.get_sample(0);
        assert_eq!(sample.label, 1.0);
        assert!(sample.features.is_empty());
    }

    #[test]
    fn test_csv_keeps_label_values() {
        let data = "1.0,2.0,0.5\n3.0,4.0,-0.5\n5.0,6.0,7\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.get_labels(), vec![0.5, -0.5, 7.0]);
    }

    #[test]
    fn test_csv_invalid_format() {
        let result = CSVDataset::from_reader(Cursor::new("1.0\n"));
        assert!(matches!(result, Err(SVMError::ParseError(_))));

        let result = CSVDataset::from_reader(Cursor::new("1.0,2.0,1\n1.0,abc,-1\n"));
        match result {
            Err(SVMError::ParseError(msg)) => assert!(msg.starts_with("line 2:"), "{msg}"),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_csv_manual_header_control() {
        let data = "1.0,2.0,1\n3.0,4.0,-1\n";
        let dataset = CSVDataset::from_reader_with_options(Cursor::new(data), false).unwrap();
        assert_eq!(dataset.len(), 2);

        let result = CSVDataset::from_reader_with_options(Cursor::new("a,b,label\n"), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_is_header_line() {
        assert!(CSVDataset::is_header_line("feature1,feature2,label"));
        assert!(CSVDataset::is_header_line("x1,x2,x3,y"));
        assert!(!CSVDataset::is_header_line("1.0,2.0,3.0,1"));
        assert!(!CSVDataset::is_header_line("1"));
    }

    #[test]
    fn test_csv_empty_dataset() {
        let result = CSVDataset::from_reader(Cursor::new("a,b,label\n"));
        assert!(matches!(result, Err(SVMError::EmptyDataset)));
    }
}
