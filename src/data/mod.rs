//! Data loading and dataset implementations
//!
//! Both loaders produce a [`Problem`]; [`load_problem`] picks the format
//! from the file extension unless one is given explicitly.

pub mod csv;
pub mod libsvm;

pub use self::csv::*;
pub use self::libsvm::*;

use crate::core::{Problem, Result, SVMError};
use log::debug;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported dataset file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Sparse `label index:value ...` lines
    LibSvm,
    /// Dense comma-separated rows with the label last
    Csv,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::LibSvm => f.write_str("libsvm"),
            DataFormat::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "libsvm" | "svm" => Ok(DataFormat::LibSvm),
            "csv" => Ok(DataFormat::Csv),
            _ => Err(SVMError::InvalidParameter(format!(
                "unsupported format: {s}. Use 'libsvm' or 'csv'"
            ))),
        }
    }
}

/// Guess the format of a data file from its extension.
///
/// Anything but `.csv` is read as libsvm text.
pub fn detect_format(path: &Path) -> DataFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => DataFormat::Csv,
        Some("libsvm") | Some("svm") => DataFormat::LibSvm,
        _ => {
            debug!("no known extension on {:?}, assuming libsvm format", path);
            DataFormat::LibSvm
        }
    }
}

/// Load a problem, detecting the format from the extension
pub fn load_problem<P: AsRef<Path>>(path: P) -> Result<Problem> {
    let path = path.as_ref();
    load_problem_as(path, detect_format(path))
}

/// Load a problem in the given format
pub fn load_problem_as<P: AsRef<Path>>(path: P, format: DataFormat) -> Result<Problem> {
    match format {
        DataFormat::LibSvm => Ok(LibSVMDataset::from_file(path)?.into_problem()),
        DataFormat::Csv => Ok(CSVDataset::from_file(path)?.into_problem()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::Builder;

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(&PathBuf::from("test.csv")), DataFormat::Csv);
        assert_eq!(detect_format(&PathBuf::from("TEST.CSV")), DataFormat::Csv);
        assert_eq!(detect_format(&PathBuf::from("test.libsvm")), DataFormat::LibSvm);
        assert_eq!(detect_format(&PathBuf::from("test.svm")), DataFormat::LibSvm);
        assert_eq!(detect_format(&PathBuf::from("heart_scale")), DataFormat::LibSvm);
    }

    #[test]
    fn test_format_names() {
        assert_eq!("csv".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        assert_eq!("libsvm".parse::<DataFormat>().unwrap(), DataFormat::LibSvm);
        assert!("arff".parse::<DataFormat>().is_err());
        assert_eq!(DataFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_load_problem_by_extension() {
        let mut csv_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(csv_file, "x,y,label\n1.5,0,2\n0,2.5,4").unwrap();
        csv_file.flush().unwrap();

        let problem = load_problem(csv_file.path()).unwrap();
        assert_eq!(problem.labels(), vec![2.0, 4.0]);
        assert_eq!(problem.samples()[1].features.indices, vec![2]);

        let mut svm_file = Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(svm_file, "2 1:1.5\n4 2:2.5").unwrap();
        svm_file.flush().unwrap();

        let from_text = load_problem(svm_file.path()).unwrap();
        assert_eq!(from_text, problem);
    }
}
