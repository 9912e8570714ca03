//! Model persistence in the libsvm text format
//!
//! A model file is a header of `keyword value...` lines followed by `SV`
//! and one line per support vector:
//!
//! ```text
//! svm_type c_svc
//! kernel_type rbf
//! gamma 0.5
//! nr_class 2
//! total_sv 3
//! rho 0.123
//! label 1 -1
//! nr_sv 2 1
//! SV
//! 1 1:0.5 3:1
//! 0.25 2:-1
//! -1 1:1 2:0.5
//! ```
//!
//! Real numbers follow C `printf` `%g` rules: 17 significant digits for
//! coefficients and parameters, 8 for feature values. Every support vector
//! line ends with a space.

use crate::core::{KernelType, Parameter, Result, SVMError, SparseVector, SvmType};
use crate::model::Model;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Save a model to a file
pub fn save_model<P: AsRef<Path>>(path: P, model: &Model) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_model(&mut writer, model)?;
    writer.flush()?;
    Ok(())
}

/// Load a model from a file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    let file = File::open(path)?;
    read_model(BufReader::new(file))
}

impl Model {
    /// Save the model in the libsvm text format
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_model(path, self)
    }

    /// Load a model written by [`Model::save_to_file`]
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_model(path)
    }
}

/// Write a model in the libsvm text format
pub fn write_model<W: Write>(writer: &mut W, model: &Model) -> Result<()> {
    let param = &model.param;

    writeln!(writer, "svm_type {}", param.svm_type)?;
    writeln!(writer, "kernel_type {}", param.kernel_type)?;

    if param.kernel_type == KernelType::Polynomial {
        writeln!(writer, "degree {}", param.degree)?;
    }
    if param.kernel_type.uses_gamma() {
        writeln!(writer, "gamma {}", format_g(param.gamma, 17))?;
    }
    if param.kernel_type.uses_coef0() {
        writeln!(writer, "coef0 {}", format_g(param.coef0, 17))?;
    }

    writeln!(writer, "nr_class {}", model.nr_class)?;
    writeln!(writer, "total_sv {}", model.sv.len())?;

    write_list(writer, "rho", model.rho.iter().map(|&v| format_g(v, 17)))?;
    if let Some(labels) = &model.label {
        write_list(writer, "label", labels.iter().map(i32::to_string))?;
    }
    if let Some(prob_a) = &model.prob_a {
        write_list(writer, "probA", prob_a.iter().map(|&v| format_g(v, 17)))?;
    }
    if let Some(prob_b) = &model.prob_b {
        write_list(writer, "probB", prob_b.iter().map(|&v| format_g(v, 17)))?;
    }
    if let Some(n_sv) = &model.n_sv {
        write_list(writer, "nr_sv", n_sv.iter().map(usize::to_string))?;
    }

    writeln!(writer, "SV")?;
    for (i, sv) in model.sv.iter().enumerate() {
        for row in &model.sv_coef {
            write!(writer, "{} ", format_g(row[i], 17))?;
        }
        if param.kernel_type == KernelType::Precomputed {
            let serial = sv.values.first().copied().unwrap_or(0.0);
            write!(writer, "0:{} ", serial as i64)?;
        } else {
            for (index, value) in sv.iter() {
                write!(writer, "{}:{} ", index, format_g(value, 8))?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn write_list<W: Write>(
    writer: &mut W,
    keyword: &str,
    values: impl Iterator<Item = String>,
) -> Result<()> {
    write!(writer, "{keyword}")?;
    for value in values {
        write!(writer, " {value}")?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Read a model in the libsvm text format
pub fn read_model<R: BufRead>(reader: R) -> Result<Model> {
    let mut lines = reader.lines();
    let mut header = Header::default();

    loop {
        let line = match lines.next() {
            Some(line) => line?,
            None => return Err(format_error("missing SV section")),
        };
        let mut tokens = line.split_whitespace();
        let keyword = match tokens.next() {
            Some(keyword) => keyword,
            None => continue,
        };
        if keyword == "SV" {
            break;
        }
        let values: Vec<&str> = tokens.collect();
        header.set(keyword, &values)?;
    }

    let header = header.finish()?;
    let rows = header.nr_class - 1;
    let mut sv = Vec::with_capacity(header.total_sv);
    let mut sv_coef = vec![Vec::with_capacity(header.total_sv); rows];

    for i in 0..header.total_sv {
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(format_error(&format!(
                    "expected {} support vectors, found {}",
                    header.total_sv, i
                )))
            }
        };
        let mut tokens = line.split_whitespace();

        for row in sv_coef.iter_mut() {
            let token = tokens
                .next()
                .ok_or_else(|| format_error(&format!("support vector {} lacks coefficients", i + 1)))?;
            row.push(parse_number::<f64>(token, "coefficient")?);
        }

        let mut pairs = Vec::new();
        for token in tokens {
            let (index, value) = token
                .split_once(':')
                .ok_or_else(|| format_error(&format!("invalid feature: {token}")))?;
            pairs.push((
                parse_number::<usize>(index, "feature index")?,
                parse_number::<f64>(value, "feature value")?,
            ));
        }
        let vector = SparseVector::from_pairs(&pairs)
            .map_err(|e| format_error(&format!("support vector {}: {}", i + 1, e)))?;
        sv.push(vector);
    }

    let param = Parameter {
        svm_type: header.svm_type,
        kernel_type: header.kernel_type,
        degree: header.degree,
        gamma: header.gamma,
        coef0: header.coef0,
        ..Parameter::default()
    };

    Ok(Model {
        param,
        nr_class: header.nr_class,
        sv,
        sv_coef,
        rho: header.rho,
        prob_a: header.prob_a,
        prob_b: header.prob_b,
        sv_indices: Vec::new(),
        label: header.label,
        n_sv: header.n_sv,
    })
}

fn format_error(msg: &str) -> SVMError {
    SVMError::ModelFormat(msg.to_string())
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse::<T>()
        .map_err(|_| format_error(&format!("invalid {what}: {token}")))
}

fn parse_list<T: std::str::FromStr>(values: &[&str], what: &str) -> Result<Vec<T>> {
    values.iter().map(|v| parse_number(v, what)).collect()
}

fn parse_single<T: std::str::FromStr>(keyword: &str, values: &[&str]) -> Result<T> {
    match values {
        [value] => parse_number(value, keyword),
        _ => Err(format_error(&format!("{keyword} takes exactly one value"))),
    }
}

#[derive(Default)]
struct Header {
    svm_type: Option<SvmType>,
    kernel_type: Option<KernelType>,
    degree: Option<i32>,
    gamma: Option<f64>,
    coef0: Option<f64>,
    nr_class: Option<usize>,
    total_sv: Option<usize>,
    rho: Option<Vec<f64>>,
    label: Option<Vec<i32>>,
    prob_a: Option<Vec<f64>>,
    prob_b: Option<Vec<f64>>,
    n_sv: Option<Vec<usize>>,
}

/// Header after validation
struct ModelHeader {
    svm_type: SvmType,
    kernel_type: KernelType,
    degree: i32,
    gamma: f64,
    coef0: f64,
    nr_class: usize,
    total_sv: usize,
    rho: Vec<f64>,
    label: Option<Vec<i32>>,
    prob_a: Option<Vec<f64>>,
    prob_b: Option<Vec<f64>>,
    n_sv: Option<Vec<usize>>,
}

impl Header {
    fn set(&mut self, keyword: &str, values: &[&str]) -> Result<()> {
        match keyword {
            "svm_type" => {
                let name: String = parse_single(keyword, values)?;
                let svm_type = name
                    .parse::<SvmType>()
                    .map_err(|_| format_error(&format!("unknown svm type: {name}")))?;
                self.svm_type = Some(svm_type);
            }
            "kernel_type" => {
                let name: String = parse_single(keyword, values)?;
                let kernel_type = name
                    .parse::<KernelType>()
                    .map_err(|_| format_error(&format!("unknown kernel type: {name}")))?;
                self.kernel_type = Some(kernel_type);
            }
            "degree" => self.degree = Some(parse_single(keyword, values)?),
            "gamma" => self.gamma = Some(parse_single(keyword, values)?),
            "coef0" => self.coef0 = Some(parse_single(keyword, values)?),
            "nr_class" => self.nr_class = Some(parse_single(keyword, values)?),
            "total_sv" => self.total_sv = Some(parse_single(keyword, values)?),
            "rho" => self.rho = Some(parse_list(values, keyword)?),
            "label" => self.label = Some(parse_list(values, keyword)?),
            "probA" => self.prob_a = Some(parse_list(values, keyword)?),
            "probB" => self.prob_b = Some(parse_list(values, keyword)?),
            "nr_sv" => self.n_sv = Some(parse_list(values, keyword)?),
            _ => return Err(format_error(&format!("unknown text in model file: {keyword}"))),
        }
        Ok(())
    }

    fn finish(self) -> Result<ModelHeader> {
        let missing = |what: &str| format_error(&format!("missing {what}"));

        let svm_type = self.svm_type.ok_or_else(|| missing("svm_type"))?;
        let kernel_type = self.kernel_type.ok_or_else(|| missing("kernel_type"))?;
        let nr_class = self.nr_class.ok_or_else(|| missing("nr_class"))?;
        let total_sv = self.total_sv.ok_or_else(|| missing("total_sv"))?;
        let rho = self.rho.ok_or_else(|| missing("rho"))?;

        // Classifiers trained on a single label carry one class and no pairs
        if nr_class == 0 {
            return Err(format_error("nr_class must be at least 1"));
        }
        if !svm_type.is_classification() && nr_class != 2 {
            return Err(format_error(&format!(
                "{svm_type} models must have nr_class 2, got {nr_class}"
            )));
        }
        let nr_pairs = nr_class * (nr_class - 1) / 2;
        if rho.len() != nr_pairs {
            return Err(format_error(&format!(
                "expected {} rho values, found {}",
                nr_pairs,
                rho.len()
            )));
        }

        if svm_type.is_classification() {
            let label = self.label.as_ref().ok_or_else(|| missing("label"))?;
            let n_sv = self.n_sv.as_ref().ok_or_else(|| missing("nr_sv"))?;
            if label.len() != nr_class || n_sv.len() != nr_class {
                return Err(format_error("label and nr_sv must list one entry per class"));
            }
            if n_sv.iter().sum::<usize>() != total_sv {
                return Err(format_error("nr_sv does not add up to total_sv"));
            }
        }

        let expected_prob = if svm_type.is_classification() { nr_pairs } else { 1 };
        for (name, values) in [("probA", &self.prob_a), ("probB", &self.prob_b)] {
            if let Some(values) = values {
                if values.len() != expected_prob {
                    return Err(format_error(&format!(
                        "expected {} {} values, found {}",
                        expected_prob,
                        name,
                        values.len()
                    )));
                }
            }
        }

        let defaults = Parameter::default();
        Ok(ModelHeader {
            svm_type,
            kernel_type,
            degree: self.degree.unwrap_or(defaults.degree),
            gamma: self.gamma.unwrap_or(defaults.gamma),
            coef0: self.coef0.unwrap_or(defaults.coef0),
            nr_class,
            total_sv,
            rho,
            label: self.label,
            prob_a: self.prob_a,
            prob_b: self.prob_b,
            n_sv: self.n_sv,
        })
    }
}

/// Format a number like C's `printf("%.{precision}g", value)`.
///
/// The shorter of fixed and scientific notation is chosen by the decimal
/// exponent, and trailing zeros are removed.
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_format_g_fixed_notation() {
        assert_eq!(format_g(0.0, 17), "0");
        assert_eq!(format_g(-0.0, 17), "-0");
        assert_eq!(format_g(1.0, 17), "1");
        assert_eq!(format_g(-2.5, 17), "-2.5");
        assert_eq!(format_g(0.1, 17), "0.10000000000000001");
        assert_eq!(format_g(0.5, 8), "0.5");
        assert_eq!(format_g(100000.0, 8), "100000");
        assert_eq!(format_g(0.0001, 8), "0.0001");
        assert_eq!(format_g(9.99999999999, 8), "10");
        assert_eq!(format_g(0.25, 17), "0.25");
    }

    #[test]
    fn test_format_g_scientific_notation() {
        assert_eq!(format_g(1e-5, 8), "1e-05");
        assert_eq!(format_g(123456789.0, 8), "1.2345679e+08");
        assert_eq!(format_g(1e20, 17), "1e+20");
        assert_eq!(format_g(-9.5367431640625e-7, 17), "-9.5367431640625e-07");
        assert_eq!(format_g(1e100, 8), "1e+100");
    }

    #[test]
    fn test_format_g_special_values() {
        assert_eq!(format_g(f64::INFINITY, 17), "inf");
        assert_eq!(format_g(f64::NEG_INFINITY, 17), "-inf");
        assert_eq!(format_g(f64::NAN, 17), "nan");
    }

    #[test]
    fn test_format_g_round_trips_at_17_digits() {
        for &v in &[1.0 / 3.0, std::f64::consts::PI, -7.25e-3, 6.02214076e23] {
            assert_eq!(format_g(v, 17).parse::<f64>().unwrap(), v);
        }
    }

    fn binary_model() -> Model {
        Model {
            param: Parameter {
                kernel_type: KernelType::Rbf,
                gamma: 0.5,
                ..Parameter::default()
            },
            nr_class: 2,
            sv: vec![
                SparseVector::new(vec![1, 3], vec![0.5, 1.0]),
                SparseVector::new(vec![2], vec![-1.0]),
            ],
            sv_coef: vec![vec![1.0, -1.0]],
            rho: vec![0.125],
            prob_a: None,
            prob_b: None,
            sv_indices: vec![1, 4],
            label: Some(vec![1, -1]),
            n_sv: Some(vec![1, 1]),
        }
    }

    fn to_text(model: &Model) -> String {
        let mut buffer = Vec::new();
        write_model(&mut buffer, model).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_write_model_layout() {
        let text = to_text(&binary_model());
        let expected = "svm_type c_svc\n\
                        kernel_type rbf\n\
                        gamma 0.5\n\
                        nr_class 2\n\
                        total_sv 2\n\
                        rho 0.125\n\
                        label 1 -1\n\
                        nr_sv 1 1\n\
                        SV\n\
                        1 1:0.5 3:1 \n\
                        -1 2:-1 \n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_read_back_written_model() {
        let model = binary_model();
        let text = to_text(&model);
        let loaded = read_model(Cursor::new(text.as_bytes())).unwrap();

        assert_eq!(loaded.svm_type(), SvmType::CSvc);
        assert_eq!(loaded.param().gamma, 0.5);
        assert_eq!(loaded.support_vectors(), model.support_vectors());
        assert_eq!(loaded.sv_coef(), model.sv_coef());
        assert_eq!(loaded.rho(), model.rho());
        assert_eq!(loaded.labels(), Some(&[1, -1][..]));
        assert!(loaded.sv_indices().is_empty());
        assert_eq!(to_text(&loaded), text);
    }

    #[test]
    fn test_precomputed_support_vectors_store_serial_only() {
        let model = Model {
            param: Parameter {
                kernel_type: KernelType::Precomputed,
                ..Parameter::default()
            },
            sv: vec![
                SparseVector::new(vec![0, 1, 2], vec![2.0, 4.0, 1.0]),
                SparseVector::new(vec![0, 1, 2], vec![1.0, 1.0, 3.0]),
            ],
            ..binary_model()
        };
        let text = to_text(&model);
        assert!(text.contains("\n1 0:2 \n-1 0:1 \n"), "{text}");
        assert!(!text.contains("gamma"));

        let loaded = read_model(Cursor::new(text.as_bytes())).unwrap();
        assert_eq!(loaded.support_vectors()[0], SparseVector::new(vec![0], vec![2.0]));
    }

    #[test]
    fn test_regression_header() {
        let model = Model {
            param: Parameter {
                svm_type: SvmType::EpsilonSvr,
                kernel_type: KernelType::Polynomial,
                degree: 2,
                gamma: 1.0,
                coef0: 0.5,
                ..Parameter::default()
            },
            nr_class: 2,
            sv: vec![SparseVector::new(vec![1], vec![2.0])],
            sv_coef: vec![vec![0.75]],
            rho: vec![-1.0],
            prob_a: Some(vec![0.3]),
            prob_b: None,
            sv_indices: vec![1],
            label: None,
            n_sv: None,
        };
        let text = to_text(&model);
        assert!(text.starts_with(
            "svm_type epsilon_svr\nkernel_type polynomial\ndegree 2\ngamma 1\ncoef0 0.5\n"
        ));
        assert!(text.contains("probA 0.29999999999999999\n"));
        assert!(!text.contains("label"));

        let loaded = read_model(Cursor::new(text.as_bytes())).unwrap();
        assert_eq!(loaded.svr_probability(), Some(0.3));
        assert_eq!(loaded.param().degree, 2);
        let x = SparseVector::new(vec![1], vec![1.0]);
        assert_eq!(loaded.predict(&x), model.predict(&x));
    }

    fn expect_format_error(text: &str) {
        match read_model(Cursor::new(text.as_bytes())) {
            Err(SVMError::ModelFormat(_)) => {}
            other => panic!("expected a model format error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_files() {
        // unknown keyword
        expect_format_error("svm_type c_svc\nkernel_type rbf\nweird 1\nSV\n");
        // unknown svm type
        expect_format_error("svm_type c-svc\nkernel_type rbf\nSV\n");
        // missing rho
        expect_format_error(
            "svm_type one_class\nkernel_type linear\nnr_class 2\ntotal_sv 0\nSV\n",
        );
        // no SV section
        expect_format_error("svm_type one_class\nkernel_type linear\n");
        // truncated support vectors
        expect_format_error(
            "svm_type one_class\nkernel_type linear\nnr_class 2\ntotal_sv 2\nrho 0\nSV\n1 1:1 \n",
        );
        // bad feature token
        expect_format_error(
            "svm_type one_class\nkernel_type linear\nnr_class 2\ntotal_sv 1\nrho 0\nSV\n1 1=1\n",
        );
        // no classes
        expect_format_error(
            "svm_type c_svc\nkernel_type linear\nnr_class 0\ntotal_sv 0\nrho\nSV\n",
        );
        // regression models always have two classes
        expect_format_error(
            "svm_type epsilon_svr\nkernel_type linear\nnr_class 1\ntotal_sv 0\nrho\nSV\n",
        );
        // counts disagree
        expect_format_error(
            "svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 1\nrho 0\n\
             label 1 -1\nnr_sv 1 1\nSV\n1 1:1 \n",
        );
    }

    #[test]
    fn test_save_and_load_file() {
        let model = binary_model();
        let file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        model.save_to_file(file.path()).unwrap();

        let loaded = Model::load_from_file(file.path()).unwrap();
        let x = SparseVector::new(vec![1, 2], vec![0.25, -0.5]);
        assert_eq!(loaded.predict_values(&x), model.predict_values(&x));
    }
}
