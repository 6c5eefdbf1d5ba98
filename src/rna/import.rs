// projeto: lstmseq2seq
// file: src/rna/import.rs
// Readers for the raw dataset formats: POD coefficient text matrices,
// bincode POD snapshots and semicolon separated measurement tables



use std::fs;
use std::path::Path;

use clap::ValueEnum;
use csv::ReaderBuilder;
use log::{debug, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::rna::utils::{parse_decimal, ForecastError};

/// A file format that yields a `(timesteps, channels)` series.
pub trait SeriesSource {
    fn load(&self, path: &Path, channels: &[usize], max_timesteps: usize) -> Result<Array2<f32>, ForecastError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetFormat {
    PodText,
    PodBinary,
    Csv,
    Synthetic,
}

impl DatasetFormat {
    /// Reader for file based formats; `None` for generated data.
    pub fn source(&self) -> Option<Box<dyn SeriesSource>> {
        match self {
            DatasetFormat::PodText => Some(Box::new(PodText::default())),
            DatasetFormat::PodBinary => Some(Box::new(PodBinary)),
            DatasetFormat::Csv => Some(Box::new(SemicolonCsv::default())),
            DatasetFormat::Synthetic => None,
        }
    }
}

/// Whitespace separated numbers reshaped to `(modes, snapshots, components)`.
#[derive(Debug, Clone)]
pub struct PodText {
    pub shape: [usize; 3],
    pub component: usize,
}

impl Default for PodText {
    fn default() -> Self {
        Self {
            shape: [305, 305, 3],
            component: 2,
        }
    }
}

impl SeriesSource for PodText {
    fn load(&self, path: &Path, channels: &[usize], max_timesteps: usize) -> Result<Array2<f32>, ForecastError> {
        let content = fs::read_to_string(path).map_err(|e| ForecastError::import(path, e.to_string()))?;

        let mut values = Vec::with_capacity(self.shape.iter().product());
        for (i, token) in content.split_whitespace().enumerate() {
            let value = token
                .parse::<f32>()
                .map_err(|_| ForecastError::import(path, format!("token {} is not a number: '{}'", i, token)))?;
            values.push(value);
        }

        let [modes, snapshots, components] = self.shape;
        let expected = modes * snapshots * components;
        if values.len() != expected {
            return Err(ForecastError::import(
                path,
                format!("expected {} values for shape {:?}, found {}", expected, self.shape, values.len()),
            ));
        }
        if self.component >= components {
            return Err(ForecastError::import(
                path,
                format!("component {} out of range ({} components)", self.component, components),
            ));
        }
        check_channels(path, channels, modes)?;

        let timesteps = max_timesteps.min(snapshots);
        let series = Array2::from_shape_fn((timesteps, channels.len()), |(t, c)| {
            values[(channels[c] * snapshots + t) * components + self.component]
        });

        info!("📥 Loaded {} modes x {} snapshots from {}", channels.len(), timesteps, path.display());
        Ok(series)
    }
}

/// Eigenvalues and temporal coefficients of a POD decomposition, coefficients indexed `[time][mode]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodCoefficients {
    pub eigenvalues: Vec<f64>,
    pub coefficients: Vec<Vec<f64>>,
}

impl PodCoefficients {
    pub fn read(path: &Path) -> Result<Self, ForecastError> {
        let bytes = fs::read(path).map_err(|e| ForecastError::import(path, e.to_string()))?;
        let (pod, _): (PodCoefficients, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| ForecastError::import(path, format!("invalid POD snapshot: {}", e)))?;
        Ok(pod)
    }

    pub fn save(&self, path: &Path) -> Result<(), ForecastError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ForecastError::Serialization(e.to_string()))?;
        fs::write(path, bytes)?;
        debug!("💾 Wrote {} POD coefficient rows to {}", self.coefficients.len(), path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PodBinary;

impl SeriesSource for PodBinary {
    fn load(&self, path: &Path, channels: &[usize], max_timesteps: usize) -> Result<Array2<f32>, ForecastError> {
        let pod = PodCoefficients::read(path)?;
        let modes = pod.coefficients.first().map(Vec::len).unwrap_or(0);
        if let Some(row) = pod.coefficients.iter().position(|r| r.len() != modes) {
            return Err(ForecastError::import(path, format!("row {} has a different number of modes", row)));
        }
        check_channels(path, channels, modes)?;

        let timesteps = max_timesteps.min(pod.coefficients.len());
        let series = Array2::from_shape_fn((timesteps, channels.len()), |(t, c)| {
            pod.coefficients[t][channels[c]] as f32
        });

        info!("📥 Loaded {} modes x {} snapshots ({} eigenvalues) from {}",
            channels.len(), timesteps, pod.eigenvalues.len(), path.display());
        Ok(series)
    }
}

/// `;` separated table with a header row and decimal-comma numbers, such as
/// the UCI air quality file. Leading date/time columns are skipped.
#[derive(Debug, Clone)]
pub struct SemicolonCsv {
    pub skip_columns: usize,
    /// Sentinel marking a missing measurement.
    pub missing: Option<f32>,
}

impl Default for SemicolonCsv {
    fn default() -> Self {
        Self {
            skip_columns: 2,
            missing: Some(-200.0),
        }
    }
}

impl SemicolonCsv {
    fn is_missing(&self, value: Option<f32>) -> bool {
        match (value, self.missing) {
            (None, _) => true,
            (Some(v), Some(sentinel)) => v == sentinel,
            (Some(_), None) => false,
        }
    }
}

impl SeriesSource for SemicolonCsv {
    fn load(&self, path: &Path, channels: &[usize], max_timesteps: usize) -> Result<Array2<f32>, ForecastError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ForecastError::import(path, e.to_string()))?;

        let mut rows: Vec<Vec<Option<f32>>> = Vec::new();
        let mut numeric_columns = usize::MAX;
        for (line, result) in rdr.records().enumerate() {
            if rows.len() >= max_timesteps {
                break;
            }
            let record = result.map_err(|e| ForecastError::import(path, e.to_string()))?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let fields: Vec<&str> = record.iter().skip(self.skip_columns).collect();
            numeric_columns = numeric_columns.min(fields.len());
            let mut row = Vec::with_capacity(channels.len());
            for &c in channels {
                let raw = fields.get(c).copied().unwrap_or("");
                let value = parse_decimal(raw);
                if value.is_none() && !raw.trim().is_empty() {
                    return Err(ForecastError::import(
                        path,
                        format!("record {} column {}: '{}' is not a number", line + 1, c + self.skip_columns, raw),
                    ));
                }
                row.push(if self.is_missing(value) { None } else { value });
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(ForecastError::import(path, "no data rows"));
        }
        check_channels(path, channels, numeric_columns)?;

        let mut series = Array2::<f32>::zeros((rows.len(), channels.len()));
        let mut filled = 0usize;
        for c in 0..channels.len() {
            let first_valid = rows
                .iter()
                .find_map(|row| row[c])
                .ok_or_else(|| ForecastError::import(path, format!("column {} has no valid values", channels[c])))?;
            let mut last = first_valid;
            for (t, row) in rows.iter().enumerate() {
                match row[c] {
                    Some(v) => last = v,
                    None => filled += 1,
                }
                series[[t, c]] = last;
            }
        }
        if filled > 0 {
            warn!("⚠️ Filled {} missing values in {} with the previous measurement", filled, path.display());
        }

        info!("📥 Loaded {} rows x {} columns from {}", rows.len(), channels.len(), path.display());
        Ok(series)
    }
}

fn check_channels(path: &Path, channels: &[usize], available: usize) -> Result<(), ForecastError> {
    if channels.is_empty() {
        return Err(ForecastError::import(path, "no channels selected"));
    }
    if let Some(&c) = channels.iter().find(|&&c| c >= available) {
        return Err(ForecastError::import(
            path,
            format!("channel {} out of range ({} available)", c, available),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_pod_text_selects_modes_and_component() {
        // value encodes (mode, snapshot, component) as m*100 + s*10 + k
        let source = PodText { shape: [4, 5, 3], component: 2 };
        let mut content = String::new();
        for m in 0..4 {
            for s in 0..5 {
                let row: Vec<String> = (0..3).map(|k| format!("{}", m * 100 + s * 10 + k)).collect();
                content.push_str(&row.join(" "));
                content.push('\n');
            }
        }
        let file = write_temp(&content);

        let series = source.load(file.path(), &[1, 3], 4).unwrap();
        assert_eq!(series.dim(), (4, 2));
        assert_eq!(series[[0, 0]], 102.0);
        assert_eq!(series[[3, 0]], 132.0);
        assert_eq!(series[[2, 1]], 322.0);
    }

    #[test]
    fn test_pod_text_wrong_size_names_file() {
        let file = write_temp("1 2 3\n4 5 6\n");
        let err = PodText::default().load(file.path(), &[0], 10).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ForecastError::Import { .. }));
        assert!(msg.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_pod_text_bad_mode() {
        let file = write_temp(&"0 ".repeat(2 * 2 * 3));
        let source = PodText { shape: [2, 2, 3], component: 0 };
        assert!(matches!(source.load(file.path(), &[2], 2), Err(ForecastError::Import { .. })));
    }

    #[test]
    fn test_pod_binary_round_trip() {
        let pod = PodCoefficients {
            eigenvalues: vec![3.0, 2.0, 1.0],
            coefficients: (0..6).map(|t| vec![t as f64, 10.0 + t as f64, 20.0 + t as f64]).collect(),
        };
        let file = NamedTempFile::new().unwrap();
        pod.save(file.path()).unwrap();

        assert_eq!(PodCoefficients::read(file.path()).unwrap(), pod);
        let series = PodBinary.load(file.path(), &[2, 0], 4).unwrap();
        assert_eq!(series.dim(), (4, 2));
        assert_eq!(series[[3, 0]], 23.0);
        assert_eq!(series[[3, 1]], 3.0);
    }

    #[test]
    fn test_pod_binary_garbage() {
        let file = write_temp("definitely not bincode");
        match PodBinary.load(file.path(), &[0], 10) {
            Err(ForecastError::Import { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected import error, got {:?}", other),
        }
    }

    #[test]
    fn test_semicolon_csv_decimal_comma_and_missing() {
        let content = "Date;Time;CO(GT);PT08.S1(CO);T;;\n\
                       10/03/2004;18.00.00;2,6;1360;13,6;;\n\
                       10/03/2004;19.00.00;-200;1292;13,3;;\n\
                       ;;;;;;\n\
                       10/03/2004;20.00.00;2,2;1402;11,9;;\n";
        let file = write_temp(content);

        let series = SemicolonCsv::default().load(file.path(), &[0, 2], 100).unwrap();
        assert_eq!(series.dim(), (3, 2));
        assert!((series[[0, 0]] - 2.6).abs() < 1e-6);
        assert!((series[[1, 0]] - 2.6).abs() < 1e-6); // -200 replaced by previous value
        assert!((series[[2, 0]] - 2.2).abs() < 1e-6);
        assert!((series[[2, 1]] - 11.9).abs() < 1e-5);

        let truncated = SemicolonCsv::default().load(file.path(), &[1], 2).unwrap();
        assert_eq!(truncated.dim(), (2, 1));
        assert_eq!(truncated[[1, 0]], 1292.0);
    }

    #[test]
    fn test_semicolon_csv_errors() {
        let file = write_temp("Date;Time;CO\n10/03/2004;18.00.00;abc\n");
        assert!(matches!(
            SemicolonCsv::default().load(file.path(), &[0], 10),
            Err(ForecastError::Import { .. })
        ));

        let missing = Path::new("/nonexistent/airquality.csv");
        let err = SemicolonCsv::default().load(missing, &[0], 10).unwrap_err();
        assert!(err.to_string().contains("airquality.csv"));
    }

    #[test]
    fn test_dataset_format_sources() {
        assert!(DatasetFormat::Synthetic.source().is_none());
        assert!(DatasetFormat::PodText.source().is_some());
        assert!(DatasetFormat::Csv.source().is_some());
    }
}
