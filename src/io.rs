//! Reading and writing tables on disk, plus file-backed job loader and sink.

use crate::jobs::{InputLoader, Job, OutputSink};
use anyhow::{Context as _, Result, bail};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File formats understood by [`load_table`] and [`save_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
    Json,
}

impl std::str::FromStr for TableFormat {
    type Err = anyhow::Error;

    fn from_str(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            other => bail!("Unsupported file extension: {other}"),
        }
    }
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        ext.parse()
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
        }
    }
}

pub fn load_table(path: &Path) -> Result<DataFrame> {
    let df = match TableFormat::from_path(path)? {
        TableFormat::Csv => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_has_header(true)
            .finish()?
            .collect()
            .context("Failed to read CSV")?,
        TableFormat::Parquet => ParquetReader::new(File::open(path)?)
            .finish()
            .context("Failed to read Parquet")?,
        TableFormat::Json => JsonReader::new(File::open(path)?)
            .finish()
            .context("Failed to read JSON")?,
    };
    tracing::debug!("Loaded {} ({} rows, {} columns)", path.display(), df.height(), df.width());
    Ok(df)
}

/// Write `df`, creating parent directories as needed. The format follows the extension.
pub fn save_table(df: &DataFrame, path: &Path) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut df = df.clone();
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    match format {
        TableFormat::Csv => {
            CsvWriter::new(file)
                .include_header(true)
                .finish(&mut df)
                .context("Failed to write CSV file")?;
        }
        TableFormat::Parquet => {
            ParquetWriter::new(file)
                .finish(&mut df)
                .context("Failed to write Parquet file")?;
        }
        TableFormat::Json => {
            JsonWriter::new(file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)
                .context("Failed to write JSON file")?;
        }
    }
    Ok(())
}

/// Treats a job's `input_ref` as a file path, relative to `base_dir` when set
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base_dir: Option<PathBuf>,
}

impl FileLoader {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    fn resolve(&self, input_ref: &str) -> PathBuf {
        let path = PathBuf::from(input_ref);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

impl InputLoader for FileLoader {
    fn load(&self, input_ref: &str) -> Result<DataFrame> {
        load_table(&self.resolve(input_ref))
    }
}

/// Writes each finished job to `<dir>/<input stem>_cleaned_<id prefix>.<ext>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    format: TableFormat,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, format: TableFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn output_path(&self, job: &Job) -> PathBuf {
        let stem = Path::new(&job.input_ref)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("output");
        let short_id: String = job.id.chars().take(8).collect();
        self.dir
            .join(format!("{stem}_cleaned_{short_id}.{}", self.format.extension()))
    }
}

impl OutputSink for DirectorySink {
    fn store(&self, job: &Job, frame: &DataFrame) -> Result<()> {
        let path = self.output_path(job);
        save_table(frame, &path)?;
        tracing::info!("Job {} output written to {}", job.id, path.display());
        Ok(())
    }
}
