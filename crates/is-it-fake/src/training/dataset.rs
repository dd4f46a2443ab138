use std::{fs::File, io, path::Path};

use tracing::{debug, info, warn};

use crate::{category::Category, error::TrainingDataError};

/// Text column names tried, in order, when none is configured.
pub const TEXT_COLUMN_CANDIDATES: &[&str] = &["text_", "review_text", "text", "review"];

/// Default label column name.
pub const DEFAULT_LABEL_COLUMN: &str = "label";

/// One labelled review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    pub text: String,
    pub label: Category,
}

impl LabeledExample {
    pub fn new(text: impl Into<String>, label: Category) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// How to read the labelled CSV.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetOptions {
    /// Text column; auto-detected from [`TEXT_COLUMN_CANDIDATES`] when unset.
    pub text_column: Option<String>,
    pub label_column: String,
    pub delimiter: char,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            text_column: None,
            label_column: DEFAULT_LABEL_COLUMN.to_owned(),
            delimiter: ',',
        }
    }
}

/// Examples read from a dataset plus how many rows were dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub examples: Vec<LabeledExample>,
    pub rows_read: usize,
    /// Rows with an empty text or label.
    pub rows_dropped: usize,
}

impl Dataset {
    /// Number of examples per category, indexed by [`Category::index`].
    #[must_use]
    pub fn class_counts(&self) -> [usize; 2] {
        class_counts(&self.examples)
    }
}

pub(crate) fn class_counts(examples: &[LabeledExample]) -> [usize; 2] {
    let mut counts = [0; 2];
    for example in examples {
        counts[example.label.index()] += 1;
    }
    counts
}

/// Opens and reads a labelled CSV file.
pub fn load_dataset(
    path: impl AsRef<Path>,
    options: &DatasetOptions,
) -> Result<Dataset, TrainingDataError> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading training dataset");
    let file = File::open(path).map_err(|source| TrainingDataError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_dataset(io::BufReader::new(file), options)
}

/// Reads labelled reviews from CSV.
///
/// Rows whose text or label is empty are dropped and counted. A label that is
/// present but not in the known spellings fails the whole read.
pub fn read_dataset<R: io::Read>(
    reader: R,
    options: &DatasetOptions,
) -> Result<Dataset, TrainingDataError> {
    let delimiter = u8::try_from(options.delimiter).map_err(|_| {
        TrainingDataError::InvalidConfig(format!(
            "delimiter {:?} is not a single-byte character",
            options.delimiter
        ))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);
    let found = || headers.iter().collect::<Vec<_>>().join(", ");

    let text_idx = match &options.text_column {
        Some(name) => find(name).ok_or_else(|| TrainingDataError::MissingColumn {
            column: name.clone(),
            found: found(),
        })?,
        None => TEXT_COLUMN_CANDIDATES
            .iter()
            .find_map(|&name| find(name))
            .ok_or_else(|| TrainingDataError::MissingColumn {
                column: TEXT_COLUMN_CANDIDATES.join("|"),
                found: found(),
            })?,
    };
    let label_idx =
        find(&options.label_column).ok_or_else(|| TrainingDataError::MissingColumn {
            column: options.label_column.clone(),
            found: found(),
        })?;
    debug!(text_idx, label_idx, "Resolved dataset columns");

    let mut dataset = Dataset::default();
    for record in reader.records() {
        let record = record?;
        dataset.rows_read += 1;

        let text = record.get(text_idx).unwrap_or_default().trim();
        let raw_label = record.get(label_idx).unwrap_or_default().trim();
        if text.is_empty() || raw_label.is_empty() {
            dataset.rows_dropped += 1;
            continue;
        }
        let label = Category::decode(raw_label).ok_or_else(|| TrainingDataError::UnknownLabel {
            line: record.position().map_or(0, csv::Position::line),
            label: raw_label.to_owned(),
        })?;
        dataset.examples.push(LabeledExample::new(text, label));
    }

    if dataset.rows_dropped > 0 {
        warn!(
            dropped = dataset.rows_dropped,
            "Dropped dataset rows with missing text or label"
        );
    }
    let [authentic, generated] = dataset.class_counts();
    info!(
        rows = dataset.rows_read,
        examples = dataset.examples.len(),
        authentic,
        generated,
        "Dataset loaded"
    );
    Ok(dataset)
}
