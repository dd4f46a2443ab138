use std::borrow::Cow;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator, ProgressStyle};
use rayon::prelude::*;
use tracing::debug;

/// Minimum number of texts to consider parallelization
const MIN_TEXTS_FOR_PARALLEL: usize = 100;

/// Minimum total character count to consider parallelization
const MIN_CHARS_FOR_PARALLEL: usize = 10_000;

/// Smaller batches (single reviews at serving time) get no progress bar.
const MIN_TEXTS_FOR_PROGRESS: usize = 1_000;

pub(super) fn progress_bar_setup(len: usize, message: impl Into<Cow<'static, str>>) -> ProgressBar {
    if len < MIN_TEXTS_FOR_PROGRESS {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("#>-"));
    pb.set_style(style);
    pb.set_message(message);
    pb
}

fn split_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

fn tokenize_texts_par<T: AsRef<str> + Sync>(texts: &[T]) -> Vec<Vec<String>> {
    debug!(num_texts = texts.len(), "Using parallel tokenization");
    let pb = progress_bar_setup(texts.len(), "Tokenizing texts in parallel");
    let result = texts
        .par_iter()
        .progress_with(pb.clone())
        .map(|text| split_tokens(text.as_ref()))
        .collect();
    pb.finish_with_message("Parallel tokenization complete");
    result
}

fn tokenize_texts<T: AsRef<str>>(texts: &[T]) -> Vec<Vec<String>> {
    debug!(num_texts = texts.len(), "Using sequential tokenization");
    let pb = progress_bar_setup(texts.len(), "Tokenizing texts");

    let result = texts
        .iter()
        .progress_with(pb.clone())
        .map(|text| split_tokens(text.as_ref()))
        .collect();
    pb.finish_with_message("Tokenization complete");
    result
}

/// Determine if parallel processing should be used based on workload characteristics.
///
/// Parallelization is beneficial when:
/// - There are many texts (>= 100), OR
/// - The total character count is large (>= 10,000 chars)
#[inline]
fn should_use_parallel<T: AsRef<str>>(texts: &[T]) -> bool {
    let num_texts = texts.len();

    if num_texts >= MIN_TEXTS_FOR_PARALLEL {
        return true;
    }

    // Estimate from the first 20 texts when there are more than that
    let total_chars: usize = if num_texts > 20 {
        let sample_chars: usize = texts.iter().take(20).map(|s| s.as_ref().len()).sum();
        (sample_chars * num_texts) / 20
    } else {
        texts.iter().map(|s| s.as_ref().len()).sum()
    };

    total_chars >= MIN_CHARS_FOR_PARALLEL
}

/// Splits already normalized texts into their whitespace separated tokens.
pub fn tokenize<T: AsRef<str> + Sync>(texts: &[T]) -> Vec<Vec<String>> {
    if should_use_parallel(texts) {
        tokenize_texts_par(texts)
    } else {
        tokenize_texts(texts)
    }
}
