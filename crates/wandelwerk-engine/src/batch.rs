// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch planning: which files of a directory are converted, and where each
// output lands.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use wandelwerk_core::error::Result;
use wandelwerk_core::format::Format;
use wandelwerk_core::matrix::ConversionMatrix;

/// One file selected for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Regular files directly inside `dir` whose extension names a matrix
/// source, sorted by file name. Everything else is skipped.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let matrix = ConversionMatrix::global();
    let mut inputs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension);
        match source {
            Some(format) if !matrix.allowed_targets(format).is_empty() => inputs.push(path),
            _ => debug!(path = %path.display(), "skipping unrecognised file"),
        }
    }

    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(inputs)
}

/// Pair every input with an output path in `output_dir`.
///
/// The first input (in the given order) keeps `stem.<target>`. A later input
/// whose name is taken gets `stem_<source ext>.<target>`, and if that is
/// taken too, `stem_<source ext>_<n>.<target>` with `n` counting from 2.
pub fn plan_outputs(inputs: Vec<PathBuf>, output_dir: &Path, target: Format) -> Vec<BatchItem> {
    let ext = target.extension();
    let mut taken: HashSet<String> = HashSet::new();
    let mut items = Vec::with_capacity(inputs.len());

    for input in inputs {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        let source_ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let mut name = format!("{stem}.{ext}");
        if taken.contains(&name) {
            name = format!("{stem}_{source_ext}.{ext}");
            let mut n = 2;
            while taken.contains(&name) {
                name = format!("{stem}_{source_ext}_{n}.{ext}");
                n += 1;
            }
        }

        taken.insert(name.clone());
        items.push(BatchItem {
            output: output_dir.join(&name),
            input,
        });
    }

    items
}
