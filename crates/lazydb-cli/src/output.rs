//! JSON documents written to standard output.

use std::io::Write;
use std::path::Path;

use lazydb_plugins::{LoadFailure, LoadReport, PluginInfo, PluginState};
use serde::Serialize;

use crate::errors::AppError;

/// A launch failure rendered for output.
#[derive(Debug, Serialize)]
pub(crate) struct FailureView<'a> {
    candidate: &'a str,
    path: &'a Path,
    stage: PluginState,
    error: String,
}

impl<'a> From<&'a LoadFailure> for FailureView<'a> {
    fn from(failure: &'a LoadFailure) -> Self {
        Self {
            candidate: &failure.candidate,
            path: &failure.path,
            stage: failure.stage,
            error: failure.error.to_string(),
        }
    }
}

/// Output of `lazydb plugins`.
#[derive(Debug, Serialize)]
pub(crate) struct PluginsView<'a> {
    plugins: Vec<PluginInfo>,
    failures: Vec<FailureView<'a>>,
}

impl<'a> PluginsView<'a> {
    pub(crate) fn new(plugins: Vec<PluginInfo>, report: &'a LoadReport) -> Self {
        Self {
            plugins,
            failures: report.failures.iter().map(FailureView::from).collect(),
        }
    }
}

/// Writes `value` as one line of JSON.
pub(crate) fn write_json<W, T>(out: &mut W, value: &T) -> Result<(), AppError>
where
    W: Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer(&mut *out, value).map_err(AppError::Serialise)?;
    writeln!(out).map_err(AppError::WriteOutput)?;
    out.flush().map_err(AppError::WriteOutput)
}
