//! Result output port for exporting batch results.

use crate::orchestrator::BatchResults;

/// Port for exporting the results of a finished batch.
pub trait ResultOutput: Send + Sync {
    /// Writes the results of one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    fn write(&self, results: &BatchResults) -> anyhow::Result<()>;

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&self) -> anyhow::Result<()>;
}
