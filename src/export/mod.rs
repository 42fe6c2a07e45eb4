pub mod archive;
pub mod pipeline;
pub mod range;

pub use archive::{bundle_name, read_records, save_bundle, ArchiveSink, FrameExportRecord, ZipBundle};
pub use pipeline::{ClipExporter, ExportPhase, ExportProgress, ExportSummary};
pub use range::{RangeMarker, UNKNOWN_LABEL};
