mod text;

pub use text::render_session_report;

use std::path::{Path, PathBuf};

use anyhow::Context;

/// A rendered report on disk plus the bytes that went into it.
pub struct ReportArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

pub fn write_report(dir: &Path, session_id: i64, content: &str) -> anyhow::Result<ReportArtifact> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating reports dir {}", dir.display()))?;
    let filename = format!("report_session_{session_id}.txt");
    let path = dir.join(&filename);
    std::fs::write(&path, content)
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(ReportArtifact {
        filename,
        path,
        bytes: content.as_bytes().to_vec(),
    })
}
