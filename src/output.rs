use crate::metrics::stats::StatsSnapshot;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Sink for periodic run snapshots: a CSV file or stdout rows.
pub enum OutputWriter {
    Csv { writer: BufWriter<File> },
    Stdout,
}

impl OutputWriter {
    pub async fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::new_csv(p).await,
            None => Ok(Self::new_stdout()),
        }
    }

    pub async fn new_csv(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let file = File::create(path)
            .await
            .with_context(|| format!("create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(StatsSnapshot::csv_header().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        tracing::info!(path = %path.display(), "writing run snapshots as csv");
        Ok(Self::Csv { writer })
    }

    pub fn new_stdout() -> Self {
        println!("{}", StatsSnapshot::csv_header());
        Self::Stdout
    }

    pub async fn write_snapshot(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        match self {
            Self::Csv { writer } => {
                writer.write_all(snapshot.to_csv_row().as_bytes()).await?;
                writer.write_all(b"\n").await?;
                // Flush per row
                writer.flush().await?;
            }
            Self::Stdout => {
                println!("{}", snapshot.to_csv_row());
            }
        }
        Ok(())
    }
}
