//! Archive boundary and the exported entry formats.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::range::UNKNOWN_LABEL;
use crate::pose::Person;

/// 名前付きエントリを受け取り、1つのアーカイブにまとめる
pub trait ArchiveSink {
    fn add_entry(&mut self, name: &str, content: &[u8]) -> Result<()>;

    /// アーカイブを閉じてバイト列を返す。以後エントリは追加できない
    fn finalize(&mut self) -> Result<Vec<u8>>;
}

/// 各フレーム画像と並べて書く構造化レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameExportRecord {
    pub frame: u32,
    pub label: String,
    pub landmarks: Option<Person>,
}

/// エントリ名の拡張子なし部分 (`frame_0012`)
pub fn frame_stem(frame: u32) -> String {
    format!("frame_{:04}", frame)
}

/// `annotated_clip_<label>.zip` (ラベル中のパス区切りは `_` に置換)
pub fn bundle_name(label: &str) -> String {
    let label = label.trim();
    let label = if label.is_empty() { UNKNOWN_LABEL } else { label };
    let safe: String = label
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("annotated_clip_{}.zip", safe)
}

/// メモリ上の zip アーカイブ
pub struct ZipBundle {
    writer: Option<ZipWriter<Cursor<Vec<u8>>>>,
}

impl ZipBundle {
    pub fn new() -> Self {
        Self {
            writer: Some(ZipWriter::new(Cursor::new(Vec::new()))),
        }
    }
}

impl Default for ZipBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveSink for ZipBundle {
    fn add_entry(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("archive already finalized"))?;

        // PNG は圧縮済み
        let method = if name.ends_with(".png") {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);

        writer
            .start_file(name, options)
            .with_context(|| format!("failed to create archive entry {}", name))?;
        writer.write_all(content)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| anyhow!("archive already finalized"))?;
        let cursor = writer.finish().context("failed to finalize zip archive")?;
        Ok(cursor.into_inner())
    }
}

/// 完成したアーカイブを `dir` に書き出す (ディレクトリがなければ作成)
pub fn save_bundle(dir: &Path, file_name: &str, bundle: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(file_name);
    fs::write(&path, bundle).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// エクスポートしたアーカイブから全レコードをフレーム順に読む
pub fn read_records(bundle: &[u8]) -> Result<Vec<FrameExportRecord>> {
    let mut archive = ZipArchive::new(Cursor::new(bundle)).context("not a zip archive")?;
    let mut records = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.name().ends_with(".json") {
            continue;
        }
        let name = entry.name().to_string();
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        let record: FrameExportRecord = serde_json::from_str(&text)
            .with_context(|| format!("malformed record {}", name))?;
        records.push(record);
    }

    records.sort_by_key(|r| r.frame);
    Ok(records)
}
