//! Labelled pose archetypes and cosine-similarity classification.
//!
//! An archetype is the per-angle mean of every exported record carrying the
//! same label. A pose is compared to each archetype as a vector of joint
//! angles.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::Path;

use super::angles::{joint_angles, JointAngle};
use super::keypoint::Person;
use crate::export::{read_records, FrameExportRecord};

/// 分類の既定の類似度閾値
pub const DEFAULT_THRESHOLD: f32 = 0.9;

/// 関節角度ベクトル (`JointAngle::ALL` の順、計算できない角度は None)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleProfile {
    angles: [Option<f32>; JointAngle::ALL.len()],
}

impl AngleProfile {
    pub fn from_angles(angles: impl IntoIterator<Item = (JointAngle, f32)>) -> Self {
        let mut profile = Self::default();
        for (angle, degrees) in angles {
            profile.angles[angle as usize] = Some(degrees);
        }
        profile
    }

    pub fn from_person(person: &Person) -> Self {
        Self::from_angles(joint_angles(person))
    }

    pub fn get(&self, angle: JointAngle) -> Option<f32> {
        self.angles[angle as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.angles.iter().all(Option::is_none)
    }

    /// コサイン類似度 (両方にある角度のみで計算)
    ///
    /// 共通の角度がない、またはどちらかが零ベクトルなら None
    pub fn similarity_to(&self, other: &AngleProfile) -> Option<f32> {
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        for (a, b) in self.angles.iter().zip(other.angles.iter()) {
            if let (Some(a), Some(b)) = (a, b) {
                dot += a * b;
                norm_a += a * a;
                norm_b += b * b;
            }
        }
        let norm = norm_a.sqrt() * norm_b.sqrt();
        if norm <= f32::EPSILON {
            return None;
        }
        Some(dot / norm)
    }
}

/// 角度ごとの平均を取るための累積
#[derive(Debug, Clone, Default)]
struct Accumulator {
    sums: [f32; JointAngle::ALL.len()],
    counts: [u32; JointAngle::ALL.len()],
}

impl Accumulator {
    fn add(&mut self, profile: &AngleProfile) {
        for (i, value) in profile.angles.iter().enumerate() {
            if let Some(v) = value {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    fn mean(&self) -> AngleProfile {
        let mut profile = AngleProfile::default();
        for (i, slot) in profile.angles.iter_mut().enumerate() {
            if self.counts[i] > 0 {
                *slot = Some(self.sums[i] / self.counts[i] as f32);
            }
        }
        profile
    }
}

/// 閾値を超えたラベル
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub label: String,
    pub similarity: f32,
}

/// ラベルごとの典型姿勢 (アーキタイプ) と照合する分類器
#[derive(Debug, Default)]
pub struct PoseClassifier {
    samples: BTreeMap<String, Accumulator>,
}

impl PoseClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// ラベル付きの姿勢を1つ加える。角度が1つも取れなければ false
    pub fn add(&mut self, label: &str, person: &Person) -> bool {
        let profile = AngleProfile::from_person(person);
        if profile.is_empty() {
            return false;
        }
        self.samples.entry(label.to_string()).or_default().add(&profile);
        true
    }

    /// エクスポートしたレコードを取り込む (人物のないレコードは無視)
    pub fn add_records(&mut self, records: &[FrameExportRecord]) -> usize {
        records
            .iter()
            .filter_map(|r| r.landmarks.as_ref().map(|p| (r.label.as_str(), p)))
            .filter(|(label, person)| self.add(label, person))
            .count()
    }

    /// ディレクトリ内の `*.zip` アーカイブを全て読み込む
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read archetype directory {}", dir.display()))?;
        let mut bundles: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
            .collect();
        bundles.sort();

        let mut classifier = Self::new();
        for path in &bundles {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match read_records(&bytes) {
                Ok(records) => {
                    let added = classifier.add_records(&records);
                    info!("{}: {} poses", path.display(), added);
                }
                // 壊れたアーカイブは飛ばす
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }

        if classifier.samples.is_empty() {
            bail!("no labelled poses found in {}", dir.display());
        }
        Ok(classifier)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    /// ラベルのアーキタイプ (角度ごとの平均)
    pub fn archetype(&self, label: &str) -> Option<AngleProfile> {
        self.samples.get(label).map(Accumulator::mean)
    }

    /// 全ラベルとの類似度 (比較できないラベルは None)
    pub fn similarities(&self, profile: &AngleProfile) -> BTreeMap<String, Option<f32>> {
        self.samples
            .iter()
            .map(|(label, acc)| (label.clone(), profile.similarity_to(&acc.mean())))
            .collect()
    }

    /// 類似度が `threshold` 以上のラベルを類似度の高い順に返す
    pub fn classify(&self, profile: &AngleProfile, threshold: f32) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .similarities(profile)
            .into_iter()
            .filter_map(|(label, similarity)| {
                similarity
                    .filter(|s| *s >= threshold)
                    .map(|similarity| Match { label, similarity })
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches
    }
}
