use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use pose_clipper::export::read_records;
use pose_clipper::pose::{joint_angles, AngleProfile, JointAngle, PoseClassifier, DEFAULT_THRESHOLD};

/// エクスポートしたアーカイブの記録と関節角度を表示する
#[derive(Parser, Debug)]
#[command(version = env!("GIT_VERSION"), about = "Print records and joint angles from an exported clip")]
struct Args {
    /// annotated_clip_<label>.zip
    bundle: PathBuf,

    /// 表示する角度 (省略時は全て)
    #[arg(short, long)]
    angle: Vec<String>,

    /// ラベル付きアーカイブのディレクトリ。指定すると各フレームを分類する
    #[arg(long)]
    archetypes: Option<PathBuf>,

    /// 分類の類似度閾値
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let bytes = std::fs::read(&args.bundle)
        .with_context(|| format!("Failed to read {}", args.bundle.display()))?;
    let records = read_records(&bytes)?;
    info!("{}: {} records", args.bundle.display(), records.len());

    let classifier = args
        .archetypes
        .as_deref()
        .map(PoseClassifier::load_dir)
        .transpose()?;
    if let Some(classifier) = &classifier {
        info!("Archetypes: {}", classifier.labels().collect::<Vec<_>>().join(", "));
    }

    let wanted = |angle: JointAngle| args.angle.is_empty() || args.angle.iter().any(|a| a == angle.name());

    for record in &records {
        println!("frame {} [{}]", record.frame, record.label);
        let Some(person) = &record.landmarks else {
            println!("  (no landmarks)");
            continue;
        };
        for (angle, degrees) in joint_angles(person) {
            if wanted(angle) {
                println!("  {:<26} {:>4}", angle.name(), degrees.round() as i32);
            }
        }
        if let Some(classifier) = &classifier {
            let matches = classifier.classify(&AngleProfile::from_person(person), args.threshold);
            if matches.is_empty() {
                println!("  => (no match >= {:.2})", args.threshold);
            }
            for m in matches {
                println!("  => {:<24} {:.3}", m.label, m.similarity);
            }
        }
    }

    Ok(())
}
