use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use noderank_core::{ClusterSnapshot, Pod, SchedulerPolicy};
use noderank_priorities::{NodeScore, PriorityRegistry, Ranker};
use serde::de::DeserializeOwned;
use tracing::info;

pub struct RankArgs {
    pub snapshot: PathBuf,
    pub pod: PathBuf,
    pub policy: Option<PathBuf>,
    pub format: String,
    pub timeout_ms: Option<u64>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub async fn rank(args: RankArgs) -> anyhow::Result<()> {
    let snapshot: ClusterSnapshot = read_json(&args.snapshot)?;
    let pod: Pod = read_json(&args.pod)?;
    let policy = match &args.policy {
        Some(path) => SchedulerPolicy::from_file(path)?,
        None => SchedulerPolicy::default(),
    };

    let ranker = Arc::new(Ranker::from_policy(&policy, &PriorityRegistry::with_defaults())?);
    info!(
        pod = %pod.key(),
        nodes = snapshot.nodes.len(),
        priorities = ranker.configs().len(),
        "ranking"
    );

    match args.timeout_ms {
        Some(ms) => {
            let ranked = ranker
                .rank_within(Arc::new(pod), Arc::new(snapshot), Duration::from_millis(ms))
                .await?;
            match args.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&ranked)?),
                _ => {
                    for (i, hp) in ranked.iter().enumerate() {
                        println!("{:>3}. {:<32} {:>6}", i + 1, hp.host, hp.score);
                    }
                }
            }
        }
        None => {
            let scores = ranker.explain(&pod, &snapshot)?;
            match args.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&scores)?),
                _ => print!("{}", format_scores(&scores)),
            }
        }
    }

    Ok(())
}

/// One line per node, best first, with each priority's weighted share.
pub fn format_scores(scores: &[NodeScore]) -> String {
    let mut out = String::new();
    for (i, score) in scores.iter().enumerate() {
        out.push_str(&format!("{:>3}. {:<32} {:>6}\n", i + 1, score.host, score.total));
        for (name, contribution) in &score.breakdown {
            out.push_str(&format!("       {name:<32} {contribution:>6}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn text_output_lists_breakdown_under_host() {
        let scores = vec![NodeScore {
            host: "node-a".to_string(),
            total: 12,
            breakdown: BTreeMap::from([
                ("LeastRequestedPriority".to_string(), 7),
                ("SelectorSpreadPriority".to_string(), 5),
            ]),
        }];
        let text = format_scores(&scores);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  1. node-a"));
        assert!(lines[0].ends_with("12"));
        assert!(lines[1].contains("LeastRequestedPriority"));
    }

    #[tokio::test]
    async fn ranks_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = ClusterSnapshot::new(vec![
            noderank_core::Node::new("a", noderank_core::Resources::new(4000, 1 << 33)),
            noderank_core::Node::new("b", noderank_core::Resources::new(4000, 1 << 33)),
        ]);
        let pod = Pod::new("default", "web-0");
        let snapshot_path = dir.path().join("snapshot.json");
        let pod_path = dir.path().join("pod.json");
        std::fs::write(&snapshot_path, serde_json::to_string(&snapshot).unwrap()).unwrap();
        std::fs::write(&pod_path, serde_json::to_string(&pod).unwrap()).unwrap();

        for timeout_ms in [None, Some(5_000)] {
            rank(RankArgs {
                snapshot: snapshot_path.clone(),
                pod: pod_path.clone(),
                policy: None,
                format: "json".to_string(),
                timeout_ms,
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn ranks_demo_inputs() {
        let demos = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        rank(RankArgs {
            snapshot: demos.join("snapshot.json"),
            pod: demos.join("pod.json"),
            policy: Some(demos.join("policy.toml")),
            format: "text".to_string(),
            timeout_ms: None,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn missing_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = rank(RankArgs {
            snapshot: dir.path().join("nope.json"),
            pod: dir.path().join("pod.json"),
            policy: None,
            format: "text".to_string(),
            timeout_ms: None,
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
