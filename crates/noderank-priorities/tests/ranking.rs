//! End-to-end ranking tests.
//!
//! Exercises the aggregator with the built-in priorities over small,
//! hand-built clusters: per-priority bounds, determinism, weight
//! linearity, spreading across zones, and deadline handling.

use std::sync::Arc;
use std::time::Duration;

use noderank_core::config::*;
use noderank_core::*;
use noderank_priorities::*;
use proptest::prelude::*;

const GIB: u64 = 1024 * 1024 * 1024;

fn node(name: &str, zone: &str, milli_cpu: u64, memory: u64) -> Node {
    Node::new(name, Resources::new(milli_cpu, memory))
        .with_label(LABEL_HOSTNAME, name)
        .with_label(LABEL_ZONE, zone)
}

fn web_replica(name: &str) -> Pod {
    Pod::new("shop", name)
        .with_label("app", "web")
        .with_requests(Resources::new(500, GIB))
        .with_controller(ControllerRef {
            kind: "ReplicaSet".to_string(),
            name: "web".to_string(),
            selector: "app=web".to_string(),
        })
}

fn mixed_cluster() -> ClusterSnapshot {
    ClusterSnapshot::new(vec![
        node("node-a", "z1", 4000, 16 * GIB),
        node("node-b", "z1", 8000, 16 * GIB).with_label("disk", "ssd"),
        node("node-c", "z2", 4000, 8 * GIB).with_taint(Taint {
            key: "spot".to_string(),
            value: String::new(),
            effect: TaintEffect::PreferNoSchedule,
        }),
        node("node-d", "z2", 2000, 4 * GIB),
    ])
    .with_pod("node-a", web_replica("web-0"))
    .with_pod("node-a", web_replica("web-1"))
    .with_pod(
        "node-c",
        Pod::new("shop", "cache-0")
            .with_label("app", "cache")
            .with_requests(Resources::new(1000, 2 * GIB)),
    )
}

fn ranker_for(entries: Vec<PriorityEntry>, parallel: bool) -> Ranker {
    let policy = SchedulerPolicy {
        scoring: ScoringSettings {
            parallel,
            ..Default::default()
        },
        priorities: entries,
    };
    Ranker::from_policy(&policy, &PriorityRegistry::with_defaults()).unwrap()
}

fn all_builtins() -> Vec<&'static str> {
    vec![
        LEAST_REQUESTED,
        MOST_REQUESTED,
        BALANCED_RESOURCE_ALLOCATION,
        NODE_AFFINITY,
        TAINT_TOLERATION,
        INTER_POD_AFFINITY,
        SELECTOR_SPREAD,
    ]
}

#[test]
fn every_builtin_scores_each_node_once_within_range() {
    let snapshot = mixed_cluster();
    let pod = web_replica("web-2");

    for name in all_builtins() {
        let ranker = ranker_for(vec![PriorityEntry::new(name, 1)], false);
        let explained = ranker.explain(&pod, &snapshot).unwrap();

        assert_eq!(explained.len(), snapshot.nodes.len(), "{name}");
        let mut hosts: Vec<_> = explained.iter().map(|s| s.host.clone()).collect();
        hosts.sort();
        hosts.dedup();
        assert_eq!(hosts.len(), snapshot.nodes.len(), "{name}");

        for score in &explained {
            let contribution = score.breakdown[name];
            assert!((0..=10).contains(&contribution), "{name}: {score:?}");
            assert_eq!(score.total, contribution);
        }
    }
}

#[test]
fn ranking_is_deterministic() {
    let snapshot = mixed_cluster();
    let pod = web_replica("web-2");
    let entries: Vec<_> = all_builtins()
        .into_iter()
        .map(|n| PriorityEntry::new(n, 1))
        .collect();

    let ranker = ranker_for(entries.clone(), true);
    let first = ranker.rank(&pod, &snapshot).unwrap();
    let second = ranker.rank(&pod, &snapshot).unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );

    let sequential = ranker_for(entries, false).rank(&pod, &snapshot).unwrap();
    assert_eq!(first, sequential);
}

#[test]
fn doubling_a_weight_doubles_only_its_contribution() {
    let snapshot = mixed_cluster();
    let pod = web_replica("web-2");

    let base = ranker_for(
        vec![
            PriorityEntry::new(LEAST_REQUESTED, 1),
            PriorityEntry::new(SELECTOR_SPREAD, 1),
        ],
        true,
    )
    .explain(&pod, &snapshot)
    .unwrap();
    let doubled = ranker_for(
        vec![
            PriorityEntry::new(LEAST_REQUESTED, 1),
            PriorityEntry::new(SELECTOR_SPREAD, 2),
        ],
        true,
    )
    .explain(&pod, &snapshot)
    .unwrap();

    for before in &base {
        let after = doubled.iter().find(|s| s.host == before.host).unwrap();
        assert_eq!(after.breakdown[SELECTOR_SPREAD], 2 * before.breakdown[SELECTOR_SPREAD]);
        assert_eq!(after.breakdown[LEAST_REQUESTED], before.breakdown[LEAST_REQUESTED]);
        assert_eq!(
            after.total - before.total,
            before.breakdown[SELECTOR_SPREAD]
        );
    }
}

#[test]
fn spreading_prefers_other_zone_then_other_node() {
    let snapshot = ClusterSnapshot::new(vec![
        node("a", "z1", 4000, 8 * GIB),
        node("b", "z1", 4000, 8 * GIB),
        node("c", "z2", 4000, 8 * GIB),
    ])
    .with_pod("a", web_replica("web-0"));

    let ranked = ranker_for(vec![PriorityEntry::new(SELECTOR_SPREAD, 1)], true)
        .rank(&web_replica("web-1"), &snapshot)
        .unwrap();

    let order: Vec<_> = ranked.iter().map(|h| h.host.as_str()).collect();
    assert_eq!(order, vec!["c", "b", "a"]);
    assert!(ranked[0].score > ranked[1].score);
    assert!(ranked[1].score > ranked[2].score);
}

#[test]
fn spreading_is_neutral_without_controller() {
    let snapshot = mixed_cluster();
    let solo = Pod::new("shop", "solo").with_label("app", "web");

    let explained = ranker_for(vec![PriorityEntry::new(SELECTOR_SPREAD, 1)], false)
        .explain(&solo, &snapshot)
        .unwrap();
    let first = explained[0].total;
    assert!(explained.iter().all(|s| s.total == first));
}

#[test]
fn affinity_is_uniform_without_terms() {
    let snapshot = mixed_cluster();
    let pod = Pod::new("shop", "plain");

    for name in [NODE_AFFINITY, INTER_POD_AFFINITY] {
        let explained = ranker_for(vec![PriorityEntry::new(name, 1)], false)
            .explain(&pod, &snapshot)
            .unwrap();
        let first = explained[0].total;
        assert!(explained.iter().all(|s| s.total == first), "{name}");
    }
}

#[test]
fn no_priorities_ranks_by_name() {
    let snapshot = ClusterSnapshot::new(vec![
        node("zeta", "z1", 1, 1),
        node("alpha", "z1", 1, 1),
        node("mid", "z2", 1, 1),
    ]);
    let ranked = ranker_for(vec![], true)
        .rank(&Pod::new("shop", "p"), &snapshot)
        .unwrap();
    assert_eq!(
        ranked,
        vec![
            HostPriority::new("alpha", 0),
            HostPriority::new("mid", 0),
            HostPriority::new("zeta", 0),
        ]
    );
}

#[test]
fn preferred_node_affinity_wins_with_heavy_weight() {
    let snapshot = mixed_cluster();
    let mut pod = Pod::new("shop", "db-0").with_requests(Resources::new(500, GIB));
    pod.affinity = Some(Affinity {
        node_affinity: Some(NodeAffinity {
            preferred: vec![PreferredSchedulingTerm {
                weight: 100,
                preference: NodeSelectorTerm {
                    match_expressions: vec![NodeSelectorRequirement {
                        key: "disk".to_string(),
                        operator: NodeSelectorOperator::In,
                        values: vec!["ssd".to_string()],
                    }],
                },
            }],
        }),
        ..Default::default()
    });

    let mut policy = SchedulerPolicy::default();
    for entry in &mut policy.priorities {
        if entry.name == NODE_AFFINITY {
            entry.weight = 10;
        }
    }
    let ranked = rank_nodes(&pod, &snapshot, &policy).unwrap();
    assert_eq!(ranked[0].host, "node-b");
}

#[test]
fn malformed_pod_aborts_cycle() {
    let mut pod = web_replica("web-2");
    if let Some(controller) = pod.controller.as_mut() {
        controller.selector = "app in (web".to_string();
    }
    let err = rank_nodes(&pod, &mixed_cluster(), &SchedulerPolicy::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn unknown_policy_entry_is_rejected() {
    let policy = SchedulerPolicy {
        scoring: ScoringSettings::default(),
        priorities: vec![PriorityEntry::new("NoSuchPriority", 1)],
    };
    let err = Ranker::from_policy(&policy, &PriorityRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, RankError::UnknownPriority(_)));
}

#[test]
fn settings_built_in_code_are_validated() {
    let snapshot = ClusterSnapshot::new(vec![
        node("a", "z1", 4000, 8 * GIB),
        node("b", "z1", 4000, 8 * GIB),
        node("c", "z2", 4000, 8 * GIB),
    ])
    .with_pod("a", web_replica("web-0"));

    for scoring in [
        ScoringSettings { max_score: -10, ..Default::default() },
        ScoringSettings { max_score: 0, ..Default::default() },
        ScoringSettings { zone_weighting: 1.5, ..Default::default() },
        ScoringSettings { zone_weighting: -1.0, ..Default::default() },
    ] {
        let policy = SchedulerPolicy {
            scoring,
            ..Default::default()
        };
        let err = rank_nodes(&web_replica("web-1"), &snapshot, &policy).unwrap_err();
        assert!(matches!(err, RankError::InvalidSettings(_)), "{err}");
        assert_eq!(err.kind(), ErrorKind::Input);
    }
}

/// Sleeps long enough to blow any small deadline.
struct Slow;

impl PriorityFunction for Slow {
    fn name(&self) -> &str {
        "Slow"
    }

    fn score(&self, ctx: &PriorityContext<'_>) -> RankResult<HostPriorityList> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(ctx
            .nodes()
            .iter()
            .map(|n| HostPriority::new(n.name(), 0))
            .collect())
    }
}

#[tokio::test]
async fn rank_within_returns_full_ranking() {
    let ranker = Arc::new(ranker_for(
        vec![
            PriorityEntry::new(SELECTOR_SPREAD, 1),
            PriorityEntry::new(LEAST_REQUESTED, 1),
        ],
        true,
    ));
    let snapshot = Arc::new(mixed_cluster());
    let pod = Arc::new(web_replica("web-2"));

    let ranked = ranker
        .rank_within(pod.clone(), snapshot.clone(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(ranked, ranker.rank(&pod, &snapshot).unwrap());
}

#[tokio::test]
async fn rank_within_discards_late_cycle() {
    let ranker = Arc::new(
        Ranker::new(
            vec![PriorityConfig::new(Arc::new(Slow), 1)],
            ScoringSettings::default(),
        )
        .unwrap(),
    );
    let err = ranker
        .rank_within(
            Arc::new(Pod::new("shop", "p")),
            Arc::new(mixed_cluster()),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RankError::DeadlineExceeded));
    assert_eq!(err.kind(), ErrorKind::Deadline);
}

fn arb_cluster() -> impl Strategy<Value = ClusterSnapshot> {
    let nodes = prop::collection::vec((1u64..16_000, 1u64..64, 0usize..3), 1..8);
    let placements = prop::collection::vec((0usize..8, 0u64..4000, 0u64..8, any::<bool>()), 0..12);
    (nodes, placements).prop_map(|(nodes, placements)| {
        let nodes: Vec<Node> = nodes
            .into_iter()
            .enumerate()
            .map(|(i, (cpu, mem_gib, zone))| {
                node(&format!("n{i}"), &format!("z{zone}"), cpu, mem_gib * GIB)
            })
            .collect();
        let count = nodes.len();
        let mut snapshot = ClusterSnapshot::new(nodes);
        for (i, (target, cpu, mem_gib, replica)) in placements.into_iter().enumerate() {
            let pod = if replica {
                web_replica(&format!("web-{i}"))
            } else {
                Pod::new("shop", format!("other-{i}"))
            };
            let pod = pod.with_requests(Resources::new(cpu, mem_gib * GIB));
            snapshot = snapshot.with_pod(format!("n{}", target % count), pod);
        }
        snapshot
    })
}

proptest! {
    #[test]
    fn totals_are_bounded_and_order_is_stable(snapshot in arb_cluster()) {
        let entries: Vec<_> = all_builtins()
            .into_iter()
            .map(|n| PriorityEntry::new(n, 2))
            .collect();
        let parallel = ranker_for(entries.clone(), true);
        let sequential = ranker_for(entries, false);
        let pod = web_replica("web-new");

        let a = parallel.rank(&pod, &snapshot).unwrap();
        let b = sequential.rank(&pod, &snapshot).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), snapshot.nodes.len());

        let ceiling = 10 * 2 * all_builtins().len() as i64;
        for hp in &a {
            prop_assert!((0..=ceiling).contains(&hp.score));
        }
        for pair in a.windows(2) {
            prop_assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].host < pair[1].host)
            );
        }
    }
}
