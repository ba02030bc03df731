mod common;

use common::{completed, pending};
use dealerflow::graph::{build_graph, BlockReason, NodeId, PrecedenceEntry, PrecedenceTable};
use dealerflow::jobs::{InMemoryJobStore, JobStatus, JobStore, JobType};

/// ingest -> feed enrich -> detail enrich, a straight line.
fn linear_table() -> PrecedenceTable {
    PrecedenceTable::new(vec![
        PrecedenceEntry {
            job_type: JobType::FeedIngest,
            rank: 0,
            prerequisites: vec![],
        },
        PrecedenceEntry {
            job_type: JobType::FeedEnrich,
            rank: 1,
            prerequisites: vec![JobType::FeedIngest],
        },
        PrecedenceEntry {
            job_type: JobType::DetailEnrich,
            rank: 2,
            prerequisites: vec![JobType::FeedEnrich],
        },
    ])
}

async fn graph_for(store: &InMemoryJobStore, table: &PrecedenceTable) -> dealerflow::graph::DependencyGraph {
    let pending = store.fetch_pending(None, 100).await.unwrap();
    build_graph(store, table, &pending).await.unwrap()
}

#[tokio::test]
async fn only_the_unblocked_middle_of_a_chain_is_ready() {
    let store = InMemoryJobStore::new();
    store.insert(completed("t1", JobType::FeedIngest, 60)).await;
    store.insert(pending("t1", JobType::FeedEnrich, 30)).await;
    store.insert(pending("t1", JobType::DetailEnrich, 20)).await;

    let graph = graph_for(&store, &linear_table()).await;

    let ready: Vec<JobType> = graph.ready_set("t1").iter().map(|j| j.job_type).collect();
    assert_eq!(ready, vec![JobType::FeedEnrich]);

    let blocked = graph.blocked("t1");
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].0, NodeId::new("t1", JobType::DetailEnrich));
    assert_eq!(
        blocked[0].1,
        BlockReason::UnmetDependency {
            prerequisite: NodeId::new("t1", JobType::FeedEnrich),
            status: Some(JobStatus::Pending),
        }
    );
    assert!(graph.cycles.is_empty());
}

#[tokio::test]
async fn missing_prerequisite_job_blocks_dependent() {
    let store = InMemoryJobStore::new();
    store.insert(pending("t1", JobType::LinkPublish, 10)).await;

    let graph = graph_for(&store, &PrecedenceTable::default()).await;

    assert!(graph.ready_set("t1").is_empty());
    assert_eq!(
        graph.blocked("t1")[0].1,
        BlockReason::UnmetDependency {
            prerequisite: NodeId::new("t1", JobType::DetailEnrich),
            status: None,
        }
    );
}

#[tokio::test]
async fn failed_prerequisite_keeps_dependent_blocked() {
    let store = InMemoryJobStore::new();
    store
        .insert(common::job("t1", JobType::FeedIngest, JobStatus::Failed, 60))
        .await;
    store.insert(pending("t1", JobType::FeedEnrich, 10)).await;

    let graph = graph_for(&store, &PrecedenceTable::default()).await;
    assert!(graph.ready_set("t1").is_empty());
}

#[tokio::test]
async fn most_recent_prerequisite_job_decides() {
    let store = InMemoryJobStore::new();
    // an old completed ingest, superseded by a newer one still in retry
    store.insert(completed("t1", JobType::FeedIngest, 3600)).await;
    let mut newer = common::job("t1", JobType::FeedIngest, JobStatus::Retry, 60);
    newer.scheduled_at = Some(chrono::Utc::now() + chrono::Duration::minutes(5));
    store.insert(newer).await;
    store.insert(pending("t1", JobType::FeedEnrich, 10)).await;

    let graph = graph_for(&store, &PrecedenceTable::default()).await;
    assert!(graph.ready_set("t1").is_empty());
}

#[tokio::test]
async fn misconfigured_cycle_is_reported_and_never_ready() {
    let table = PrecedenceTable::new(vec![
        PrecedenceEntry {
            job_type: JobType::FeedIngest,
            rank: 0,
            prerequisites: vec![JobType::FeedEnrich],
        },
        PrecedenceEntry {
            job_type: JobType::FeedEnrich,
            rank: 1,
            prerequisites: vec![JobType::FeedIngest],
        },
    ]);
    assert!(table.validate().is_err());

    let store = InMemoryJobStore::new();
    store.insert(pending("t1", JobType::FeedIngest, 20)).await;
    store.insert(pending("t1", JobType::FeedEnrich, 10)).await;

    let graph = graph_for(&store, &table).await;

    assert_eq!(graph.cycles.len(), 1);
    let cycle = &graph.cycles[0];
    assert!(cycle.contains(&NodeId::new("t1", JobType::FeedIngest)));
    assert!(cycle.contains(&NodeId::new("t1", JobType::FeedEnrich)));

    assert!(graph.ready_set("t1").is_empty());
    let blocked = graph.blocked("t1");
    assert_eq!(blocked.len(), 2);
    assert!(blocked.iter().all(|(_, r)| *r == BlockReason::Cycle));
}

#[tokio::test]
async fn cyclic_table_blocks_a_lone_pending_member() {
    let table = PrecedenceTable::new(vec![
        PrecedenceEntry {
            job_type: JobType::FeedIngest,
            rank: 0,
            prerequisites: vec![JobType::FeedEnrich],
        },
        PrecedenceEntry {
            job_type: JobType::FeedEnrich,
            rank: 1,
            prerequisites: vec![JobType::FeedIngest],
        },
    ]);

    let store = InMemoryJobStore::new();
    store.insert(completed("t1", JobType::FeedIngest, 600)).await;
    let enrich = pending("t1", JobType::FeedEnrich, 10);
    store.insert(enrich.clone()).await;

    let graph = graph_for(&store, &table).await;

    assert_eq!(graph.cycles.len(), 1);
    assert!(graph.cycles[0].contains(&NodeId::new("t1", JobType::FeedEnrich)));
    assert!(graph.is_in_cycle(&NodeId::new("t1", JobType::FeedEnrich)));

    assert!(graph.ready_set("t1").is_empty());
    let blocked = graph.blocked("t1");
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].1, BlockReason::Cycle);
}

#[tokio::test]
async fn ready_set_is_ordered_by_rank() {
    // every stage hangs off ingest so all three are ready at once
    let table = PrecedenceTable::new(
        JobType::ALL
            .iter()
            .enumerate()
            .map(|(rank, t)| PrecedenceEntry {
                job_type: *t,
                rank: rank as u32,
                prerequisites: if *t == JobType::FeedIngest {
                    vec![]
                } else {
                    vec![JobType::FeedIngest]
                },
            })
            .collect(),
    );

    let store = InMemoryJobStore::new();
    store.insert(completed("t1", JobType::FeedIngest, 600)).await;
    // inserted in reverse rank order
    store.insert(pending("t1", JobType::LinkPublish, 30)).await;
    store.insert(pending("t1", JobType::DetailEnrich, 20)).await;
    store.insert(pending("t1", JobType::FeedEnrich, 10)).await;

    let graph = graph_for(&store, &table).await;

    let ready: Vec<JobType> = graph.ready_set("t1").iter().map(|j| j.job_type).collect();
    assert_eq!(
        ready,
        vec![JobType::FeedEnrich, JobType::DetailEnrich, JobType::LinkPublish]
    );
}

#[tokio::test]
async fn identical_store_state_builds_identical_graphs() {
    let store = InMemoryJobStore::new();
    for t in ["b", "a", "c"] {
        store.insert(completed(t, JobType::FeedIngest, 600)).await;
        store.insert(pending(t, JobType::FeedEnrich, 50)).await;
        store.insert(pending(t, JobType::DetailEnrich, 40)).await;
    }
    let table = PrecedenceTable::default();

    let first = graph_for(&store, &table).await;
    let second = graph_for(&store, &table).await;

    assert_eq!(first.tenants(), second.tenants());
    assert_eq!(first.edges, second.edges);
    for tenant in first.tenants() {
        let a: Vec<_> = first.ready_set(tenant).iter().map(|j| j.id).collect();
        let b: Vec<_> = second.ready_set(tenant).iter().map(|j| j.id).collect();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn tenants_follow_oldest_pending_job() {
    let store = InMemoryJobStore::new();
    store.insert(pending("late", JobType::FeedIngest, 10)).await;
    store.insert(pending("early", JobType::FeedIngest, 100)).await;

    let graph = graph_for(&store, &PrecedenceTable::default()).await;
    assert_eq!(graph.tenants(), ["early".to_string(), "late".to_string()]);
}

#[tokio::test]
async fn store_outage_fails_the_build() {
    let store = InMemoryJobStore::new();
    let pending_jobs = vec![pending("t1", JobType::FeedEnrich, 10)];
    store.set_unavailable(true);

    let res = build_graph(&store, &PrecedenceTable::default(), &pending_jobs).await;
    assert!(res.is_err());
}
