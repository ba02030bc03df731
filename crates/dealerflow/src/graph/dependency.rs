//! Per-pass dependency graph. Rebuilt from the job store on every pass and
//! thrown away afterwards; the store stays the only source of truth.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::graph::cycles::find_cycles;
use crate::graph::precedence::PrecedenceTable;
use crate::jobs::model::{Job, JobStatus, JobType};
use crate::jobs::store::JobStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    pub tenant_id: String,
    pub job_type: JobType,
}

impl NodeId {
    pub fn new(tenant_id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            job_type,
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tenant_id, self.job_type)
    }
}

/// A prerequisite and the status of its most recently created job, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prerequisite {
    pub node: NodeId,
    pub status: Option<JobStatus>,
}

impl Prerequisite {
    pub fn is_satisfied(&self) -> bool {
        self.status == Some(JobStatus::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub id: NodeId,
    pub rank: u32,
    pub job: Job,
    pub prerequisites: Vec<Prerequisite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    Cycle,
    UnmetDependency {
        prerequisite: NodeId,
        status: Option<JobStatus>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<NodeId, DependencyNode>,
    /// prerequisite -> dependent
    pub edges: BTreeSet<(NodeId, NodeId)>,
    pub cycles: Vec<Vec<NodeId>>,
    tenant_order: Vec<String>,
    in_cycle: BTreeSet<NodeId>,
}

impl DependencyGraph {
    /// Tenants with pending work, in order of their oldest pending job.
    pub fn tenants(&self) -> &[String] {
        &self.tenant_order
    }

    pub fn is_in_cycle(&self, id: &NodeId) -> bool {
        self.in_cycle.contains(id)
    }

    fn tenant_nodes<'a>(&'a self, tenant_id: &'a str) -> impl Iterator<Item = &'a DependencyNode> {
        self.nodes
            .values()
            .filter(move |n| n.id.tenant_id == tenant_id)
    }

    /// Why a node cannot run, or `None` when it is ready.
    pub fn block_reason(&self, node: &DependencyNode) -> Option<BlockReason> {
        if self.in_cycle.contains(&node.id) {
            return Some(BlockReason::Cycle);
        }
        node.prerequisites
            .iter()
            .find(|p| !p.is_satisfied())
            .map(|p| BlockReason::UnmetDependency {
                prerequisite: p.node.clone(),
                status: p.status,
            })
    }

    /// Ready jobs for the tenant, ascending by static rank.
    pub fn ready_set(&self, tenant_id: &str) -> Vec<Job> {
        let mut ready: Vec<&DependencyNode> = self
            .tenant_nodes(tenant_id)
            .filter(|n| self.block_reason(n).is_none())
            .collect();
        ready.sort_by_key(|n| (n.rank, n.id.job_type));
        ready.into_iter().map(|n| n.job.clone()).collect()
    }

    pub fn blocked(&self, tenant_id: &str) -> Vec<(NodeId, BlockReason)> {
        self.tenant_nodes(tenant_id)
            .filter_map(|n| self.block_reason(n).map(|r| (n.id.clone(), r)))
            .collect()
    }
}

/// Builds the graph for `pending` jobs, resolving every prerequisite against
/// the most recent job of that type for the tenant. Any store error aborts
/// the build.
pub async fn build_graph(
    store: &dyn JobStore,
    table: &PrecedenceTable,
    pending: &[Job],
) -> anyhow::Result<DependencyGraph> {
    let mut graph = DependencyGraph::default();
    let mut by_tenant: HashMap<&str, Vec<&Job>> = HashMap::new();

    for job in pending {
        let jobs = by_tenant.entry(job.tenant_id.as_str()).or_default();
        if jobs.is_empty() {
            graph.tenant_order.push(job.tenant_id.clone());
        }
        jobs.push(job);
    }

    // per-build memo only, never shared between passes
    let mut latest: HashMap<NodeId, Option<JobStatus>> = HashMap::new();

    for tenant_id in &graph.tenant_order {
        let jobs = &by_tenant[tenant_id.as_str()];

        for job in jobs.iter().filter(|j| table.entry(j.job_type).is_none()) {
            tracing::warn!(
                tenant_id = %tenant_id,
                job_id = %job.id,
                job_type = %job.job_type,
                "job type missing from precedence table, skipping"
            );
        }

        for entry in table.chain() {
            let mut of_type = jobs.iter().filter(|j| j.job_type == entry.job_type);
            let Some(job) = of_type.next() else {
                continue;
            };
            if let Some(extra) = of_type.next() {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    job_type = %entry.job_type,
                    kept = %job.id,
                    ignored = %extra.id,
                    "more than one live job for tenant and type"
                );
            }

            let id = NodeId::new(tenant_id.clone(), entry.job_type);
            let mut prerequisites = Vec::with_capacity(entry.prerequisites.len());

            for prereq_type in &entry.prerequisites {
                let prereq_id = NodeId::new(tenant_id.clone(), *prereq_type);
                let status = match latest.get(&prereq_id) {
                    Some(status) => *status,
                    None => {
                        let status = store
                            .fetch_latest(tenant_id, *prereq_type)
                            .await?
                            .map(|j| j.status);
                        latest.insert(prereq_id.clone(), status);
                        status
                    }
                };

                graph.edges.insert((prereq_id.clone(), id.clone()));
                prerequisites.push(Prerequisite {
                    node: prereq_id,
                    status,
                });
            }

            graph.nodes.insert(
                id.clone(),
                DependencyNode {
                    id,
                    rank: entry.rank,
                    job: (*job).clone(),
                    prerequisites,
                },
            );
        }
    }

    let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    for (from, to) in &graph.edges {
        adjacency.entry(from.clone()).or_default().insert(to.clone());
    }
    let mut cycles = find_cycles(&adjacency);

    // A type-level cycle whose other members are not pending leaves no node
    // cycle behind, yet none of its jobs can ever legitimately run.
    let type_cycles = table.cycles();
    for tenant_id in &graph.tenant_order {
        for type_cycle in &type_cycles {
            let path: Vec<NodeId> = type_cycle
                .iter()
                .map(|t| NodeId::new(tenant_id.clone(), *t))
                .collect();
            if !path.iter().any(|id| graph.nodes.contains_key(id)) {
                continue;
            }
            let known = cycles
                .iter()
                .any(|c| c.len() == path.len() && path.iter().all(|id| c.contains(id)));
            if !known {
                cycles.push(path);
            }
        }
    }

    graph.in_cycle = cycles.iter().flatten().cloned().collect();
    graph.cycles = cycles;

    Ok(graph)
}
