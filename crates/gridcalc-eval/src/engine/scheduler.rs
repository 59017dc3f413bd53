//! Evaluation ordering for the dirty closure.
//!
//! Strongly connected components are found with an iterative Tarjan walk
//! over precedent edges, restricted to the vertices being recalculated.
//! Tarjan emits a component only after everything it reads, so the output
//! is already a valid evaluation order.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::graph::{DependencyGraph, GraphError};
use super::vertex::VertexId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleStep {
    Evaluate(VertexId),
    /// Members of one cycle, in creation order.
    Cycle(Vec<VertexId>),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub steps: Vec<ScheduleStep>,
}

impl Schedule {
    pub fn cycles(&self) -> impl Iterator<Item = &[VertexId]> {
        self.steps.iter().filter_map(|s| match s {
            ScheduleStep::Cycle(members) => Some(members.as_slice()),
            ScheduleStep::Evaluate(_) => None,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match s {
                ScheduleStep::Evaluate(_) => 1,
                ScheduleStep::Cycle(m) => m.len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub struct Scheduler<'a, A> {
    graph: &'a DependencyGraph<A>,
}

struct Frame {
    vertex: VertexId,
    next: usize,
}

impl<'a, A> Scheduler<'a, A> {
    pub fn new(graph: &'a DependencyGraph<A>) -> Self {
        Self { graph }
    }

    pub fn create_schedule(&self, vertices: &[VertexId]) -> Result<Schedule, GraphError> {
        let sccs = self.tarjan_scc(vertices)?;
        let steps = sccs
            .into_iter()
            .map(|mut scc| {
                if scc.len() > 1 || self.has_self_loop(scc[0]) {
                    self.graph.sort_by_seq(&mut scc);
                    ScheduleStep::Cycle(scc)
                } else {
                    ScheduleStep::Evaluate(scc[0])
                }
            })
            .collect();
        Ok(Schedule { steps })
    }

    /// Components of the subgraph induced by `vertices`, precedents first.
    pub fn tarjan_scc(&self, vertices: &[VertexId]) -> Result<Vec<Vec<VertexId>>, GraphError> {
        let mut roots: Vec<VertexId> = vertices.to_vec();
        for id in &roots {
            if self.graph.vertex(*id).is_none() {
                return Err(GraphError::InvalidHandle(*id));
            }
        }
        self.graph.sort_by_seq(&mut roots);
        roots.dedup();
        let members: FxHashSet<VertexId> = roots.iter().copied().collect();

        // In-set precedents of each member, creation order.
        let successors: FxHashMap<VertexId, SmallVec<[VertexId; 4]>> = roots
            .iter()
            .map(|&v| {
                let mut next: SmallVec<[VertexId; 4]> = self
                    .graph
                    .precedents_slice(v)
                    .iter()
                    .copied()
                    .filter(|p| members.contains(p))
                    .collect();
                next.sort_by_key(|p| self.graph.seq(*p));
                (v, next)
            })
            .collect();

        let mut counter = 0usize;
        let mut index: FxHashMap<VertexId, usize> = FxHashMap::default();
        let mut low: FxHashMap<VertexId, usize> = FxHashMap::default();
        let mut stack: Vec<VertexId> = Vec::new();
        let mut on_stack: FxHashSet<VertexId> = FxHashSet::default();
        let mut sccs = Vec::new();
        let mut calls: Vec<Frame> = Vec::new();

        for root in roots {
            if index.contains_key(&root) {
                continue;
            }
            index.insert(root, counter);
            low.insert(root, counter);
            counter += 1;
            stack.push(root);
            on_stack.insert(root);
            calls.push(Frame { vertex: root, next: 0 });

            while let Some(frame) = calls.last_mut() {
                let v = frame.vertex;
                let succ = successors.get(&v).map_or(&[][..], |s| s.as_slice());
                if let Some(&w) = succ.get(frame.next) {
                    frame.next += 1;
                    if !index.contains_key(&w) {
                        index.insert(w, counter);
                        low.insert(w, counter);
                        counter += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        calls.push(Frame { vertex: w, next: 0 });
                    } else if on_stack.contains(&w) {
                        let lw = index[&w];
                        low.entry(v).and_modify(|l| *l = (*l).min(lw));
                    }
                    continue;
                }

                // All successors done: close the frame.
                calls.pop();
                let lv = low[&v];
                if let Some(parent) = calls.last() {
                    low.entry(parent.vertex).and_modify(|l| *l = (*l).min(lv));
                }
                if lv == index[&v] {
                    let mut scc = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack.remove(&w);
                        scc.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(scc);
                }
            }
        }
        Ok(sccs)
    }

    fn has_self_loop(&self, vertex: VertexId) -> bool {
        self.graph.precedents_slice(vertex).contains(&vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_common::CellAddress;

    fn cell(row: u32) -> CellAddress {
        CellAddress::new(0, row, 0)
    }

    fn graph_with(edges: &[(u32, u32)], n: u32) -> (DependencyGraph<()>, Vec<VertexId>) {
        let mut g = DependencyGraph::new();
        g.add_sheet("Sheet1");
        let ids: Vec<VertexId> = (0..n).map(|r| g.get_or_create_cell_vertex(cell(r))).collect();
        let mut deps: Vec<Vec<VertexId>> = vec![Vec::new(); n as usize];
        for &(dependent, precedent) in edges {
            deps[dependent as usize].push(ids[precedent as usize]);
        }
        for (i, p) in deps.iter().enumerate() {
            g.set_precedents(ids[i], p).unwrap();
        }
        (g, ids)
    }

    #[test]
    fn chain_orders_precedents_first() {
        // 2 reads 1 reads 0
        let (g, ids) = graph_with(&[(1, 0), (2, 1)], 3);
        let schedule = Scheduler::new(&g).create_schedule(&[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(
            schedule.steps,
            vec![
                ScheduleStep::Evaluate(ids[0]),
                ScheduleStep::Evaluate(ids[1]),
                ScheduleStep::Evaluate(ids[2]),
            ]
        );
        assert_eq!(schedule.cycles().count(), 0);
    }

    #[test]
    fn detects_cycles_and_self_loops() {
        // 0 <-> 1, 2 reads itself, 3 reads 1
        let (g, ids) = graph_with(&[(0, 1), (1, 0), (2, 2), (3, 1)], 4);
        let schedule = Scheduler::new(&g).create_schedule(&ids).unwrap();
        let cycles: Vec<Vec<VertexId>> = schedule.cycles().map(<[VertexId]>::to_vec).collect();
        assert_eq!(cycles, vec![vec![ids[0], ids[1]], vec![ids[2]]]);
        let last = schedule.steps.last().unwrap();
        assert_eq!(last, &ScheduleStep::Evaluate(ids[3]));
        assert_eq!(schedule.vertex_count(), 4);
    }

    #[test]
    fn edges_outside_the_set_are_ignored() {
        let (g, ids) = graph_with(&[(1, 0), (0, 1)], 2);
        let schedule = Scheduler::new(&g).create_schedule(&[ids[1]]).unwrap();
        assert_eq!(schedule.steps, vec![ScheduleStep::Evaluate(ids[1])]);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let n = 50_000u32;
        let edges: Vec<(u32, u32)> = (1..n).map(|i| (i, i - 1)).collect();
        let (g, ids) = graph_with(&edges, n);
        let schedule = Scheduler::new(&g).create_schedule(&ids).unwrap();
        assert_eq!(schedule.steps.len(), n as usize);
        assert_eq!(schedule.steps[0], ScheduleStep::Evaluate(ids[0]));
    }
}
