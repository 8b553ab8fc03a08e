use crate::entity::components::mirrored::MirroredNode;
use crate::rendering::render_backend::RenderEntity;
use crate::simulation::types::NodeId;
use log::{debug, trace};
use std::collections::HashMap;

/// Where a simulation node currently is in its lifecycle. Removed identities are forgotten, they read as `Unseen`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeState {
    Unseen,
    Pending,
    Materialized,
}

/// A materialized node whose parent has not been materialized yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AwaitingParent {
    pub node: NodeId,
    pub parent: NodeId,
    /// Passes that have been spent waiting so far.
    pub passes: u32,
}

/// The identity mapping between simulation nodes and render entities, and the per node lifecycle bookkeeping.
///
/// Notifications are only recorded here, the work happens in the lifecycle system on the next pass.
#[derive(Default)]
pub struct EntityTracker {
    mirrored: HashMap<NodeId, MirroredNode>,
    nodes_by_entity: HashMap<RenderEntity, NodeId>,
    /// Announced during the current pass.
    announced: Vec<NodeId>,
    /// Announced during an earlier pass, materialized on the next one.
    pending: Vec<NodeId>,
    removals: Vec<NodeId>,
    awaiting_parent: Vec<AwaitingParent>,
    orphans_reported: usize,
}

impl EntityTracker {
    pub fn new() -> Self {
        EntityTracker::default()
    }

    pub fn node_added(&mut self, node: NodeId) {
        trace!("Node {:?} announced", node);
        if !self.announced.contains(&node) {
            self.announced.push(node);
        }
    }

    /// A removal cancels an addition announced in the same pass. Removing an unknown node is a no-op.
    pub fn node_removed(&mut self, node: NodeId) {
        trace!("Node {:?} removed", node);
        self.announced.retain(|&announced| announced != node);
        if !self.removals.contains(&node) {
            self.removals.push(node);
        }
    }

    /// The nodes to materialize in this pass, in announcement order. Nodes with a queued removal are skipped.
    pub fn take_pending(&mut self) -> Vec<NodeId> {
        let removals = &self.removals;
        std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|node| !removals.contains(node))
            .collect()
    }

    pub fn take_removals(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.removals)
    }

    /// Queues a materialized node for removal, as if the simulation had announced it.
    pub fn queue_removal(&mut self, node: NodeId) {
        if !self.removals.contains(&node) {
            self.removals.push(node);
        }
    }

    /// Moves the nodes announced in this pass to the next one.
    pub fn promote_announced(&mut self) {
        for node in self.announced.drain(..) {
            if !self.pending.contains(&node) {
                self.pending.push(node);
            }
        }
    }

    pub fn insert(&mut self, node: NodeId, mirrored: MirroredNode) {
        self.nodes_by_entity.insert(mirrored.entity, node);
        if let Some(previous) = self.mirrored.insert(node, mirrored) {
            // the caller checks for this, a stale reverse mapping would outlive the entity otherwise
            self.nodes_by_entity.remove(&previous.entity);
        }
    }

    /// Erases the identity mapping. Returns `None` if the node was never materialized.
    pub fn remove(&mut self, node: NodeId) -> Option<MirroredNode> {
        self.pending.retain(|&pending| pending != node);
        self.awaiting_parent.retain(|awaiting| awaiting.node != node);

        let mirrored = self.mirrored.remove(&node)?;
        self.nodes_by_entity.remove(&mirrored.entity);
        Some(mirrored)
    }

    #[inline]
    pub fn get(&self, node: NodeId) -> Option<&MirroredNode> {
        self.mirrored.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut MirroredNode> {
        self.mirrored.get_mut(&node)
    }

    pub fn entity_for_node(&self, node: NodeId) -> Option<RenderEntity> {
        self.mirrored.get(&node).map(|mirrored| mirrored.entity)
    }

    pub fn node_for_entity(&self, entity: RenderEntity) -> Option<NodeId> {
        self.nodes_by_entity.get(&entity).copied()
    }

    pub fn state(&self, node: NodeId) -> NodeState {
        if self.mirrored.contains_key(&node) {
            NodeState::Materialized
        } else if self.pending.contains(&node) || self.announced.contains(&node) {
            NodeState::Pending
        } else {
            NodeState::Unseen
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &MirroredNode)> {
        self.mirrored.iter()
    }

    pub fn len(&self) -> usize {
        self.mirrored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrored.is_empty()
    }

    pub fn await_parent(&mut self, node: NodeId, parent: NodeId) {
        self.awaiting_parent.retain(|awaiting| awaiting.node != node);
        self.awaiting_parent.push(AwaitingParent {
            node,
            parent,
            passes: 0,
        });
    }

    pub fn take_awaiting_parent(&mut self) -> Vec<AwaitingParent> {
        std::mem::take(&mut self.awaiting_parent)
    }

    pub fn requeue_awaiting_parent(&mut self, awaiting: AwaitingParent) {
        self.awaiting_parent.push(awaiting);
    }

    pub fn awaiting_parent_count(&self) -> usize {
        self.awaiting_parent.len()
    }

    pub fn report_orphan(&mut self) {
        self.orphans_reported += 1;
    }

    /// How many nodes have given up waiting for their parent.
    pub fn orphans_reported(&self) -> usize {
        self.orphans_reported
    }

    /// Forgets everything, returning the nodes that were materialized.
    pub fn clear(&mut self) -> Vec<(NodeId, MirroredNode)> {
        debug!(
            "Clearing the entity tracker: {} mirrored, {} pending",
            self.mirrored.len(),
            self.pending.len() + self.announced.len()
        );
        self.nodes_by_entity.clear();
        self.announced.clear();
        self.pending.clear();
        self.removals.clear();
        self.awaiting_parent.clear();
        self.mirrored.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirrored(entity: u64) -> MirroredNode {
        MirroredNode {
            entity: RenderEntity(entity),
            sim_parent: NodeId::NONE,
            linked_parent: NodeId::NONE,
            model: None,
            ray_pickable: false,
        }
    }

    #[test]
    fn announcement_is_deferred_by_one_pass() {
        let mut tracker = EntityTracker::new();
        tracker.node_added(NodeId(5));
        assert_eq!(tracker.state(NodeId(5)), NodeState::Pending);
        assert!(tracker.take_pending().is_empty());

        tracker.promote_announced();
        assert_eq!(tracker.take_pending(), vec![NodeId(5)]);
    }

    #[test]
    fn removal_cancels_same_pass_addition() {
        let mut tracker = EntityTracker::new();
        tracker.node_added(NodeId(5));
        tracker.node_removed(NodeId(5));
        tracker.promote_announced();

        assert!(tracker.take_pending().is_empty());
        assert_eq!(tracker.state(NodeId(5)), NodeState::Unseen);
    }

    #[test]
    fn addition_after_removal_keeps_both() {
        let mut tracker = EntityTracker::new();
        tracker.insert(NodeId(5), mirrored(50));

        tracker.node_removed(NodeId(5));
        tracker.node_added(NodeId(5));

        assert_eq!(tracker.take_removals(), vec![NodeId(5)]);
        tracker.promote_announced();
        assert_eq!(tracker.take_pending(), vec![NodeId(5)]);
    }

    #[test]
    fn pending_node_with_queued_removal_is_skipped() {
        let mut tracker = EntityTracker::new();
        tracker.node_added(NodeId(5));
        tracker.promote_announced();
        tracker.node_removed(NodeId(5));

        assert!(tracker.take_pending().is_empty());
    }

    #[test]
    fn reverse_lookup() {
        let mut tracker = EntityTracker::new();
        tracker.insert(NodeId(1), mirrored(10));
        tracker.insert(NodeId(2), mirrored(20));

        assert_eq!(tracker.node_for_entity(RenderEntity(20)), Some(NodeId(2)));
        assert_eq!(tracker.entity_for_node(NodeId(1)), Some(RenderEntity(10)));

        assert!(tracker.remove(NodeId(2)).is_some());
        assert_eq!(tracker.node_for_entity(RenderEntity(20)), None);
        assert!(tracker.remove(NodeId(2)).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn clear_returns_mirrored_nodes() {
        let mut tracker = EntityTracker::new();
        tracker.insert(NodeId(1), mirrored(10));
        tracker.node_added(NodeId(2));
        tracker.await_parent(NodeId(1), NodeId(3));

        let cleared = tracker.clear();
        assert_eq!(cleared.len(), 1);
        assert!(tracker.is_empty());
        assert_eq!(tracker.state(NodeId(2)), NodeState::Unseen);
        assert_eq!(tracker.awaiting_parent_count(), 0);
    }
}
