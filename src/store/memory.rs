use super::{Direction, Edge, EdgeType, GraphStore, Neighbor, Node, NodeKey, NodeLabel, Transaction};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    from: NodeKey,
    edge_type: EdgeType,
    to: NodeKey,
}

impl EdgeKey {
    fn of(edge: &Edge) -> Self {
        Self {
            from: edge.from.clone(),
            edge_type: edge.edge_type,
            to: edge.to.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeKey, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
    outgoing: BTreeMap<(NodeKey, EdgeType), BTreeSet<NodeKey>>,
    incoming: BTreeMap<(NodeKey, EdgeType), BTreeSet<NodeKey>>,
}

impl GraphState {
    fn neighbors(&self, key: &NodeKey, edge_type: EdgeType, direction: Direction) -> Vec<Neighbor> {
        let index = match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        };
        let Some(targets) = index.get(&(key.clone(), edge_type)) else {
            return Vec::new();
        };

        targets
            .iter()
            .filter_map(|other| {
                let edge_key = match direction {
                    Direction::Outgoing => EdgeKey {
                        from: key.clone(),
                        edge_type,
                        to: other.clone(),
                    },
                    Direction::Incoming => EdgeKey {
                        from: other.clone(),
                        edge_type,
                        to: key.clone(),
                    },
                };
                let edge = self.edges.get(&edge_key)?;
                let node = self.nodes.get(other)?;
                Some(Neighbor {
                    node: node.clone(),
                    edge: edge.clone(),
                })
            })
            .collect()
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.outgoing
            .entry((edge.from.clone(), edge.edge_type))
            .or_default()
            .insert(edge.to.clone());
        self.incoming
            .entry((edge.to.clone(), edge.edge_type))
            .or_default()
            .insert(edge.from.clone());
        self.edges.insert(EdgeKey::of(&edge), edge);
    }

    fn remove_edge(&mut self, key: &EdgeKey) {
        self.edges.remove(key);
        if let Some(set) = self.outgoing.get_mut(&(key.from.clone(), key.edge_type)) {
            set.remove(&key.to);
        }
        if let Some(set) = self.incoming.get_mut(&(key.to.clone(), key.edge_type)) {
            set.remove(&key.from);
        }
    }
}

enum Undo {
    RemoveNode(NodeKey),
    RemoveEdge(EdgeKey),
    RestoreEdge(Edge),
}

struct MemoryTransaction<'a> {
    state: &'a mut GraphState,
    undo: Vec<Undo>,
}

impl MemoryTransaction<'_> {
    fn rollback(mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::RemoveNode(key) => {
                    self.state.nodes.remove(&key);
                }
                Undo::RemoveEdge(key) => self.state.remove_edge(&key),
                Undo::RestoreEdge(edge) => {
                    self.state.edges.insert(EdgeKey::of(&edge), edge);
                }
            }
        }
    }

    fn require_node(&self, key: &NodeKey) -> StoreResult<()> {
        if self.state.nodes.contains_key(key) {
            Ok(())
        } else {
            Err(StoreError::MissingNode(key.to_string()))
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn find_node(&self, key: &NodeKey) -> Option<Node> {
        self.state.nodes.get(key).cloned()
    }

    fn match_neighbors(&self, key: &NodeKey, edge_type: EdgeType, direction: Direction) -> Vec<Neighbor> {
        self.state.neighbors(key, edge_type, direction)
    }

    fn create_node(&mut self, node: Node) -> StoreResult<()> {
        let key = node.key();
        if self.state.nodes.contains_key(&key) {
            return Err(StoreError::DuplicateNode(key.to_string()));
        }
        self.state.nodes.insert(key.clone(), node);
        self.undo.push(Undo::RemoveNode(key));
        Ok(())
    }

    fn merge_node(&mut self, node: Node) -> StoreResult<(Node, bool)> {
        let key = node.key();
        if let Some(existing) = self.state.nodes.get(&key) {
            return Ok((existing.clone(), false));
        }
        self.create_node(node.clone())?;
        Ok((node, true))
    }

    fn merge_edge(
        &mut self,
        from: &NodeKey,
        to: &NodeKey,
        edge_type: EdgeType,
        initial_weight: f64,
    ) -> StoreResult<Edge> {
        self.require_node(from)?;
        self.require_node(to)?;

        let key = EdgeKey {
            from: from.clone(),
            edge_type,
            to: to.clone(),
        };
        if let Some(existing) = self.state.edges.get(&key) {
            return Ok(existing.clone());
        }

        let edge = Edge::new(from.clone(), to.clone(), edge_type, initial_weight);
        self.state.insert_edge(edge.clone());
        self.undo.push(Undo::RemoveEdge(key));
        Ok(edge)
    }

    fn set_edge(&mut self, edge: Edge) -> StoreResult<Edge> {
        let key = EdgeKey::of(&edge);
        let Some(previous) = self.state.edges.get(&key).cloned() else {
            return Err(StoreError::MissingEdge(format!(
                "{} -[{}]-> {}",
                edge.from, edge.edge_type, edge.to
            )));
        };
        self.state.edges.insert(key, edge.clone());
        self.undo.push(Undo::RestoreEdge(previous));
        Ok(edge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub nodes: usize,
    pub edges: usize,
}

/// Process-local graph store with serialised transactions.
///
/// A transaction holds the write lock for its whole body; an `Err` replays
/// the undo log so none of its steps stay visible.
#[derive(Debug)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
    available: AtomicBool,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates a lost connection; every call fails with `Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        if !available {
            warn!("In-memory graph store marked unavailable");
        }
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            nodes: state.nodes.len(),
            edges: state.edges.len(),
        }
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> Vec<Edge> {
        self.state
            .read()
            .edges
            .values()
            .filter(|edge| edge.edge_type == edge_type)
            .cloned()
            .collect()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn find_node(&self, key: &NodeKey) -> StoreResult<Option<Node>> {
        self.check_available()?;
        Ok(self.state.read().nodes.get(key).cloned())
    }

    async fn match_neighbors(
        &self,
        key: &NodeKey,
        edge_type: EdgeType,
        direction: Direction,
    ) -> StoreResult<Vec<Neighbor>> {
        self.check_available()?;
        Ok(self.state.read().neighbors(key, edge_type, direction))
    }

    async fn nodes_by_label(&self, label: NodeLabel) -> StoreResult<Vec<Node>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state
            .nodes
            .iter()
            .filter(|(key, _)| key.label == label)
            .map(|(_, node)| node.clone())
            .collect())
    }

    async fn run_transaction<T, F>(&self, steps: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transaction) -> StoreResult<T> + Send + 'static,
    {
        self.check_available()?;
        let mut state = self.state.write();
        let mut tx = MemoryTransaction {
            state: &mut *state,
            undo: Vec::new(),
        };

        match steps(&mut tx) {
            Ok(value) => {
                debug!("Committed transaction with {} writes", tx.undo.len());
                Ok(value)
            }
            Err(err) => {
                debug!("Rolling back transaction with {} writes: {}", tx.undo.len(), err);
                tx.rollback();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribute, AttributeCategory, Movie, User};

    fn seeded() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        tokio_test::block_on(store.run_transaction(|tx| {
            tx.create_node(Node::User(User::new("u1")))?;
            tx.create_node(Node::Movie(Movie::new("m1", "Heat")))?;
            tx.create_node(Node::Attribute(Attribute {
                category: AttributeCategory::Genre,
                name: "Crime".to_string(),
            }))?;
            Ok(())
        }))
        .unwrap();
        store
    }

    #[test]
    fn test_merge_edge_is_unique_per_endpoint_pair() {
        let store = seeded();
        let user = NodeKey::user("u1");
        let movie = NodeKey::movie("m1");

        for _ in 0..3 {
            let (u, m) = (user.clone(), movie.clone());
            tokio_test::block_on(store.run_transaction(move |tx| {
                tx.merge_edge(&u, &m, EdgeType::Interacted, 0.0)
            }))
            .unwrap();
        }

        assert_eq!(store.edges_of_type(EdgeType::Interacted).len(), 1);
        let incoming = tokio_test::block_on(store.match_neighbors(
            &movie,
            EdgeType::Interacted,
            Direction::Incoming,
        ))
        .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].node.key(), user);
    }

    #[test]
    fn test_failed_transaction_rolls_back_every_step() {
        let store = seeded();
        let before = store.stats();

        let result = tokio_test::block_on(store.run_transaction(|tx| {
            let user = NodeKey::user("u1");
            let genre = NodeKey::attribute(AttributeCategory::Genre, "Crime");
            let edge = tx.merge_edge(&user, &genre, EdgeType::UserGenrePreference, 0.0)?;
            tx.set_edge(Edge { weight: 0.5, ..edge })?;
            tx.create_node(Node::User(User::new("u2")))?;
            tx.merge_edge(&user, &NodeKey::movie("missing"), EdgeType::Interacted, 0.0)
        }));

        assert!(matches!(result, Err(StoreError::MissingNode(_))));
        assert_eq!(store.stats(), before);
        let prefs = tokio_test::block_on(store.match_neighbors(
            &NodeKey::user("u1"),
            EdgeType::UserGenrePreference,
            Direction::Outgoing,
        ))
        .unwrap();
        assert!(prefs.is_empty());
    }

    #[test]
    fn test_set_edge_rolls_back_to_previous_weight() {
        let store = seeded();
        let user = NodeKey::user("u1");
        let genre = NodeKey::attribute(AttributeCategory::Genre, "Crime");

        let (u, g) = (user.clone(), genre.clone());
        tokio_test::block_on(store.run_transaction(move |tx| {
            let edge = tx.merge_edge(&u, &g, EdgeType::UserGenrePreference, 0.0)?;
            tx.set_edge(Edge { weight: 0.3, ..edge })
        }))
        .unwrap();

        let (u, g) = (user.clone(), genre.clone());
        let result: StoreResult<()> = tokio_test::block_on(store.run_transaction(move |tx| {
            let edge = tx.merge_edge(&u, &g, EdgeType::UserGenrePreference, 0.0)?;
            tx.set_edge(Edge { weight: 9.0, ..edge })?;
            Err(StoreError::Unavailable("abort".to_string()))
        }));
        assert!(result.is_err());

        let edges = store.edges_of_type(EdgeType::UserGenrePreference);
        assert_eq!(edges.len(), 1);
        assert!((edges[0].weight - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_store_fails_reads() {
        let store = seeded();
        store.set_available(false);
        let result = tokio_test::block_on(store.find_node(&NodeKey::user("u1")));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert!(tokio_test::block_on(store.find_node(&NodeKey::user("u1")))
            .unwrap()
            .is_some());
    }
}
