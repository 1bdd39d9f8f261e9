//! Graph-store adapter contract.
//!
//! The engines never hold references between nodes; every traversal goes
//! through a [`GraphStore`] by [`NodeKey`]. Writes happen inside
//! [`GraphStore::run_transaction`], whose boundary is the unit of atomicity.

pub mod memory;

use crate::error::{StoreError, StoreResult};
use crate::models::{Attribute, AttributeCategory, FeedbackType, Movie, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use memory::InMemoryGraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    User,
    Movie,
    Genre,
    Director,
    Actor,
    Season,
}

impl NodeLabel {
    pub fn for_category(category: AttributeCategory) -> Self {
        match category {
            AttributeCategory::Genre => NodeLabel::Genre,
            AttributeCategory::Director => NodeLabel::Director,
            AttributeCategory::Actor => NodeLabel::Actor,
            AttributeCategory::Season => NodeLabel::Season,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::User => "User",
            NodeLabel::Movie => "Movie",
            NodeLabel::Genre => "Genre",
            NodeLabel::Director => "Director",
            NodeLabel::Actor => "Actor",
            NodeLabel::Season => "Season",
        }
    }
}

/// Identity of a node: ids for users and movies, names for attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeKey {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(NodeLabel::User, id)
    }

    pub fn movie(id: impl Into<String>) -> Self {
        Self::new(NodeLabel::Movie, id)
    }

    pub fn attribute(category: AttributeCategory, name: impl Into<String>) -> Self {
        Self::new(NodeLabel::for_category(category), name)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label.as_str(), self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    User(User),
    Movie(Movie),
    Attribute(Attribute),
}

impl Node {
    pub fn key(&self) -> NodeKey {
        match self {
            Node::User(user) => NodeKey::user(&user.id),
            Node::Movie(movie) => NodeKey::movie(&movie.id),
            Node::Attribute(attr) => NodeKey::attribute(attr.category, &attr.name),
        }
    }

    pub fn as_movie(&self) -> Option<&Movie> {
        match self {
            Node::Movie(movie) => Some(movie),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Node::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn into_movie(self) -> Option<Movie> {
        match self {
            Node::Movie(movie) => Some(movie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Interacted,
    HasGenre,
    DirectedBy,
    HasActor,
    AppropriateForSeason,
    UserGenrePreference,
    UserDirectorPreference,
    UserActorPreference,
    UserSeasonPreference,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Interacted => "INTERACTED",
            EdgeType::HasGenre => "HAS_GENRE",
            EdgeType::DirectedBy => "DIRECTED_BY",
            EdgeType::HasActor => "HAS_ACTOR",
            EdgeType::AppropriateForSeason => "APPROPRIATE_FOR_SEASON",
            EdgeType::UserGenrePreference => "USER_GENRE_PREFERENCE",
            EdgeType::UserDirectorPreference => "USER_DIRECTOR_PREFERENCE",
            EdgeType::UserActorPreference => "USER_ACTOR_PREFERENCE",
            EdgeType::UserSeasonPreference => "USER_SEASON_PREFERENCE",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// An edge is unique per `(from, edge_type, to)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub edge_type: EdgeType,
    pub weight: f64,
    pub feedback: Option<FeedbackType>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Edge {
    pub fn new(from: NodeKey, to: NodeKey, edge_type: EdgeType, weight: f64) -> Self {
        Self {
            from,
            to,
            edge_type,
            weight,
            feedback: None,
            timestamp: None,
        }
    }
}

/// A node reached through an edge, together with that edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub node: Node,
    pub edge: Edge,
}

/// Operations available inside a single store transaction.
pub trait Transaction {
    fn find_node(&self, key: &NodeKey) -> Option<Node>;

    fn match_neighbors(&self, key: &NodeKey, edge_type: EdgeType, direction: Direction) -> Vec<Neighbor>;

    /// Fails with `DuplicateNode` when the key is already taken.
    fn create_node(&mut self, node: Node) -> StoreResult<()>;

    /// Read-or-create. Returns the stored node and whether it was created.
    fn merge_node(&mut self, node: Node) -> StoreResult<(Node, bool)>;

    /// Read-or-create keyed by `(from, edge_type, to)`; a new edge starts at `initial_weight`.
    fn merge_edge(
        &mut self,
        from: &NodeKey,
        to: &NodeKey,
        edge_type: EdgeType,
        initial_weight: f64,
    ) -> StoreResult<Edge>;

    /// Overwrites the properties of an existing edge.
    fn set_edge(&mut self, edge: Edge) -> StoreResult<Edge>;
}

#[async_trait::async_trait]
pub trait GraphStore: Send + Sync + 'static {
    async fn find_node(&self, key: &NodeKey) -> StoreResult<Option<Node>>;

    async fn match_neighbors(
        &self,
        key: &NodeKey,
        edge_type: EdgeType,
        direction: Direction,
    ) -> StoreResult<Vec<Neighbor>>;

    async fn nodes_by_label(&self, label: NodeLabel) -> StoreResult<Vec<Node>>;

    /// Runs every step inside one transaction. An `Err` from `steps` leaves no trace.
    async fn run_transaction<T, F>(&self, steps: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transaction) -> StoreResult<T> + Send + 'static;
}

/// Store access with a per-call deadline.
///
/// Dropping the future on expiry aborts an in-flight transaction before it commits.
pub struct StoreHandle<S: GraphStore> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: GraphStore> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: GraphStore> StoreHandle<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.store
    }

    async fn deadline<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    pub async fn find_node(&self, key: &NodeKey) -> StoreResult<Option<Node>> {
        self.deadline(self.store.find_node(key)).await
    }

    pub async fn match_neighbors(
        &self,
        key: &NodeKey,
        edge_type: EdgeType,
        direction: Direction,
    ) -> StoreResult<Vec<Neighbor>> {
        self.deadline(self.store.match_neighbors(key, edge_type, direction))
            .await
    }

    pub async fn nodes_by_label(&self, label: NodeLabel) -> StoreResult<Vec<Node>> {
        self.deadline(self.store.nodes_by_label(label)).await
    }

    pub async fn run_transaction<T, F>(&self, steps: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transaction) -> StoreResult<T> + Send + 'static,
    {
        self.deadline(self.store.run_transaction(steps)).await
    }
}
