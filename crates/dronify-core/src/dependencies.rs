//! Derived-field dependency graph.
//!
//! Each stored derived field declares the fields it is computed from. After a
//! write, the store hands the set of fields it changed to
//! [`DependencyGraph::dependents`] and recomputes the returned fields in the
//! given order, which is a topological order of the graph: a derived field
//! always comes after every derived field it reads.
//!
//! The flight declarations are:
//!
//! ```text
//! package.weight_kg ─┐
//! package.flight_id ─┴─> flight.total_weight_kg ─┐
//! flight.pilot_id ───────────────────────────────┼─> flight.consumption_percent
//! contact.is_vip ────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::error::{DronifyError, Result};

/// A record field that takes part in derived-field recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// `package.weight_kg`
    PackageWeight,
    /// `package.flight_id`
    PackageFlight,
    /// `contact.is_vip`
    ContactVip,
    /// `flight.pilot_id`
    FlightPilot,
    /// `flight.total_weight_kg` (derived)
    FlightTotalWeight,
    /// `flight.consumption_percent` (derived)
    FlightConsumption,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PackageWeight => "package.weight_kg",
            Self::PackageFlight => "package.flight_id",
            Self::ContactVip => "contact.is_vip",
            Self::FlightPilot => "flight.pilot_id",
            Self::FlightTotalWeight => "flight.total_weight_kg",
            Self::FlightConsumption => "flight.consumption_percent",
        })
    }
}

/// Builder collecting derived-field declarations.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    declarations: Vec<(Field, Vec<Field>)>,
}

impl DependencyGraphBuilder {
    /// Declare that `derived` must be recomputed whenever any of `inputs` changes.
    #[must_use]
    pub fn derive(mut self, derived: Field, inputs: &[Field]) -> Self {
        self.declarations.push((derived, inputs.to_vec()));
        self
    }

    /// Freeze the declarations.
    ///
    /// # Errors
    ///
    /// Returns [`DronifyError::DependencyCycle`] if a field depends on itself,
    /// directly or through other derived fields.
    pub fn build(self) -> Result<DependencyGraph> {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut inputs = HashMap::new();

        let mut node = |graph: &mut DiGraph<Field, ()>, field: Field| {
            *nodes
                .entry(field)
                .or_insert_with(|| graph.add_node(field))
        };

        for (derived, fields) in &self.declarations {
            let target = node(&mut graph, *derived);
            for input in fields {
                let source = node(&mut graph, *input);
                graph.update_edge(source, target, ());
            }
            inputs
                .entry(*derived)
                .or_insert_with(Vec::new)
                .extend(fields.iter().copied());
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| DronifyError::DependencyCycle(graph[cycle.node_id()].to_string()))?;

        Ok(DependencyGraph {
            graph,
            order,
            inputs,
        })
    }
}

/// Frozen, acyclic set of derived-field declarations.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<Field, ()>,
    order: Vec<NodeIndex>,
    inputs: HashMap<Field, Vec<Field>>,
}

impl DependencyGraph {
    /// Start declaring derived fields.
    #[must_use]
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::default()
    }

    /// Declarations for flight weight and consumption.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in declarations; the signature mirrors
    /// [`DependencyGraphBuilder::build`].
    pub fn flight_metrics() -> Result<Self> {
        Self::builder()
            .derive(
                Field::FlightTotalWeight,
                &[Field::PackageWeight, Field::PackageFlight],
            )
            .derive(
                Field::FlightConsumption,
                &[Field::FlightTotalWeight, Field::FlightPilot, Field::ContactVip],
            )
            .build()
    }

    /// Fields `derived` is declared to read.
    #[must_use]
    pub fn inputs_of(&self, derived: Field) -> &[Field] {
        self.inputs.get(&derived).map_or(&[], Vec::as_slice)
    }

    /// Whether `field` is a derived field.
    #[must_use]
    pub fn is_derived(&self, field: Field) -> bool {
        self.inputs.contains_key(&field)
    }

    /// Derived fields to recompute after `changed` were written, in
    /// recomputation order.
    ///
    /// A changed field is only included if it is reachable from another
    /// changed field.
    pub fn dependents(&self, changed: impl IntoIterator<Item = Field>) -> Vec<Field> {
        let index: HashMap<Field, NodeIndex> = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx], idx))
            .collect();

        let mut reached = HashSet::new();
        for field in changed {
            let Some(&start) = index.get(&field) else {
                continue;
            };
            for next in self.graph.neighbors(start) {
                let mut dfs = Dfs::new(&self.graph, next);
                while let Some(idx) = dfs.next(&self.graph) {
                    reached.insert(idx);
                }
            }
        }

        self.order
            .iter()
            .filter(|idx| reached.contains(idx))
            .map(|&idx| self.graph[idx])
            .collect()
    }
}
