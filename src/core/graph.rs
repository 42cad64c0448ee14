//! Operation graph for a single expression.
//!
//! The syntax tree is flattened into a petgraph `DiGraph` whose nodes are
//! [`Operation`]s and whose edges point from a dependency to the operation
//! consuming its result. Nodes are added in post-order, so the node index of
//! an operation is always its [`OperationId`].

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::operation::{Operand, Operation, OperationId, OperationStatus, Operator, Side};
use crate::parser::Expr;

/// Arena of operations for one expression.
pub struct OperationGraph {
    graph: DiGraph<Operation, Side>,
    /// Final value of the expression: a literal, or the root operation.
    root: Operand,
}

impl OperationGraph {
    /// Flatten a parsed expression into operations.
    ///
    /// Each binary node becomes one operation. Literal leaves, and unary
    /// minus applied to a literal, fold into operand values. Unary minus over
    /// a subexpression becomes `-1 * <subexpression>`.
    pub fn from_expr(expr: &Expr) -> Self {
        let mut graph = DiGraph::new();
        let root = lower(expr, &mut graph);
        Self { graph, root }
    }

    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        self.graph.node_weight(NodeIndex::new(id.index()))
    }

    pub fn get_mut(&mut self, id: OperationId) -> Option<&mut Operation> {
        self.graph.node_weight_mut(NodeIndex::new(id.index()))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Root operation, or `None` for a bare literal.
    pub fn root(&self) -> Option<OperationId> {
        match self.root {
            Operand::Result(id) => Some(id),
            Operand::Value(_) => None,
        }
    }

    /// Value of a bare-literal expression.
    pub fn literal(&self) -> Option<f64> {
        self.root.value()
    }

    /// All operations in identifier order.
    pub fn operations(&self) -> Vec<&Operation> {
        self.graph.node_weights().collect()
    }

    /// Operations that consume the result of `id`, ascending.
    pub fn dependents(&self, id: OperationId) -> Vec<OperationId> {
        let mut ids: Vec<OperationId> = self
            .graph
            .neighbors_directed(NodeIndex::new(id.index()), Direction::Outgoing)
            .map(|index| OperationId(index.index() as u32))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Mark every pending operation with two literal operands as ready.
    ///
    /// Returns the identifiers that changed, ascending.
    pub fn ready_operations(&mut self) -> Vec<OperationId> {
        let mut ready = Vec::new();
        for op in self.graph.node_weights_mut() {
            if op.status == OperationStatus::Pending && op.operands_resolved() {
                op.mark_ready();
                ready.push(op.id);
            }
        }
        ready
    }

    /// Record `value` as the result of `id` and substitute it into every
    /// dependent.
    ///
    /// Returns the dependents that became ready, ascending, or `None` if `id`
    /// is not in the graph.
    pub fn complete(&mut self, id: OperationId, value: f64) -> Option<Vec<OperationId>> {
        self.get_mut(id)?.complete(value);

        let mut newly_ready = Vec::new();
        for dependent in self.dependents(id) {
            if let Some(op) = self.get_mut(dependent) {
                if op.resolve(id, value) {
                    newly_ready.push(dependent);
                }
            }
        }
        Some(newly_ready)
    }

    /// Mark `id` failed. Returns `false` if `id` is not in the graph.
    pub fn fail(&mut self, id: OperationId, reason: &str) -> bool {
        match self.get_mut(id) {
            Some(op) => {
                op.fail(reason);
                true
            }
            None => false,
        }
    }
}

fn lower(expr: &Expr, graph: &mut DiGraph<Operation, Side>) -> Operand {
    match expr {
        Expr::Number { value, .. } => Operand::Value(*value),
        Expr::Negate { operand, .. } => match expr.literal_value() {
            Some(value) => Operand::Value(value),
            None => {
                let inner = lower(operand, graph);
                push(graph, Operator::Multiply, Operand::Value(-1.0), inner)
            }
        },
        Expr::Binary { op, lhs, rhs, .. } => {
            let left = lower(lhs, graph);
            let right = lower(rhs, graph);
            push(graph, *op, left, right)
        }
    }
}

fn push(
    graph: &mut DiGraph<Operation, Side>,
    operator: Operator,
    left: Operand,
    right: Operand,
) -> Operand {
    let id = OperationId(graph.node_count() as u32);
    let index = graph.add_node(Operation::new(id, operator, left, right));

    for (operand, side) in [(left, Side::Left), (right, Side::Right)] {
        if let Operand::Result(dependency) = operand {
            graph.add_edge(NodeIndex::new(dependency.index()), index, side);
        }
    }

    Operand::Result(id)
}

impl std::fmt::Display for OperationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for op in self.graph.node_weights() {
            writeln!(f, "{}", op)?;
        }
        write!(f, "root: {}", self.root)
    }
}

impl std::fmt::Debug for OperationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGraph")
            .field("operations", &self.len())
            .field("root", &self.root)
            .finish()
    }
}
