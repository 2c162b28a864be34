//! Property tests for the backward driver over random DAGs.

use afinar::autograd::{backward, sum, BackwardOp, Data, FeedbackContext, Variable};
use afinar::Result;
use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Node;

impl Data for Node {
    fn datatype(&self) -> &str {
        "Node"
    }

    fn json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Copies the node's feedback onto every input and logs the call
struct Relay {
    inputs: Vec<Variable>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl BackwardOp for Relay {
    async fn backward(&self, node: &Variable, ctx: &FeedbackContext) -> Result<()> {
        self.log.lock().unwrap().push(node.name().to_string());
        for input in &self.inputs {
            ctx.append(input, node.feedback());
        }
        Ok(())
    }
}

/// Lower-triangular adjacency: `edges[i][j]` with `j < i` means node `i`
/// consumes node `j`
fn arb_dag() -> impl Strategy<Value = Vec<Vec<bool>>> {
    (1usize..12).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n)
    })
}

struct Graph {
    nodes: Vec<Variable>,
    preds: Vec<Vec<usize>>,
    log: Arc<Mutex<Vec<String>>>,
}

fn build(edges: &[Vec<bool>]) -> Graph {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut nodes: Vec<Variable> = Vec::new();
    let mut preds = Vec::new();
    for (i, row) in edges.iter().enumerate() {
        let mine: Vec<usize> = (0..i).filter(|&j| row[j]).collect();
        let inputs: Vec<Variable> = mine.iter().map(|&j| nodes[j].clone()).collect();
        let node = if inputs.is_empty() {
            Variable::leaf(format!("n{i}"), Node, true).erase()
        } else {
            let node = Variable::named(format!("n{i}"), Node, inputs.clone(), true).unwrap();
            node.set_backward_op(Arc::new(Relay {
                inputs,
                log: Arc::clone(&log),
            }))
            .unwrap();
            node.erase()
        };
        nodes.push(node);
        preds.push(mine);
    }
    Graph { nodes, preds, log }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_each_closure_runs_once_after_its_consumers(edges in arb_dag()) {
        let graph = build(&edges);
        let root = sum(&graph.nodes);
        root.append_feedback("F");

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(backward(&root.erase())).unwrap();

        let log = graph.log.lock().unwrap().clone();
        let position: HashMap<&str, usize> =
            log.iter().enumerate().map(|(i, name)| (name.as_str(), i)).collect();

        let with_ops = graph.preds.iter().filter(|p| !p.is_empty()).count();
        prop_assert_eq!(log.len(), with_ops);
        prop_assert_eq!(position.len(), with_ops);

        // A consumer's closure runs before any of its inputs' closures
        for (i, mine) in graph.preds.iter().enumerate() {
            for &j in mine {
                let name_i = format!("n{i}");
                let name_j = format!("n{j}");
                if let (Some(ci), Some(cj)) = (position.get(name_i.as_str()), position.get(name_j.as_str())) {
                    prop_assert!(ci < cj);
                }
            }
        }
    }

    #[test]
    fn prop_leaf_feedback_counts_paths(edges in arb_dag()) {
        let graph = build(&edges);
        let root = sum(&graph.nodes);
        root.append_feedback("F");

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(backward(&root.erase())).unwrap();

        // paths[i]: number of distinct paths from the root down to node i
        let n = graph.nodes.len();
        let mut paths = vec![1usize; n];
        for i in (0..n).rev() {
            for &j in &graph.preds[i] {
                paths[j] += paths[i];
            }
        }

        for (i, node) in graph.nodes.iter().enumerate() {
            if graph.preds[i].is_empty() {
                prop_assert_eq!(node.feedback().len(), paths[i]);
            } else {
                // Intermediates are drained once propagated
                prop_assert!(node.feedback().is_empty());
            }
        }
    }
}
