use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};

/// Names reachable from `root` by following directed links (root included)
pub fn reachable_from(root: &str, links: &[(String, String)]) -> HashSet<String> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    let root_idx = graph.add_node(root);
    index.insert(root, root_idx);

    for (source, target) in links {
        let s = *index
            .entry(source.as_str())
            .or_insert_with(|| graph.add_node(source.as_str()));
        let t = *index
            .entry(target.as_str())
            .or_insert_with(|| graph.add_node(target.as_str()));
        graph.add_edge(s, t, ());
    }

    let mut reachable = HashSet::new();
    let mut dfs = Dfs::new(&graph, root_idx);
    while let Some(idx) = dfs.next(&graph) {
        reachable.insert(graph[idx].to_string());
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_follows_direction() {
        let links = vec![link("f", "root"), link("root", "a"), link("a", "b"), link("c", "root")];
        let reachable = reachable_from("f", &links);

        assert!(reachable.contains("f"));
        assert!(reachable.contains("b"));
        assert!(!reachable.contains("c"));
    }

    #[test]
    fn test_isolated_root() {
        let reachable = reachable_from("alone", &[]);
        assert_eq!(reachable.len(), 1);
    }
}
