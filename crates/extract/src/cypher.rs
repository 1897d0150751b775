//! Turns the model's generated Cypher into plain edge triples.
//!
//! The statements are never executed. Only node patterns carrying a `name`
//! property and relationship patterns between them are understood; anything
//! else in a statement is ignored.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// (source name, raw relationship type, target name)
pub type RawEdge = (String, String, String);

fn node_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\(\s*(\w*)\s*((?::\s*`?\w+`?\s*)*)\{[^{}]*?\bname\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")[^{}]*\}\s*\)"#,
        )
        .expect("static regex")
    })
}

fn rel_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\(\s*(\w+)\s*\)\s*(<)?-\s*\[\s*\w*\s*:\s*`?(\w+)`?\s*(?:\{[^}]*\})?\s*\]\s*-(>)?\s*\(\s*(\w+)\s*\)",
        )
        .expect("static regex")
    })
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract every edge described by a list of generated statements.
///
/// Variable bindings are resolved within a statement first and then against
/// bindings seen in earlier statements, since models often declare a node once
/// and reuse its variable later.
pub fn parse_edges(statements: &[String]) -> Vec<RawEdge> {
    let mut global: HashMap<String, String> = HashMap::new();
    let mut edges = Vec::new();

    for statement in statements {
        let mut local: HashMap<String, String> = HashMap::new();
        let mut anonymous = 0usize;

        // Replace inline node patterns with bare variables so relationship
        // patterns only have to match `(var)`.
        let simplified = node_pattern().replace_all(statement, |caps: &Captures| {
            let name = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map(|m| unescape(m.as_str()))
                .unwrap_or_default();
            let var = match caps.get(1).map(|m| m.as_str()).filter(|v| !v.is_empty()) {
                Some(v) => v.to_string(),
                None => {
                    anonymous += 1;
                    format!("__anon{}", anonymous)
                }
            };
            local.insert(var.clone(), name);
            format!("({})", var)
        });

        let resolve = |var: &str| -> Option<String> {
            local.get(var).or_else(|| global.get(var)).cloned()
        };

        // Walk chained patterns like (a)-[:R]->(b)-[:S]->(c) by restarting
        // each search at the target node of the previous match.
        let mut pos = 0;
        while let Some(caps) = rel_pattern().captures_at(&simplified, pos) {
            let (Some(whole), Some(target_var)) = (caps.get(0), caps.get(5)) else {
                break;
            };
            pos = simplified[..target_var.start()]
                .rfind('(')
                .filter(|&p| p > whole.start())
                .unwrap_or(whole.end());

            let left = &caps[1];
            let rel_type = caps[3].to_string();
            let right = &caps[5];
            let incoming = caps.get(2).is_some() && caps.get(4).is_none();

            let (Some(left_name), Some(right_name)) = (resolve(left), resolve(right)) else {
                continue;
            };

            if incoming {
                edges.push((right_name, rel_type, left_name));
            } else {
                edges.push((left_name, rel_type, right_name));
            }
        }

        global.extend(local);
    }

    edges
}
