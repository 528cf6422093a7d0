//! Boolean network model
//!
//! A model is a list of `Node = rule;` statements. Comments run from `//`
//! or `#` to the end of the line. Nodes may be referenced before they are
//! defined; state bit `i` is the `i`-th node in definition order.

use std::collections::HashMap;

use crate::engine::{EngineError, NodePolicy};
use super::expr::{is_identifier, parse_expr, Expr};

/// Largest network a `u64` state can hold
pub const MAX_NODES: usize = 64;

/// Parsed network: node names and their update rules
#[derive(Debug, Clone)]
pub struct Network {
    names: Vec<String>,
    rules: Vec<Expr>,
    index: HashMap<String, usize>,
}

impl Network {
    /// Parse model text, resolving repeated definitions with `policy`
    pub fn parse(text: &str, policy: NodePolicy) -> Result<Self, EngineError> {
        // First pass: collect the rule texts per node
        let mut names: Vec<String> = Vec::new();
        let mut sources: Vec<Vec<String>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for statement in strip_comments(text).split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            let (name, rule) = statement.split_once('=').ok_or_else(|| {
                EngineError::Parse(format!("expected `Node = rule` in {:?}", statement))
            })?;
            let (name, rule) = (name.trim(), rule.trim());
            if !is_identifier(name) {
                return Err(EngineError::Parse(format!("invalid node name {:?}", name)));
            }

            match (index.get(name), policy) {
                (None, _) => {
                    if names.len() == MAX_NODES {
                        return Err(EngineError::Parse(format!(
                            "more than {} nodes",
                            MAX_NODES
                        )));
                    }
                    index.insert(name.to_string(), names.len());
                    names.push(name.to_string());
                    sources.push(vec![rule.to_string()]);
                }
                (Some(_), NodePolicy::Strict) => {
                    return Err(EngineError::Parse(format!("node {} defined twice", name)));
                }
                (Some(&i), NodePolicy::Override) => {
                    tracing::debug!("Node {} redefined, overriding", name);
                    sources[i] = vec![rule.to_string()];
                }
                (Some(&i), NodePolicy::Augment) => {
                    tracing::debug!("Node {} redefined, augmenting", name);
                    sources[i].push(rule.to_string());
                }
            }
        }

        if names.is_empty() {
            return Err(EngineError::Parse("network defines no nodes".to_string()));
        }

        // Second pass: compile rules now that every name is known
        let resolve = |n: &str| index.get(n).copied();
        let mut rules = Vec::with_capacity(names.len());
        for (name, texts) in names.iter().zip(&sources) {
            let mut compiled = texts.iter().map(|t| {
                parse_expr(t, &resolve)
                    .map_err(|e| EngineError::Parse(format!("rule of {}: {}", name, e)))
            });
            // Augmented definitions are OR-ed together
            let mut rule = compiled
                .next()
                .unwrap_or_else(|| Ok(Expr::Const(false)))?;
            for next in compiled {
                rule = rule.or(next?);
            }
            rules.push(rule);
        }

        Ok(Self {
            names,
            rules,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Value node `i` is driven towards in `state`
    pub fn target(&self, i: usize, state: u64) -> bool {
        self.rules[i].eval(state)
    }

    /// Synchronous successor of `state`
    pub fn next_state(&self, state: u64) -> u64 {
        (0..self.len()).fold(0, |next, i| {
            if self.target(i, state) {
                next | 1 << i
            } else {
                next
            }
        })
    }

    /// Nodes whose rule disagrees with their current value
    pub fn unstable_nodes(&self, state: u64) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.target(i, state) != ((state >> i) & 1 == 1))
            .collect()
    }

    pub fn is_fixed_point(&self, state: u64) -> bool {
        self.next_state(state) == state
    }

    /// Active node names joined with ` -- `, or `<nil>`
    pub fn format_state(&self, state: u64) -> String {
        let active: Vec<&str> = self
            .names
            .iter()
            .enumerate()
            .filter(|(i, _)| (state >> i) & 1 == 1)
            .map(|(_, n)| n.as_str())
            .collect();
        if active.is_empty() {
            "<nil>".to_string()
        } else {
            active.join(" -- ")
        }
    }
}

/// Remove `//` and `#` comments
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| {
            let cut = [line.find("//"), line.find('#')]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(line.len());
            &line[..cut]
        })
        .collect::<Vec<_>>()
        .join("\n")
}
