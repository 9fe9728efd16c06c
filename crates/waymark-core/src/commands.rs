//! URL tree construction from navigation commands
//!
//! ```text
//! ["/team", "33", MatrixParams{k: v}, Outlets{aux: ["chat"]}]
//!   → /team/33;k=v/(aux:chat)
//! ```
//! - a first path starting with `/` is absolute
//! - otherwise commands apply to the segments consumed up to `relative_to`
//! - `..` drops one segment, `.` is ignored
//! - an empty command list under an outlet removes that outlet

use std::collections::BTreeMap;

use crate::error::RouterError;
use crate::Result;
use waymark_state::{NodeId, RouterStateSnapshot};
use waymark_url::{Params, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// One or more `/`-separated segments.
    Path(String),
    /// Matrix parameters for the preceding segment.
    MatrixParams(Params),
    /// Commands per outlet, applied below the segments built so far.
    Outlets(BTreeMap<String, Vec<Command>>),
}

impl From<&str> for Command {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Command {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

enum Step {
    Segment(UrlSegment),
    Up,
}

struct Parsed {
    absolute: bool,
    steps: Vec<Step>,
    outlets: Option<BTreeMap<String, Vec<Command>>>,
}

fn invalid(message: impl Into<String>) -> RouterError {
    RouterError::InvalidCommand(message.into())
}

fn parse(commands: &[Command]) -> Result<Parsed> {
    let mut parsed = Parsed {
        absolute: false,
        steps: Vec::new(),
        outlets: None,
    };

    for (index, command) in commands.iter().enumerate() {
        if parsed.outlets.is_some() {
            return Err(invalid("outlets must be the last command"));
        }
        match command {
            Command::Path(path) => {
                if index == 0 && path.starts_with('/') {
                    parsed.absolute = true;
                }
                for part in path.split('/') {
                    match part {
                        "" | "." => {}
                        ".." => parsed.steps.push(Step::Up),
                        _ => parsed.steps.push(Step::Segment(UrlSegment::new(part))),
                    }
                }
            }
            Command::MatrixParams(params) => match parsed.steps.last_mut() {
                Some(Step::Segment(segment)) => {
                    segment.parameters.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                _ => return Err(invalid("matrix parameters must follow a path segment")),
            },
            Command::Outlets(outlets) => parsed.outlets = Some(outlets.clone()),
        }
    }

    Ok(parsed)
}

fn apply_steps(mut segments: Vec<UrlSegment>, steps: Vec<Step>) -> Result<Vec<UrlSegment>> {
    for step in steps {
        match step {
            Step::Segment(segment) => segments.push(segment),
            Step::Up => {
                if segments.pop().is_none() {
                    return Err(invalid("invalid number of '../'"));
                }
            }
        }
    }
    Ok(segments)
}

/// Group for one outlet entry. `None` removes the outlet.
fn outlet_group(commands: &[Command]) -> Result<Option<UrlSegmentGroup>> {
    if commands.is_empty() {
        return Ok(None);
    }
    let parsed = parse(commands)?;
    let segments = apply_steps(Vec::new(), parsed.steps)?;
    let mut group = UrlSegmentGroup::from_segments(segments);
    if let Some(outlets) = parsed.outlets {
        apply_outlets(&mut group.children, &outlets)?;
    }
    Ok(Some(group))
}

fn apply_outlets(
    children: &mut BTreeMap<String, UrlSegmentGroup>,
    outlets: &BTreeMap<String, Vec<Command>>,
) -> Result<()> {
    for (name, commands) in outlets {
        match outlet_group(commands)? {
            Some(group) => {
                children.insert(name.clone(), group);
            }
            None => {
                children.remove(name);
            }
        }
    }
    Ok(())
}

/// Outlet at the root that `relative_to` lives in, and the segments consumed
/// on the way down to it.
fn relative_base(snapshot: &RouterStateSnapshot, relative_to: NodeId) -> Result<(String, Vec<UrlSegment>)> {
    if !snapshot.tree().contains(relative_to) {
        return Err(invalid(format!("route {relative_to} is not part of the current state")));
    }

    let chain = snapshot.path_from_root(relative_to);
    let outlet = chain
        .get(1)
        .map(|route| route.outlet.clone())
        .unwrap_or_else(|| PRIMARY_OUTLET.to_string());
    let segments = chain.iter().flat_map(|route| route.url.iter().cloned()).collect();
    Ok((outlet, segments))
}

/// Builds the tree `commands` describe, starting from `current` when they are
/// relative.
pub fn create_url_tree(
    current: &UrlTree,
    snapshot: &RouterStateSnapshot,
    relative_to: Option<NodeId>,
    commands: &[Command],
    query_params: Params,
    fragment: Option<String>,
) -> Result<UrlTree> {
    if commands.is_empty() {
        return Ok(UrlTree::new(current.root.clone(), query_params, fragment));
    }

    let parsed = parse(commands)?;
    let (outlet, base, mut root) = if parsed.absolute {
        (PRIMARY_OUTLET.to_string(), Vec::new(), UrlSegmentGroup::empty())
    } else {
        let (outlet, base) = match relative_to {
            Some(id) => relative_base(snapshot, id)?,
            None => (PRIMARY_OUTLET.to_string(), Vec::new()),
        };
        (outlet, base, current.root.clone())
    };

    let moved = !parsed.steps.is_empty();
    let segments = apply_steps(base, parsed.steps)?;
    if segments.is_empty() {
        if moved {
            root.children.remove(&outlet);
        }
        if let Some(outlets) = &parsed.outlets {
            apply_outlets(&mut root.children, outlets)?;
        }
    } else {
        let mut group = UrlSegmentGroup::from_segments(segments);
        if let Some(outlets) = &parsed.outlets {
            apply_outlets(&mut group.children, outlets)?;
        }
        root.children.insert(outlet, group);
    }

    Ok(UrlTree::new(root, query_params, fragment))
}
