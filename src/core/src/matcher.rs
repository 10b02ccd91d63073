/* src/core/src/matcher.rs */

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::errors::PyraError;
use crate::route::Route;

/// Trie node. The three slots make match priority structural: the static
/// map is tried before the dynamic child before the catch-all, at every
/// level, with no post-sorting.
#[derive(Debug, Default)]
struct Node {
  statics: BTreeMap<String, Node>,
  dynamic: Option<Box<DynamicChild>>,
  catch_all: Option<CatchAllChild>,
  terminal: Option<String>,
}

#[derive(Debug)]
struct DynamicChild {
  param: String,
  node: Node,
}

#[derive(Debug)]
struct CatchAllChild {
  param: String,
  route_id: String,
}

/// A successful URL match: the terminal route plus bound parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
  pub route: Arc<Route>,
  pub params: HashMap<String, String>,
}

/// The route graph: classified routes indexed by id, plus the URL trie.
/// Read-only once built; the dev server swaps whole graphs atomically.
#[derive(Debug, Default)]
pub struct RouteGraph {
  routes: HashMap<String, Arc<Route>>,
  root: Node,
}

impl RouteGraph {
  pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Result<Self, PyraError> {
    let mut graph = Self::default();
    for route in routes {
      graph.insert(route)?;
    }
    Ok(graph)
  }

  pub fn lookup(&self, id: &str) -> Option<&Arc<Route>> {
    self.routes.get(id)
  }

  pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
    self.routes.values()
  }

  pub fn len(&self) -> usize {
    self.routes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.routes.is_empty()
  }

  fn insert(&mut self, route: Route) -> Result<(), PyraError> {
    let id = route.id.clone();
    let pattern = route.pattern.clone();
    if self.routes.contains_key(&id) {
      return Err(PyraError::scan(format!("duplicate route id \"{id}\"")));
    }

    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let mut node = &mut self.root;
    let mut placed = false;

    for (idx, segment) in segments.iter().enumerate() {
      if let Some(param) = segment.strip_prefix('*') {
        if idx != segments.len() - 1 {
          return Err(PyraError::scan(format!(
            "catch-all segment must be last in pattern \"{pattern}\""
          )));
        }
        if let Some(existing) = &node.catch_all {
          return Err(PyraError::scan(format!(
            "conflicting catch-all at \"{pattern}\": already bound by route \"{}\"",
            existing.route_id
          )));
        }
        node.catch_all = Some(CatchAllChild { param: param.to_string(), route_id: id.clone() });
        placed = true;
        break;
      }
      if let Some(param) = segment.strip_prefix(':') {
        let child = node
          .dynamic
          .get_or_insert_with(|| Box::new(DynamicChild { param: param.to_string(), node: Node::default() }));
        if child.param != param {
          return Err(PyraError::scan(format!(
            "conflicting parameter names \":{param}\" vs \":{}\" at the same position in \"{pattern}\"",
            child.param
          )));
        }
        node = &mut child.node;
        continue;
      }
      node = node.statics.entry((*segment).to_string()).or_default();
    }

    if !placed {
      if let Some(existing) = &node.terminal {
        return Err(PyraError::scan(format!(
          "pattern \"{pattern}\" collides with route \"{existing}\""
        )));
      }
      node.terminal = Some(id.clone());
    }

    self.routes.insert(id, Arc::new(route));
    Ok(())
  }

  /// Match a request path. Trailing slash is stripped unless the path is
  /// exactly `/`; matching is case-sensitive.
  pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
    let normalized = normalize_path(path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let mut params = HashMap::new();
    let route_id = match_node(&self.root, &segments, &mut params)?;
    let route = self.routes.get(&route_id)?.clone();
    Some(RouteMatch { route, params })
  }
}

fn normalize_path(path: &str) -> &str {
  if path.len() > 1 { path.trim_end_matches('/') } else { path }
}

fn match_node(node: &Node, segments: &[&str], params: &mut HashMap<String, String>) -> Option<String> {
  let Some((head, rest)) = segments.split_first() else {
    return node.terminal.clone();
  };

  // 1. exact static child
  if let Some(child) = node.statics.get(*head)
    && let Some(id) = match_node(child, rest, params)
  {
    return Some(id);
  }

  // 2. dynamic child, backtracking on miss
  if let Some(dynamic) = &node.dynamic {
    params.insert(dynamic.param.clone(), (*head).to_string());
    if let Some(id) = match_node(&dynamic.node, rest, params) {
      return Some(id);
    }
    params.remove(&dynamic.param);
  }

  // 3. catch-all consumes everything that remains
  if let Some(catch_all) = &node.catch_all {
    params.insert(catch_all.param.clone(), segments.join("/"));
    return Some(catch_all.route_id.clone());
  }

  None
}
