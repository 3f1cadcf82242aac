//! Route gating policy
//!
//! Maps the current route and the gate's closed state to a navigation
//! decision. Performing the redirect is left to the caller's router.

use serde::Serialize;

/// How a path relates to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// The page shown while closed
    Closed,
    /// A page that must not be shown while closed
    Gated,
    /// A page the gate does not track
    Untracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationDecision {
    NoAction,
    RedirectToOpen,
    RedirectToClosed,
}

/// Pure decision table
pub fn decide(route: RouteKind, closed: bool) -> NavigationDecision {
    match (route, closed) {
        (RouteKind::Closed, false) => NavigationDecision::RedirectToOpen,
        (RouteKind::Gated, true) => NavigationDecision::RedirectToClosed,
        _ => NavigationDecision::NoAction,
    }
}

/// Strip query, fragment and trailing slash from a request path
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(|c| c == '?' || c == '#').unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatingPolicy {
    open_route: String,
    closed_route: String,
    /// `None` gates every route except the closed one
    gated_routes: Option<Vec<String>>,
}

impl Default for GatingPolicy {
    fn default() -> Self {
        Self::new("/", "/closed", None)
    }
}

impl GatingPolicy {
    pub fn new(open_route: &str, closed_route: &str, gated_routes: Option<Vec<String>>) -> Self {
        Self {
            open_route: normalize_path(open_route).to_string(),
            closed_route: normalize_path(closed_route).to_string(),
            gated_routes: gated_routes.map(|routes| {
                routes
                    .iter()
                    .map(|r| normalize_path(r).to_string())
                    .collect()
            }),
        }
    }

    pub fn open_route(&self) -> &str {
        &self.open_route
    }

    pub fn closed_route(&self) -> &str {
        &self.closed_route
    }

    pub fn classify(&self, path: &str) -> RouteKind {
        let path = normalize_path(path);
        if path == self.closed_route {
            return RouteKind::Closed;
        }
        match &self.gated_routes {
            None => RouteKind::Gated,
            Some(routes) if routes.iter().any(|r| r == path) => RouteKind::Gated,
            Some(_) => RouteKind::Untracked,
        }
    }

    pub fn decide(&self, path: &str, closed: bool) -> NavigationDecision {
        decide(self.classify(path), closed)
    }

    /// Route the router should navigate to, if any
    pub fn target(&self, decision: NavigationDecision) -> Option<&str> {
        match decision {
            NavigationDecision::NoAction => None,
            NavigationDecision::RedirectToOpen => Some(&self.open_route),
            NavigationDecision::RedirectToClosed => Some(&self.closed_route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked_policy() -> GatingPolicy {
        GatingPolicy::new(
            "/",
            "/closed",
            Some(vec!["/".to_string(), "/other-gated".to_string(), "/lab".to_string()]),
        )
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(decide(RouteKind::Closed, false), NavigationDecision::RedirectToOpen);
        assert_eq!(decide(RouteKind::Closed, true), NavigationDecision::NoAction);
        assert_eq!(decide(RouteKind::Gated, true), NavigationDecision::RedirectToClosed);
        assert_eq!(decide(RouteKind::Gated, false), NavigationDecision::NoAction);
        assert_eq!(decide(RouteKind::Untracked, true), NavigationDecision::NoAction);
        assert_eq!(decide(RouteKind::Untracked, false), NavigationDecision::NoAction);
    }

    #[test]
    fn test_closed_route_while_open_redirects_to_open() {
        let policy = tracked_policy();
        let decision = policy.decide("/closed", false);
        assert_eq!(decision, NavigationDecision::RedirectToOpen);
        assert_eq!(policy.target(decision), Some("/"));
    }

    #[test]
    fn test_gated_route_while_closed_redirects_to_closed() {
        let policy = tracked_policy();
        let decision = policy.decide("/other-gated", true);
        assert_eq!(decision, NavigationDecision::RedirectToClosed);
        assert_eq!(policy.target(decision), Some("/closed"));
    }

    #[test]
    fn test_closed_route_while_closed_stays() {
        let policy = tracked_policy();
        assert_eq!(policy.decide("/closed", true), NavigationDecision::NoAction);
        assert_eq!(policy.target(NavigationDecision::NoAction), None);
    }

    #[test]
    fn test_untracked_route_ignored() {
        let policy = tracked_policy();
        assert_eq!(policy.classify("/archive"), RouteKind::Untracked);
        assert_eq!(policy.decide("/archive", true), NavigationDecision::NoAction);
    }

    #[test]
    fn test_default_policy_gates_everything_but_closed() {
        let policy = GatingPolicy::default();
        assert_eq!(policy.classify("/anything"), RouteKind::Gated);
        assert_eq!(policy.classify("/"), RouteKind::Gated);
        assert_eq!(policy.classify("/closed"), RouteKind::Closed);
    }

    #[test]
    fn test_paths_are_normalized() {
        let policy = tracked_policy();
        assert_eq!(policy.classify("/closed/"), RouteKind::Closed);
        assert_eq!(policy.classify("/closed?from=lab"), RouteKind::Closed);
        assert_eq!(policy.classify("/lab#top"), RouteKind::Gated);
        assert_eq!(policy.classify(""), RouteKind::Gated); // normalizes to "/"
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(normalize_path("/a?x=1"), "/a");
        assert_eq!(normalize_path("?x=1"), "/");
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let json = serde_json::to_string(&NavigationDecision::RedirectToClosed).unwrap();
        assert_eq!(json, "\"redirectToClosed\"");
    }
}
