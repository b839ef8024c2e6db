//! Route discovery and the per-generation route table.

use crate::command;
use crate::error::ProxyError;
use axum::http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Name given to the trailing wildcard when converted to a catch-all segment.
const WILDCARD_PARAM: &str = "rest";

/// A `(method, path template)` pair reported by the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoute {
    pub method: String,
    pub path: String,
}

impl ProxyRoute {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Output document of the route discovery command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteDocument {
    #[serde(default)]
    pub paths: Vec<ProxyRoute>,
}

/// Decode the first JSON document in `output`. Anything after it is ignored.
pub fn parse_routes(output: &[u8]) -> Result<Vec<ProxyRoute>, ProxyError> {
    let mut documents = serde_json::Deserializer::from_slice(output).into_iter::<RouteDocument>();
    match documents.next() {
        Some(document) => Ok(document?.paths),
        None => Err(ProxyError::EmptyOutput),
    }
}

/// Run the discovery command with `base_dir` appended and decode its output.
pub async fn discover_routes(
    command: &[String],
    base_dir: &Path,
    token: &CancellationToken,
) -> Result<Vec<ProxyRoute>, ProxyError> {
    let mut argv = command.to_vec();
    argv.push(base_dir.to_string_lossy().into_owned());
    debug!(command = ?argv, "retrieving routes");

    let stdout = command::output(&argv, Path::new("."), token)
        .await
        .map_err(|source| ProxyError::Discover {
            command: argv.clone(),
            source,
        })?;
    parse_routes(&stdout)
}

/// Outcome of a route lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    /// Forward to the generation; carries the matched template
    Matched(&'a str),
    /// The path is known, but not for this method
    MethodNotAllowed,
    /// No route; use the catch-all target if there is one
    NotFound,
}

/// A reported path template compiled for matching.
///
/// Parameters are renamed positionally (`{p0}`, `{p1}`, ...) so templates
/// that differ only in parameter names or patterns share one matchit
/// entry. Patterns are kept as anchored regexes checked after matching.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    /// The template in matchit syntax
    pub matchit: String,
    /// Parameter name and anchored pattern, for constrained parameters
    pub constraints: Vec<(String, Regex)>,
}

impl RouteTemplate {
    /// Compile a template such as `/users/{id:[0-9]+}` or `/static/*`.
    pub fn parse(path: &str) -> Result<Self, regex::Error> {
        let mut matchit = String::with_capacity(path.len() + WILDCARD_PARAM.len());
        let mut constraints = Vec::new();
        let mut params = 0;
        let mut chars = path.chars();
        while let Some(c) = chars.next() {
            if c != '{' {
                matchit.push(c);
                continue;
            }
            let mut pattern = String::new();
            let mut depth = 1;
            let mut in_pattern = false;
            for c in chars.by_ref() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    ':' if depth == 1 && !in_pattern => {
                        in_pattern = true;
                        continue;
                    }
                    _ => {}
                }
                if in_pattern {
                    pattern.push(c);
                }
            }

            let name = format!("p{params}");
            params += 1;
            if !pattern.is_empty() {
                constraints.push((name.clone(), anchored(&pattern)?));
            }
            matchit.push('{');
            matchit.push_str(&name);
            matchit.push('}');
        }
        if matchit.ends_with('*') {
            matchit.pop();
            matchit.push_str(&format!("{{*{WILDCARD_PARAM}}}"));
        }
        Ok(Self {
            matchit,
            constraints,
        })
    }

    /// Whether every constrained parameter satisfies its pattern.
    fn accepts(&self, params: &matchit::Params<'_, '_>) -> bool {
        self.constraints
            .iter()
            .all(|(name, re)| params.get(name).is_some_and(|value| re.is_match(value)))
    }
}

/// Match the whole segment, also for alternations like `a|b`.
fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
    let pattern = pattern.strip_suffix('$').unwrap_or(pattern);
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Templates sharing one matchit entry, tried in report order.
#[derive(Debug, Default)]
struct Candidates(Vec<(String, RouteTemplate)>);

#[derive(Default)]
struct MethodRoutes {
    router: matchit::Router<usize>,
    slots: HashMap<String, usize>,
    candidates: Vec<Candidates>,
}

impl MethodRoutes {
    /// Returns false if the route duplicates or conflicts with another.
    fn insert(&mut self, path: &str, template: RouteTemplate) -> bool {
        let mut keys = vec![template.matchit.clone()];
        // A trailing wildcard also matches its bare prefix.
        if let Some(prefix) = template.matchit.strip_suffix(&format!("{{*{WILDCARD_PARAM}}}")) {
            keys.push(prefix.to_string());
        }

        let slot = match self.slots.get(&template.matchit) {
            Some(&slot) => {
                if self.candidates[slot].0.iter().any(|(p, _)| p == path) {
                    debug!(path = %path, "skipping duplicate route");
                    return false;
                }
                slot
            }
            None => {
                let slot = self.candidates.len();
                if let Err(e) = self.router.insert(keys[0].clone(), slot) {
                    debug!(path = %path, error = %e, "skipping route");
                    return false;
                }
                for key in &keys[1..] {
                    let _ = self.router.insert(key.clone(), slot);
                }
                self.slots.insert(template.matchit.clone(), slot);
                self.candidates.push(Candidates::default());
                slot
            }
        };
        self.candidates[slot].0.push((path.to_string(), template));
        true
    }

    fn find(&self, path: &str) -> Option<&str> {
        let matched = self.router.at(path).ok()?;
        self.candidates[*matched.value]
            .0
            .iter()
            .find(|(_, template)| template.accepts(&matched.params))
            .map(|(path, _)| path.as_str())
    }
}

/// Immutable method + path matcher built once per generation.
#[derive(Default)]
pub struct RouteTable {
    by_method: HashMap<Method, MethodRoutes>,
    len: usize,
}

impl RouteTable {
    /// Build the table. Invalid methods or patterns and conflicting
    /// templates are skipped.
    pub fn new(routes: &[ProxyRoute]) -> Self {
        let mut table = Self::default();
        for route in routes {
            let Ok(method) = Method::from_bytes(route.method.as_bytes()) else {
                warn!(
                    method = %route.method,
                    path = %route.path,
                    "skipping route with invalid method"
                );
                continue;
            };
            let template = match RouteTemplate::parse(&route.path) {
                Ok(template) => template,
                Err(e) => {
                    warn!(path = %route.path, error = %e, "skipping route with invalid pattern");
                    continue;
                }
            };
            if table.by_method.entry(method).or_default().insert(&route.path, template) {
                table.len += 1;
            }
        }
        table
    }

    /// Number of routes registered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        if let Some(template) = self.by_method.get(method).and_then(|routes| routes.find(path)) {
            return RouteMatch::Matched(template);
        }
        let other_method = self
            .by_method
            .iter()
            .any(|(m, routes)| m != method && routes.find(path).is_some());
        if other_method {
            RouteMatch::MethodNotAllowed
        } else {
            RouteMatch::NotFound
        }
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("methods", &self.by_method.keys().collect::<Vec<_>>())
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes() {
        let output = concat!(
            r#"{"paths":[{"method":"GET","path":"/ping"},"#,
            r#"{"method":"POST","path":"/users/{id}"}]}"#,
        );
        let output = output.as_bytes();
        let routes = parse_routes(output).unwrap();
        assert_eq!(
            routes,
            [ProxyRoute::new("GET", "/ping"), ProxyRoute::new("POST", "/users/{id}")]
        );
    }

    #[test]
    fn test_parse_routes_decodes_first_document_only() {
        let output = b"{\"paths\":[{\"method\":\"GET\",\"path\":\"/a\"}]}\n{\"paths\":[]}\n";
        assert_eq!(parse_routes(output).unwrap(), [ProxyRoute::new("GET", "/a")]);

        let output = b"{\"paths\":[]} trailing garbage";
        assert!(parse_routes(output).unwrap().is_empty());
    }

    #[test]
    fn test_parse_routes_errors() {
        assert!(matches!(parse_routes(b"  \n"), Err(ProxyError::EmptyOutput)));
        assert!(matches!(parse_routes(b"not json"), Err(ProxyError::Decode(_))));
        // Missing "paths" is an empty route list.
        assert!(parse_routes(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_route_template_matchit_syntax() {
        let matchit = |path| RouteTemplate::parse(path).unwrap().matchit;
        assert_eq!(matchit("/ping"), "/ping");
        assert_eq!(matchit("/users/{id}"), "/users/{p0}");
        assert_eq!(matchit("/users/{id:[0-9]+}"), "/users/{p0}");
        assert_eq!(matchit("/d/{code:[a-z]{3}}/x/{y}"), "/d/{p0}/x/{p1}");
        assert_eq!(matchit("/static/*"), "/static/{*rest}");
    }

    #[test]
    fn test_route_template_constraints() {
        let template = RouteTemplate::parse("/d/{code:[a-z]{3}}/{n}").unwrap();
        assert_eq!(template.constraints.len(), 1);
        let (name, re) = &template.constraints[0];
        assert_eq!(name, "p0");
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abcd"));

        let alternation = RouteTemplate::parse("/{kind:a|b}").unwrap();
        let (_, re) = &alternation.constraints[0];
        assert!(re.is_match("b"));
        assert!(!re.is_match("ab"));

        assert!(RouteTemplate::parse("/bad/{id:[0-9}").is_err());
    }

    #[test]
    fn test_lookup() {
        let table = RouteTable::new(&[
            ProxyRoute::new("GET", "/ping"),
            ProxyRoute::new("GET", "/users/{id:[0-9]+}"),
            ProxyRoute::new("DELETE", "/users/{id:[0-9]+}"),
            ProxyRoute::new("GET", "/assets/*"),
        ]);
        assert_eq!(table.len(), 4);

        assert_eq!(table.lookup(&Method::GET, "/ping"), RouteMatch::Matched("/ping"));
        assert_eq!(
            table.lookup(&Method::DELETE, "/users/42"),
            RouteMatch::Matched("/users/{id:[0-9]+}")
        );
        assert_eq!(
            table.lookup(&Method::GET, "/assets/js/app.js"),
            RouteMatch::Matched("/assets/*")
        );
        assert_eq!(table.lookup(&Method::GET, "/assets/"), RouteMatch::Matched("/assets/*"));
        assert_eq!(table.lookup(&Method::POST, "/ping"), RouteMatch::MethodNotAllowed);
        assert_eq!(table.lookup(&Method::GET, "/other"), RouteMatch::NotFound);
    }

    #[test]
    fn test_pattern_mismatch_falls_through() {
        let table = RouteTable::new(&[
            ProxyRoute::new("GET", "/users/{id:[0-9]+}"),
            ProxyRoute::new("DELETE", "/items/{id:[0-9]+}"),
        ]);
        assert_eq!(table.lookup(&Method::GET, "/users/abc"), RouteMatch::NotFound);
        assert_eq!(table.lookup(&Method::GET, "/items/abc"), RouteMatch::NotFound);
        assert_eq!(table.lookup(&Method::GET, "/items/7"), RouteMatch::MethodNotAllowed);
    }

    #[test]
    fn test_patterns_at_same_position_are_both_kept() {
        let table = RouteTable::new(&[
            ProxyRoute::new("GET", "/x/{id:[0-9]+}"),
            ProxyRoute::new("GET", "/x/{name:[a-z]+}"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(&Method::GET, "/x/12"), RouteMatch::Matched("/x/{id:[0-9]+}"));
        assert_eq!(table.lookup(&Method::GET, "/x/ab"), RouteMatch::Matched("/x/{name:[a-z]+}"));
        assert_eq!(table.lookup(&Method::GET, "/x/A-1"), RouteMatch::NotFound);
    }

    #[test]
    fn test_duplicate_and_invalid_routes_are_skipped() {
        let table = RouteTable::new(&[
            ProxyRoute::new("GET", "/ping"),
            ProxyRoute::new("GET", "/ping"),
            ProxyRoute::new("GE T", "/bad"),
            ProxyRoute::new("GET", "/broken/{id:[0-9}"),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(&Method::GET, "/bad"), RouteMatch::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_routes_appends_base_dir() {
        // `echo` prints its arguments; the base dir lands after the JSON.
        let command = vec![
            "echo".to_string(),
            r#"{"paths":[{"method":"GET","path":"/ping"}]}"#.to_string(),
        ];
        let routes = discover_routes(&command, Path::new("/srv/app"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(routes, [ProxyRoute::new("GET", "/ping")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_routes_failure() {
        let command = vec!["false".to_string()];
        let err = discover_routes(&command, Path::new("."), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Discover { .. }));
    }
}
