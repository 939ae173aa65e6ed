//! Ordered path-to-backend routing.
//!
//! Each route lists glob patterns over the request path: `*` matches any run
//! of characters (including `/`) and `?` matches exactly one character.
//! `[...]` classes and `{a,b}` alternations follow globset syntax; `\` escapes
//! a metacharacter. Routes are tried top to bottom and the first match wins,
//! even if a later route would also match.

use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use url::Url;

use crate::Error;
use crate::config::{ConfigError, RouteConfig};

/// Origin server a route forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    base: Url,
}

impl Backend {
    /// Parse a backend base address; only absolute `http`/`https` URLs are accepted.
    pub fn parse(address: &str) -> Result<Self, Error> {
        let base = Url::parse(address).map_err(|e| Error::InvalidUrl(format!("{address}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") || !base.has_host() {
            return Err(Error::InvalidUrl(format!("{address}: backend must be an http(s) URL")));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())
    }
}

/// Maps a request path to the backend that serves it.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Option<&Backend>;
}

/// One route: a set of globs sharing a backend.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    globs: Vec<GlobMatcher>,
    backend: Backend,
}

impl RoutePattern {
    pub fn new<S: AsRef<str>>(patterns: &[S], backend: Backend) -> Result<Self, globset::Error> {
        let globs = patterns
            .iter()
            .map(|p| compile_glob(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { globs, backend })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.globs.iter().any(|glob| glob.is_match(path))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

/// Ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RoutePattern>,
}

impl RouteTable {
    pub fn new(routes: Vec<RoutePattern>) -> Self {
        Self { routes }
    }

    /// Build the table from configuration, preserving order.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, ConfigError> {
        let routes = routes
            .iter()
            .enumerate()
            .map(|(index, route)| {
                let invalid = |reason: String| ConfigError::Invalid { field: format!("routes[{index}]"), reason };
                let backend = Backend::parse(&route.backend).map_err(|e| invalid(e.to_string()))?;
                RoutePattern::new(&route.patterns, backend).map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, path: &str) -> Option<&Backend> {
        self.routes.iter().find(|route| route.matches(path)).map(RoutePattern::backend)
    }
}

/// Compile a path glob; `*` and `?` cross `/`.
fn compile_glob(glob: &str) -> Result<GlobMatcher, globset::Error> {
    let glob = GlobBuilder::new(glob).literal_separator(false).backslash_escape(true).build()?;
    Ok(glob.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(address: &str) -> Backend {
        Backend::parse(address).unwrap()
    }

    fn table(routes: &[(&str, &str)]) -> RouteTable {
        RouteTable::new(
            routes
                .iter()
                .map(|&(glob, address)| RoutePattern::new(&[glob], backend(address)).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_first_matching_route_wins() {
        let routes = table(&[("/foo*", "http://first:3000"), ("/*", "http://second:3000")]);
        assert_eq!(routes.resolve("/foobar").unwrap().base().host_str(), Some("first"));
        assert_eq!(routes.resolve("/other").unwrap().base().host_str(), Some("second"));
    }

    #[test]
    fn test_order_is_significant() {
        let routes = table(&[("/*", "http://catchall:3000"), ("/foo*", "http://specific:3000")]);
        assert_eq!(routes.resolve("/foo").unwrap().base().host_str(), Some("catchall"));
    }

    #[test]
    fn test_no_match() {
        let routes = table(&[("/api/*", "http://api:3000")]);
        assert!(routes.resolve("/index.html").is_none());
        assert!(RouteTable::default().resolve("/").is_none());
    }

    #[test]
    fn test_glob_semantics() {
        let glob = compile_glob("/foobar*").unwrap();
        assert!(glob.is_match("/foobar"));
        assert!(glob.is_match("/foobar/deep/path"));
        assert!(!glob.is_match("/foo"));

        let glob = compile_glob("/page?.html").unwrap();
        assert!(glob.is_match("/page1.html"));
        assert!(!glob.is_match("/page12.html"));
        assert!(!glob.is_match("/pageXhtml"));
    }

    #[test]
    fn test_glob_treats_regex_metacharacters_literally() {
        let glob = compile_glob("/a+b(c).$").unwrap();
        assert!(glob.is_match("/a+b(c).$"));
        assert!(!glob.is_match("/aab(c)x$"));

        let glob = compile_glob(r"/raw/\[x\]").unwrap();
        assert!(glob.is_match("/raw/[x]"));
        assert!(!glob.is_match("/raw/x"));
    }

    #[test]
    fn test_glob_classes_and_alternations() {
        let glob = compile_glob("/v[12]/*").unwrap();
        assert!(glob.is_match("/v1/users"));
        assert!(!glob.is_match("/v3/users"));

        let glob = compile_glob("/{foo,bar}*").unwrap();
        assert!(glob.is_match("/foo/x"));
        assert!(glob.is_match("/barbaz"));
        assert!(!glob.is_match("/baz"));
    }

    #[test]
    fn test_any_glob_in_route_matches() {
        let route = RoutePattern::new(&["/foo", "/bar"], backend("http://a:1")).unwrap();
        let routes = RouteTable::new(vec![route]);
        assert!(routes.resolve("/foo").is_some());
        assert!(routes.resolve("/bar").is_some());
        assert!(routes.resolve("/baz").is_none());
    }

    #[test]
    fn test_from_config() {
        let config = vec![
            RouteConfig { patterns: vec!["/foo*".into()], backend: "http://localhost:3000".into() },
            RouteConfig { patterns: vec!["/*".into()], backend: "https://cdn.example.com/app".into() },
        ];
        let routes = RouteTable::from_config(&config).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes.resolve("/x").unwrap().to_string(), "https://cdn.example.com/app");
    }

    #[test]
    fn test_from_config_rejects_bad_backend() {
        let config = vec![RouteConfig { patterns: vec!["/*".into()], backend: "mailto:ops@example.com".into() }];
        let result = RouteTable::from_config(&config);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "routes[0]"));
    }

    #[test]
    fn test_from_config_rejects_bad_glob() {
        let config = vec![
            RouteConfig { patterns: vec!["/*".into()], backend: "http://a:1".into() },
            RouteConfig { patterns: vec!["/[unclosed".into()], backend: "http://b:1".into() },
        ];
        let result = RouteTable::from_config(&config);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "routes[1]"));
    }
}
