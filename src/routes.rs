//! Route table entries and the filters applied when enumerating them.
//!
//! A route maps an HTTP verb and a path template to a handler action. Path templates use
//! `:name` for path parameters and `(.:name)` for an optional format-style segment:
//!
//! ```text
//! GET /api/v1/books/:book_id(.:format)  ->  BooksController#show
//! ```
//!
//! Rendered paths use brace notation instead: `/books/{book_id}.{format}`.

use crate::endpoints::relative_path;
use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// HTTP verbs a route may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl Verb {
    /// Key used for the verb under a path entry of the document
    pub fn key(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::Options => "options",
            Verb::Head => "head",
        }
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "get" => Ok(Verb::Get),
            "post" => Ok(Verb::Post),
            "put" => Ok(Verb::Put),
            "patch" => Ok(Verb::Patch),
            "delete" => Ok(Verb::Delete),
            "options" => Ok(Verb::Options),
            "head" => Ok(Verb::Head),
            _ => Err(format!("Unknown HTTP verb: {}", s)),
        }
    }
}

impl TryFrom<String> for Verb {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key().to_uppercase())
    }
}

/// One entry of the application's route table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Route {
    pub verb: Verb,
    /// Full path template, e.g. `/api/v1/books/:book_id`
    pub path: String,
    /// Name of the handler registered in the metadata registry
    pub handler: String,
    pub action: String,
    /// Route name, used in warnings when present
    #[serde(default)]
    pub name: Option<String>,
}

impl Route {
    pub fn new(verb: Verb, path: &str, handler: &str, action: &str) -> Self {
        Self {
            verb,
            path: path.to_string(),
            handler: handler.to_string(),
            action: action.to_string(),
            name: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Names of the path parameters in the template, in order of appearance.
    pub fn path_params(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find(':') {
            rest = &rest[start + 1..];
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let name = &rest[..len];
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = &rest[len..];
        }
        names
    }

    /// The path relative to `base_path` with parameters in brace notation.
    pub fn rendered_path(&self, base_path: &str) -> Result<String> {
        let mut rendered = relative_path(&self.path, base_path);
        for name in self.path_params() {
            let escaped = regex::escape(&name);
            let segment = compile(&format!(r"(^|/):{}($|/|\()", escaped))?;
            rendered = segment
                .replace_all(&rendered, |caps: &Captures| format!("{}{{{}}}{}", &caps[1], name, &caps[2]))
                .into_owned();
            let optional = compile(&format!(r"\(\.:{}\)", escaped))?;
            rendered = optional
                .replace_all(&rendered, format!(".{{{}}}", name).as_str())
                .into_owned();
        }
        Ok(rendered)
    }

    /// Label used when reporting problems with this route
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => format!("'{}'", name),
            _ => format!("{} {}", self.verb, self.path),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Restricts which routes under a base path are documented.
///
/// Filters see the route path relative to its base path.
pub enum PathFilter {
    Exact(String),
    Pattern(Regex),
    Set(Vec<String>),
    Predicate(Box<dyn Fn(&str, &Route) -> bool>),
}

impl PathFilter {
    /// Exact relative path; a missing leading `/` is added.
    pub fn exact(path: &str) -> Self {
        if path.starts_with('/') {
            PathFilter::Exact(path.to_string())
        } else {
            PathFilter::Exact(format!("/{}", path))
        }
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        compile(pattern).map(PathFilter::Pattern)
    }

    pub fn set<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PathFilter::Set(paths.into_iter().map(Into::into).collect())
    }

    pub fn predicate(f: impl Fn(&str, &Route) -> bool + 'static) -> Self {
        PathFilter::Predicate(Box::new(f))
    }

    pub fn matches(&self, relative_path: &str, route: &Route) -> bool {
        match self {
            PathFilter::Exact(path) => path == relative_path,
            PathFilter::Pattern(regex) => regex.is_match(relative_path),
            PathFilter::Set(paths) => paths.iter().any(|p| p == relative_path),
            PathFilter::Predicate(f) => f(relative_path, route),
        }
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFilter::Exact(path) => f.debug_tuple("Exact").field(path).finish(),
            PathFilter::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            PathFilter::Set(paths) => f.debug_tuple("Set").field(paths).finish(),
            PathFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
