//! Reference tokens: `$attr(a.b)`, `$external(x)`, `$(.a.b.field)` and bare `a.b`.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{instrument, trace, warn};

use crate::attributes::{Attribute, Facet, Wrapper, ATTRIBUTES};
use crate::domain::{ModelResult, NodeId, Scalar};
use crate::tree::{CallArgs, Model};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\$(?P<facet>attr|internal|in|external|ext)\((?P<path>[A-Za-z_][\w]*(?:\.[A-Za-z_]\w*)*)\)",
        r"|\$\(\.?(?P<chain>[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\)",
        r"|\b(?P<bare>[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)+)",
    ))
    .expect("reference token pattern compiles")
});

/// One parsed reference token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Attribute lookup by (possibly dotted) name, on the given facet.
    Attribute { path: String, facet: Facet },
    /// Literal child-name walk ending in a field name.
    Chain(Vec<String>),
}

impl Reference {
    /// Parse `text` when the whole of it is one token.
    pub fn parse(text: &str) -> Option<Reference> {
        let text = text.trim();
        let caps = TOKEN.captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return None;
        }
        Some(Self::from_captures(&caps))
    }

    fn from_captures(caps: &Captures<'_>) -> Reference {
        if let (Some(facet), Some(path)) = (caps.name("facet"), caps.name("path")) {
            let facet = match facet.as_str() {
                "external" | "ext" => Facet::External,
                _ => Facet::Internal,
            };
            return Reference::Attribute {
                path: path.as_str().to_string(),
                facet,
            };
        }
        if let Some(chain) = caps.name("chain") {
            return Reference::Chain(chain.as_str().split('.').map(str::to_string).collect());
        }
        let bare = caps.name("bare").map_or("", |m| m.as_str());
        Reference::Attribute {
            path: bare.to_string(),
            facet: Facet::Internal,
        }
    }

    /// Last path segment: the attribute name, or the field name for a chain.
    pub fn target_name(&self) -> &str {
        match self {
            Reference::Attribute { path, .. } => path.rsplit('.').next().unwrap_or(path),
            Reference::Chain(segments) => segments.last().map_or("", String::as_str),
        }
    }
}

/// Every token in `text`, left to right, duplicates kept.
pub fn tokens(text: &str) -> Vec<(String, Reference)> {
    TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?.as_str().to_string();
            Some((whole, Reference::from_captures(&caps)))
        })
        .collect()
}

impl Model {
    /// Attribute named by `path`, searched in `scope` only.
    ///
    /// A leading segment equal to the scope's own name is tried dropped first.
    pub fn find_attribute(&self, scope: NodeId, path: &str) -> Option<NodeId> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() > 1 && self.name(scope).ok() == Some(segments[0]) {
            if let Some(found) = self.attribute_in(scope, &segments[1..]) {
                return Some(found);
            }
        }
        self.attribute_in(scope, &segments)
    }

    fn attribute_in(&self, scope: NodeId, segments: &[&str]) -> Option<NodeId> {
        let (name, prefix) = segments.split_last()?;
        let owner = self.walk(scope, prefix.iter().copied())?;
        let attrs = self.child(owner, ATTRIBUTES)?;
        let attr = self.child(attrs, name)?;
        self.is::<Attribute>(attr).then_some(attr)
    }

    /// Resolve `token` against `scope` alone, without climbing.
    pub fn resolve_at(&self, scope: NodeId, token: &str) -> Option<Wrapper> {
        match Reference::parse(token)? {
            Reference::Attribute { path, facet } => {
                let attr = self.find_attribute(scope, &path)?;
                Some(facet_wrapper(attr, facet))
            }
            Reference::Chain(segments) => self.resolve_chain(scope, &segments),
        }
    }

    /// Resolve `token` from `start`, then each ancestor; inner scopes win.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve_reference(&self, start: NodeId, token: &str) -> Option<Wrapper> {
        let reference = Reference::parse(token)?;
        let found = match &reference {
            Reference::Attribute { path, facet } => std::iter::once(start)
                .chain(self.ancestors(start))
                .find_map(|scope| self.find_attribute(scope, path))
                .map(|attr| facet_wrapper(attr, *facet)),
            Reference::Chain(segments) => self.resolve_chain(start, segments),
        };
        trace!("{} -> {:?}", token, found);
        found
    }

    /// Walk child names to a field.
    ///
    /// Walks start at `start` and fall back to the tree root. At either node a
    /// first segment naming the node itself is also tried dropped.
    fn resolve_chain(&self, start: NodeId, segments: &[String]) -> Option<Wrapper> {
        let (field, path) = segments.split_last()?;
        let root = self.root_of(start);
        let mut attempts: Vec<(NodeId, &[String])> = Vec::new();
        for scope in [start, root] {
            attempts.push((scope, path));
            if path.first().map(String::as_str) == self.name(scope).ok() {
                attempts.push((scope, &path[1..]));
            }
        }

        attempts.into_iter().find_map(|(scope, path)| {
            let node = self.walk(scope, path.iter().map(String::as_str))?;
            self.static_wrapper(node, field).ok()
        })
    }

    /// Current value behind `text`, or `text` itself when it is not a resolvable token.
    pub fn resolve_value(&self, start: NodeId, text: &str) -> ModelResult<Scalar> {
        match self.resolve_reference(start, text) {
            Some(wrapper) => wrapper.get(self),
            None => Ok(Scalar::Text(text.to_string())),
        }
    }

    /// Every token in `text` paired with its wrapper, or `None` when unresolved.
    pub fn extract_wrappers(&self, start: NodeId, text: &str) -> Vec<(String, Option<Wrapper>)> {
        tokens(text)
            .into_iter()
            .map(|(token, _)| {
                let wrapper = self.resolve_reference(start, &token);
                (token, wrapper)
            })
            .collect()
    }

    /// Replace each resolved token occurrence, left to right, with its current value.
    ///
    /// `wrappers` pairs with the token matches of `text` in order; a pair whose
    /// token differs from the match leaves that match verbatim.
    pub fn substitute_with_wrappers(&self, text: &str, wrappers: &[(String, Option<Wrapper>)]) -> String {
        let mut wrappers = wrappers.iter();
        TOKEN
            .replace_all(text, |caps: &Captures<'_>| {
                let token = &caps[0];
                wrappers
                    .next()
                    .filter(|(expected, _)| expected == token)
                    .and_then(|(_, wrapper)| wrapper.as_ref())
                    .and_then(|w| match w.get(self) {
                        Ok(value) => Some(value.to_string()),
                        Err(e) => {
                            warn!("Cannot read {}: {}", token, e);
                            None
                        }
                    })
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }

    pub fn substitute(&self, start: NodeId, text: &str) -> String {
        let wrappers = self.extract_wrappers(start, text);
        self.substitute_with_wrappers(text, &wrappers)
    }

    /// Rewrite resolved tokens in `text` as context names bound to their typed values.
    ///
    /// Unlike [`Model::substitute`] the values keep their type, so text values
    /// compare as text. Unresolved tokens stay verbatim.
    pub fn bind_references(&self, start: NodeId, text: &str, args: &CallArgs) -> ModelResult<(String, CallArgs)> {
        let mut context = args.clone();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (n, found) in TOKEN.find_iter(text).enumerate() {
            out.push_str(&text[cursor..found.start()]);
            match self.resolve_reference(start, found.as_str()) {
                Some(wrapper) => {
                    let name = format!("__ref{n}");
                    context.insert(name.clone(), wrapper.get(self)?);
                    out.push_str(&name);
                }
                None => out.push_str(found.as_str()),
            }
            cursor = found.end();
        }
        out.push_str(&text[cursor..]);
        Ok((out, context))
    }
}

fn facet_wrapper(attr: NodeId, facet: Facet) -> Wrapper {
    match facet {
        Facet::Internal => Wrapper::Internal(attr),
        Facet::External => Wrapper::External(attr),
    }
}
