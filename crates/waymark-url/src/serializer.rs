//! URL parsing and printing
//!
//! Grammar handled by [`DefaultUrlSerializer`]:
//! ```text
//! /team;k=v/33(aux:chat//side:help)?q=1#top
//! ```
//! - `;k=v`: matrix parameters of the preceding segment
//! - `(name:path//other:path)`: named outlets
//! - `?a=1&b=2`: query parameters (last value wins)
//! - `#frag`: fragment

use std::collections::BTreeMap;
use url::form_urlencoded;

use crate::encoding::{decode, encode_fragment, encode_query, encode_segment};
use crate::error::UrlError;
use crate::tree::{Params, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};
use crate::Result;

/// Converts between URL strings and [`UrlTree`]s.
pub trait UrlSerializer: Send + Sync {
    fn parse(&self, url: &str) -> Result<UrlTree>;

    fn serialize(&self, tree: &UrlTree) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlSerializer;

impl DefaultUrlSerializer {
    pub fn serialize_segment(segment: &UrlSegment) -> String {
        let mut out = encode_segment(&segment.path);
        for (key, value) in &segment.parameters {
            out.push(';');
            out.push_str(&encode_segment(key));
            out.push('=');
            out.push_str(&encode_segment(value));
        }
        out
    }

    fn serialize_paths(group: &UrlSegmentGroup) -> String {
        group
            .segments
            .iter()
            .map(Self::serialize_segment)
            .collect::<Vec<_>>()
            .join("/")
    }

    fn serialize_group(group: &UrlSegmentGroup, root: bool) -> String {
        if !group.has_children() {
            return Self::serialize_paths(group);
        }

        if root {
            let primary = group
                .primary()
                .map(|p| Self::serialize_group(p, false))
                .unwrap_or_default();
            let named: Vec<String> = group
                .outlets()
                .into_iter()
                .filter(|(name, _)| *name != PRIMARY_OUTLET)
                .map(|(name, child)| format!("{}:{}", name, Self::serialize_group(child, false)))
                .collect();

            if named.is_empty() {
                primary
            } else {
                format!("{}({})", primary, named.join("//"))
            }
        } else {
            let children: Vec<String> = group
                .outlets()
                .into_iter()
                .map(|(name, child)| {
                    if name == PRIMARY_OUTLET {
                        Self::serialize_group(child, false)
                    } else {
                        format!("{}:{}", name, Self::serialize_group(child, false))
                    }
                })
                .collect();

            if group.number_of_children() == 1 && group.primary().is_some() {
                format!("{}/{}", Self::serialize_paths(group), children[0])
            } else {
                format!("{}/({})", Self::serialize_paths(group), children.join("//"))
            }
        }
    }

    fn serialize_query(params: &Params) -> String {
        if params.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", encode_query(k), encode_query(v)))
            .collect();
        format!("?{}", pairs.join("&"))
    }
}

impl UrlSerializer for DefaultUrlSerializer {
    fn parse(&self, url: &str) -> Result<UrlTree> {
        let mut parser = UrlParser::new(url);
        let root = parser.parse_root_segment()?;
        let query_params = parser.parse_query_params();
        let fragment = parser.parse_fragment();
        Ok(UrlTree::new(root, query_params, fragment))
    }

    fn serialize(&self, tree: &UrlTree) -> String {
        let mut out = format!("/{}", Self::serialize_group(&tree.root, true));
        out.push_str(&Self::serialize_query(&tree.query_params));
        if let Some(fragment) = &tree.fragment {
            out.push('#');
            out.push_str(&encode_fragment(fragment));
        }
        out
    }
}

/// Prefix of `input` up to the first byte in `stop`.
fn match_until<'a>(input: &'a str, stop: &[char]) -> &'a str {
    let end = input.find(|c: char| stop.contains(&c)).unwrap_or(input.len());
    &input[..end]
}

fn match_segment(input: &str) -> &str {
    match_until(input, &['/', '(', ')', '?', ';', '#'])
}

fn match_matrix_key(input: &str) -> &str {
    match_until(input, &['/', '(', ')', '?', ';', '=', '#'])
}

struct UrlParser<'a> {
    url: &'a str,
    remaining: &'a str,
}

impl<'a> UrlParser<'a> {
    fn new(url: &'a str) -> Self {
        Self {
            url,
            remaining: url,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> UrlError {
        UrlError::Malformed {
            url: self.url.to_string(),
            reason: reason.into(),
        }
    }

    fn peek_starts_with(&self, prefix: &str) -> bool {
        self.remaining.starts_with(prefix)
    }

    fn consume_optional(&mut self, prefix: &str) -> bool {
        if self.peek_starts_with(prefix) {
            self.remaining = &self.remaining[prefix.len()..];
            true
        } else {
            false
        }
    }

    fn capture(&mut self, prefix: &str) -> Result<()> {
        if !self.consume_optional(prefix) {
            return Err(self.malformed(format!("expected '{}'", prefix)));
        }
        Ok(())
    }

    fn parse_root_segment(&mut self) -> Result<UrlSegmentGroup> {
        self.consume_optional("/");

        if self.remaining.is_empty() || self.peek_starts_with("?") || self.peek_starts_with("#") {
            return Ok(UrlSegmentGroup::empty());
        }

        Ok(UrlSegmentGroup::new(Vec::new(), self.parse_children()?))
    }

    fn parse_children(&mut self) -> Result<BTreeMap<String, UrlSegmentGroup>> {
        if self.remaining.is_empty() {
            return Ok(BTreeMap::new());
        }

        self.consume_optional("/");

        let mut segments = Vec::new();
        if !self.peek_starts_with("(") {
            segments.push(self.parse_segment()?);
        }

        while self.peek_starts_with("/") && !self.peek_starts_with("//") && !self.peek_starts_with("/(")
        {
            self.capture("/")?;
            segments.push(self.parse_segment()?);
        }

        let mut children = BTreeMap::new();
        if self.peek_starts_with("/(") {
            self.capture("/")?;
            children = self.parse_parens(true)?;
        }

        let mut res = BTreeMap::new();
        if self.peek_starts_with("(") {
            res = self.parse_parens(false)?;
        }

        if !segments.is_empty() || !children.is_empty() {
            res.insert(
                PRIMARY_OUTLET.to_string(),
                UrlSegmentGroup::new(segments, children),
            );
        }

        Ok(res)
    }

    fn parse_segment(&mut self) -> Result<UrlSegment> {
        let path = match_segment(self.remaining);
        if path.is_empty() && self.peek_starts_with(";") {
            return Err(UrlError::EmptySegmentWithParams(self.remaining.to_string()));
        }

        self.capture(path)?;
        Ok(UrlSegment::with_params(decode(path), self.parse_matrix_params()))
    }

    fn parse_matrix_params(&mut self) -> Params {
        let mut params = Params::new();
        while self.consume_optional(";") {
            let key = match_matrix_key(self.remaining);
            if key.is_empty() {
                continue;
            }
            self.remaining = &self.remaining[key.len()..];

            let mut value = "";
            if self.consume_optional("=") {
                value = match_segment(self.remaining);
                self.remaining = &self.remaining[value.len()..];
            }
            params.insert(decode(key), decode(value));
        }
        params
    }

    fn parse_query_params(&mut self) -> Params {
        let mut params = Params::new();
        if self.consume_optional("?") {
            let query = match_until(self.remaining, &['#']);
            self.remaining = &self.remaining[query.len()..];
            for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }
        params
    }

    fn parse_fragment(&mut self) -> Option<String> {
        if self.consume_optional("#") {
            let fragment = decode(self.remaining);
            self.remaining = "";
            Some(fragment)
        } else {
            None
        }
    }

    fn parse_parens(&mut self, allow_primary: bool) -> Result<BTreeMap<String, UrlSegmentGroup>> {
        let mut outlets = BTreeMap::new();
        self.capture("(")?;

        while !self.consume_optional(")") && !self.remaining.is_empty() {
            let path = match_segment(self.remaining);
            let next = self.remaining[path.len()..].chars().next();
            if !matches!(next, Some('/') | Some(')') | Some(';')) {
                return Err(self.malformed("unterminated outlet group"));
            }

            let outlet_name = if let Some(idx) = path.find(':') {
                let name = &path[..idx];
                self.capture(name)?;
                self.capture(":")?;
                name.to_string()
            } else if allow_primary {
                PRIMARY_OUTLET.to_string()
            } else {
                return Err(self.malformed("named outlet expected"));
            };

            let mut children = self.parse_children()?;
            let group = if children.len() == 1 && children.contains_key(PRIMARY_OUTLET) {
                children.remove(PRIMARY_OUTLET).unwrap_or_default()
            } else {
                UrlSegmentGroup::new(Vec::new(), children)
            };
            outlets.insert(outlet_name, group);
            self.consume_optional("//");
        }

        Ok(outlets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> UrlTree {
        DefaultUrlSerializer.parse(url).unwrap()
    }

    #[test]
    fn test_parse_root() {
        let tree = parse("/");
        assert!(tree.root.is_empty());
        assert_eq!(DefaultUrlSerializer.serialize(&tree), "/");
        assert_eq!(parse(""), tree);
    }

    #[test]
    fn test_parse_primary_segments() {
        let tree = parse("/team/33/user/11");
        let primary = tree.root.primary().unwrap();
        let paths: Vec<&str> = primary.segments.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["team", "33", "user", "11"]);
    }

    #[test]
    fn test_parse_matrix_params() {
        let tree = parse("/team;id=33;open/user");
        let team = &tree.root.primary().unwrap().segments[0];
        assert_eq!(team.path, "team");
        assert_eq!(team.parameters.get("id").map(String::as_str), Some("33"));
        assert_eq!(team.parameters.get("open").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_named_outlets() {
        let tree = parse("/inbox/33(popup:compose//side:help)");
        let primary = tree.root.primary().unwrap();
        assert_eq!(primary.segments.len(), 2);
        assert_eq!(tree.root.children["popup"].segments[0].path, "compose");
        assert_eq!(tree.root.children["side"].segments[0].path, "help");
        assert_eq!(
            DefaultUrlSerializer.serialize(&tree),
            "/inbox/33(popup:compose//side:help)"
        );
    }

    #[test]
    fn test_parse_nested_outlets() {
        let tree = parse("/team/33/(user/11//aux:chat)");
        let primary = tree.root.primary().unwrap();
        assert_eq!(primary.children["primary"].segments[0].path, "user");
        assert_eq!(primary.children["aux"].segments[0].path, "chat");
        assert_eq!(
            DefaultUrlSerializer.serialize(&tree),
            "/team/33/(user/11//aux:chat)"
        );
    }

    #[test]
    fn test_parse_query_and_fragment() {
        let tree = parse("/search?q=rust+lang&page=2#results");
        assert_eq!(tree.query_params.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(tree.query_params.get("page").map(String::as_str), Some("2"));
        assert_eq!(tree.fragment.as_deref(), Some("results"));
        assert_eq!(
            DefaultUrlSerializer.serialize(&tree),
            "/search?page=2&q=rust%20lang#results"
        );
    }

    #[test]
    fn test_percent_decoding() {
        let tree = parse("/files/a%20b");
        assert_eq!(tree.root.primary().unwrap().segments[1].path, "a b");
    }

    #[test]
    fn test_malformed() {
        assert!(DefaultUrlSerializer.parse("/a(b").is_err());
        assert!(DefaultUrlSerializer.parse("/;x=1").is_err());
    }
}
