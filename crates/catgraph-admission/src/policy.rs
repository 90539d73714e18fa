//! # Policy Documents
//!
//! A policy document maps field paths (`Query.cats`, `Mutation.updateCat`)
//! to rule trees. It is loaded once at startup and never mutated.
//!
//! ```yaml
//! roles: [user, admin]
//! rules:
//!   throttle:
//!     rate_limit: { window: 1s, max: 5 }
//! fields:
//!   Query.cats: { use: throttle }
//!   Mutation.deleteCatAsAdmin:
//!     and:
//!       - require_role: admin
//!       - use: throttle
//! ```
//!
//! Leaves are `allow`, `deny`, `require_ownership`, `{require_role: r}` and
//! `{rate_limit: {window, max, then?}}`. Composites are `{and: [..]}` and
//! `{or: [..]}`. `{use: name}` splices a named rule from `rules`. Named
//! rules are resolved eagerly, so a cycle or a dangling reference fails the
//! load even when no field uses it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::ConfigurationError;
use crate::rule::RuleNode;

/// Policy shipped with the gateway for the cat and user schema.
pub const REFERENCE_POLICY: &str = include_str!("../policies/reference.yaml");

/// `TypeName.fieldName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    type_name: String,
    field_name: String,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let trimmed = raw.trim();
        let invalid = || ConfigurationError::InvalidFieldPath(raw.to_string());
        let (type_name, field_name) = trimmed.split_once('.').ok_or_else(invalid)?;
        if !is_identifier(type_name) || !is_identifier(field_name) {
            return Err(invalid());
        }
        Ok(Self {
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl FromStr for FieldPath {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The rule guarding one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    pub field_path: FieldPath,
    pub rule: RuleNode,
}

impl FieldPolicy {
    pub fn new(field_path: FieldPath, rule: RuleNode) -> Self {
        Self { field_path, rule }
    }
}

/// Immutable set of field policies, keyed by field path.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    roles: BTreeSet<String>,
    fields: HashMap<String, FieldPolicy>,
}

impl PolicySet {
    /// A set with no guarded fields. Every field is unguarded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from already-constructed policies, applying the same
    /// checks as the YAML loader.
    pub fn from_policies<R, P>(roles: R, policies: P) -> Result<Self, ConfigurationError>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator<Item = FieldPolicy>,
    {
        let roles: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        let mut fields = HashMap::new();
        for policy in policies {
            let key = policy.field_path.to_string();
            check_field_rule(&key, &policy.rule, &roles)?;
            if fields.insert(key.clone(), policy).is_some() {
                return Err(ConfigurationError::DuplicateField(key));
            }
        }
        Ok(Self { roles, fields })
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigurationError> {
        let document: PolicyDocument = serde_yaml::from_str(source)?;
        document.compile()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    /// The built-in policy in [`REFERENCE_POLICY`].
    pub fn reference() -> Result<Self, ConfigurationError> {
        Self::from_yaml_str(REFERENCE_POLICY)
    }

    pub fn get(&self, field_path: &str) -> Option<&FieldPolicy> {
        self.fields.get(field_path)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// Guarded fields, sorted by path.
    pub fn iter(&self) -> impl Iterator<Item = &FieldPolicy> {
        let sorted: BTreeMap<&String, &FieldPolicy> = self.fields.iter().collect();
        sorted.into_values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn check_field_rule(
    field: &str,
    rule: &RuleNode,
    roles: &BTreeSet<String>,
) -> Result<(), ConfigurationError> {
    if let Some(role) = rule.roles().into_iter().find(|r| !roles.contains(*r)) {
        return Err(ConfigurationError::UndefinedRole {
            role: role.to_string(),
            at: field.to_string(),
        });
    }
    if rule.rate_limit_count() > 1 {
        return Err(ConfigurationError::MultipleRateLimits(field.to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    rules: Mapping,
    #[serde(default)]
    fields: Mapping,
}

impl PolicyDocument {
    fn compile(self) -> Result<PolicySet, ConfigurationError> {
        let mut roles = BTreeSet::new();
        for role in self.roles {
            let role = role.trim().to_string();
            if role.is_empty() {
                return Err(ConfigurationError::InvalidRule {
                    at: "roles".into(),
                    message: "role names must not be empty".into(),
                });
            }
            roles.insert(role);
        }

        let mut named = BTreeMap::new();
        for (key, value) in &self.rules {
            let name = mapping_key(key, "rules")?;
            named.insert(name.to_string(), value);
        }

        let mut compiler = RuleCompiler {
            named: &named,
            roles: &roles,
            resolved: HashMap::new(),
            stack: Vec::new(),
        };
        for name in named.keys() {
            compiler.resolve_named(name, "rules")?;
        }

        let mut fields = HashMap::new();
        for (key, value) in &self.fields {
            let raw = mapping_key(key, "fields")?;
            let field_path = FieldPath::parse(raw)?;
            let path = field_path.to_string();
            if fields.contains_key(&path) {
                return Err(ConfigurationError::DuplicateField(path));
            }
            let rule = compiler.compile(value, &path)?;
            if rule.rate_limit_count() > 1 {
                return Err(ConfigurationError::MultipleRateLimits(path));
            }
            fields.insert(path, FieldPolicy::new(field_path, rule));
        }

        Ok(PolicySet { roles, fields })
    }
}

fn mapping_key<'v>(key: &'v Value, at: &str) -> Result<&'v str, ConfigurationError> {
    key.as_str().ok_or_else(|| ConfigurationError::InvalidRule {
        at: at.to_string(),
        message: format!("keys must be strings, found {key:?}"),
    })
}

struct RuleCompiler<'a> {
    named: &'a BTreeMap<String, &'a Value>,
    roles: &'a BTreeSet<String>,
    resolved: HashMap<String, RuleNode>,
    stack: Vec<String>,
}

impl<'a> RuleCompiler<'a> {
    fn resolve_named(&mut self, name: &str, at: &str) -> Result<RuleNode, ConfigurationError> {
        if let Some(rule) = self.resolved.get(name) {
            return Ok(rule.clone());
        }
        if let Some(start) = self.stack.iter().position(|n| n == name) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(ConfigurationError::CyclicRule(chain.join(" -> ")));
        }
        let named = self.named;
        let value = named
            .get(name)
            .ok_or_else(|| ConfigurationError::UndefinedRule {
                name: name.to_string(),
                at: at.to_string(),
            })?;

        self.stack.push(name.to_string());
        let compiled = self.compile(value, &format!("rules.{name}"));
        self.stack.pop();
        let rule = compiled?;

        self.resolved.insert(name.to_string(), rule.clone());
        Ok(rule)
    }

    fn compile(&mut self, value: &Value, at: &str) -> Result<RuleNode, ConfigurationError> {
        match value {
            Value::String(leaf) => match leaf.trim() {
                "allow" => Ok(RuleNode::Allow),
                "deny" => Ok(RuleNode::Deny),
                "require_ownership" => Ok(RuleNode::RequireOwnership),
                other => Err(invalid(at, format!("unknown rule '{other}'"))),
            },
            Value::Mapping(map) => {
                let mut entries = map.iter();
                let (Some((key, body)), None) = (entries.next(), entries.next()) else {
                    return Err(invalid(at, "a rule mapping must have exactly one key"));
                };
                let kind = mapping_key(key, at)?;
                match kind {
                    "require_role" => self.compile_role(body, at),
                    "rate_limit" => self.compile_rate_limit(body, &format!("{at}.rate_limit")),
                    "and" => Ok(RuleNode::And(self.compile_children(body, at, kind)?)),
                    "or" => Ok(RuleNode::Or(self.compile_children(body, at, kind)?)),
                    "use" => {
                        let name = body
                            .as_str()
                            .ok_or_else(|| invalid(at, "'use' expects a rule name"))?;
                        self.resolve_named(name.trim(), at)
                    }
                    other => Err(invalid(at, format!("unknown rule kind '{other}'"))),
                }
            }
            Value::Tagged(tagged) => Err(invalid(
                at,
                format!("unexpected tag {} on rule", tagged.tag),
            )),
            _ => Err(invalid(
                at,
                "expected a rule name or a single-key mapping",
            )),
        }
    }

    fn compile_role(&self, body: &Value, at: &str) -> Result<RuleNode, ConfigurationError> {
        let role = body
            .as_str()
            .map(str::trim)
            .ok_or_else(|| invalid(at, "'require_role' expects a role name"))?;
        if !self.roles.contains(role) {
            return Err(ConfigurationError::UndefinedRole {
                role: role.to_string(),
                at: at.to_string(),
            });
        }
        Ok(RuleNode::require_role(role))
    }

    fn compile_children(
        &mut self,
        body: &Value,
        at: &str,
        kind: &str,
    ) -> Result<Vec<RuleNode>, ConfigurationError> {
        let items = body
            .as_sequence()
            .ok_or_else(|| invalid(at, format!("'{kind}' expects a list of rules")))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.compile(item, &format!("{at}.{kind}[{i}]")))
            .collect()
    }

    fn compile_rate_limit(&mut self, body: &Value, at: &str) -> Result<RuleNode, ConfigurationError> {
        let map = body
            .as_mapping()
            .ok_or_else(|| invalid(at, "'rate_limit' expects {window, max, then?}"))?;

        let mut window = None;
        let mut max_count = None;
        let mut next = RuleNode::Allow;
        for (key, value) in map {
            match mapping_key(key, at)? {
                "window" => window = Some(parse_window(value, at)?),
                "max" => max_count = Some(parse_max(value, at)?),
                "then" => next = self.compile(value, &format!("{at}.then"))?,
                other => return Err(invalid(at, format!("unknown rate_limit key '{other}'"))),
            }
        }

        let window = window.ok_or_else(|| invalid(at, "missing 'window'"))?;
        let max_count = max_count.ok_or_else(|| invalid(at, "missing 'max'"))?;
        Ok(RuleNode::rate_limit_then(window, max_count, next))
    }
}

fn parse_window(value: &Value, at: &str) -> Result<Duration, ConfigurationError> {
    let window = match value {
        Value::String(s) => humantime::parse_duration(s.trim())
            .map_err(|e| invalid(at, format!("bad window '{s}': {e}")))?,
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| invalid(at, format!("window must be whole seconds, found {n}")))?,
        _ => return Err(invalid(at, "window must be a duration like '1s' or seconds")),
    };
    if window.is_zero() {
        return Err(invalid(at, "window must be positive"));
    }
    Ok(window)
}

fn parse_max(value: &Value, at: &str) -> Result<u32, ConfigurationError> {
    let max = value
        .as_u64()
        .ok_or_else(|| invalid(at, "max must be a positive integer"))?;
    if max == 0 {
        return Err(invalid(at, "max must be positive"));
    }
    u32::try_from(max).map_err(|_| invalid(at, format!("max {max} is too large")))
}

fn invalid(at: &str, message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidRule {
        at: at.to_string(),
        message: message.into(),
    }
}
