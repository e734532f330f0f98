use std::borrow::Cow;
use std::collections::HashMap;

use conductor_config::{Value, ValueMap};

use crate::parser::{Part, PathExpr, Placeholder, Segment, Template};

/// Prefix of the marker substituted for placeholders that do not resolve.
pub const UNRESOLVED_PREFIX: &str = "<unresolved:";

/// Read access to the outputs recorded so far in a run.
pub trait OutputLookup {
  /// Output recorded for a step.
  fn output(&self, step_id: &str) -> Option<&Value>;

  /// A field of the step's record other than `output`, e.g. `capability`,
  /// `action` or `cost`.
  fn record_field(&self, step_id: &str, field: &str) -> Option<Value> {
    let _ = (step_id, field);
    None
  }
}

/// Plain output maps, with no record metadata.
impl OutputLookup for HashMap<String, Value> {
  fn output(&self, step_id: &str) -> Option<&Value> {
    self.get(step_id)
  }
}

impl OutputLookup for ValueMap {
  fn output(&self, step_id: &str) -> Option<&Value> {
    self.get(step_id)
  }
}

/// Marker text for a placeholder whose path could not be resolved.
pub fn unresolved_marker(raw: &str) -> String {
  format!("{}{}>", UNRESOLVED_PREFIX, raw)
}

/// Text form of a value used for substitution: strings verbatim, scalars as
/// their JSON text, lists and maps as compact JSON.
pub fn canonical_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Walk a path against the recorded outputs.
pub fn resolve_path<'a, L>(path: &PathExpr, lookup: &'a L) -> Option<Cow<'a, Value>>
where
  L: OutputLookup + ?Sized,
{
  let (first, rest) = match path.segments.split_first() {
    None => return lookup.output(&path.step_id).map(Cow::Borrowed),
    Some(split) => split,
  };

  match first {
    Segment::Key(key) if key == "output" => {
      let output = lookup.output(&path.step_id)?;
      walk(output, rest).map(Cow::Borrowed)
    }
    Segment::Key(key) => {
      let field = lookup.record_field(&path.step_id, key)?;
      walk(&field, rest).cloned().map(Cow::Owned)
    }
    Segment::Index(_) => None,
  }
}

fn walk<'v>(mut value: &'v Value, segments: &[Segment]) -> Option<&'v Value> {
  for segment in segments {
    value = match segment {
      Segment::Key(key) => value.get(key)?,
      Segment::Index(index) => value.index(*index)?,
    };
  }
  Some(value)
}

fn resolve_placeholder<'a, L>(placeholder: &Placeholder, lookup: &'a L) -> Option<Cow<'a, Value>>
where
  L: OutputLookup + ?Sized,
{
  placeholder
    .path
    .as_ref()
    .and_then(|path| resolve_path(path, lookup))
}

/// Render a template to a string. Placeholders that do not resolve become
/// the unresolved marker; the call itself never fails.
pub fn resolve_template<L>(template: &Template, lookup: &L) -> String
where
  L: OutputLookup + ?Sized,
{
  let mut rendered = String::with_capacity(template.source().len());
  for part in template.parts() {
    match part {
      Part::Literal(text) => rendered.push_str(text),
      Part::Placeholder(placeholder) => match resolve_placeholder(placeholder, lookup) {
        Some(value) => rendered.push_str(&canonical_text(&value)),
        None => rendered.push_str(&unresolved_marker(&placeholder.raw)),
      },
    }
  }
  rendered
}

/// Resolve a template into a value. A template that is exactly one
/// placeholder keeps the referenced value's type; anything else renders to
/// a string.
pub fn resolve_value<L>(template: &Template, lookup: &L) -> Value
where
  L: OutputLookup + ?Sized,
{
  match template.as_single_placeholder() {
    Some(placeholder) => match resolve_placeholder(placeholder, lookup) {
      Some(value) => value.into_owned(),
      None => Value::String(unresolved_marker(&placeholder.raw)),
    },
    None => Value::String(resolve_template(template, lookup)),
  }
}

/// Resolve placeholders in every string inside a parameter map, recursing
/// into lists and maps. Non-string scalars pass through unchanged.
pub fn resolve_parameters<L>(parameters: &ValueMap, lookup: &L) -> ValueMap
where
  L: OutputLookup + ?Sized,
{
  parameters
    .iter()
    .map(|(key, value)| (key.clone(), resolve_nested(value, lookup)))
    .collect()
}

fn resolve_nested<L>(value: &Value, lookup: &L) -> Value
where
  L: OutputLookup + ?Sized,
{
  match value {
    Value::String(s) if s.contains("{{") => {
      let template = Template::parse(s);
      if template.has_placeholders() {
        resolve_value(&template, lookup)
      } else {
        value.clone()
      }
    }
    Value::List(items) => Value::List(items.iter().map(|v| resolve_nested(v, lookup)).collect()),
    Value::Map(map) => Value::Map(
      map
        .iter()
        .map(|(k, v)| (k.clone(), resolve_nested(v, lookup)))
        .collect(),
    ),
    _ => value.clone(),
  }
}
