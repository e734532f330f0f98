use std::fmt;

/// One segment of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Key(String),
  Index(usize),
}

/// A parsed `step_id.path.to.field` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
  pub step_id: String,
  pub segments: Vec<Segment>,
}

impl PathExpr {
  /// Parse a dotted path. Surrounding `{{ }}` are tolerated so that
  /// condition fields may be written either way.
  ///
  /// Returns `None` for empty segments or segments containing whitespace or
  /// braces.
  pub fn parse(raw: &str) -> Option<Self> {
    let mut trimmed = raw.trim();
    if let Some(inner) = trimmed
      .strip_prefix("{{")
      .and_then(|rest| rest.strip_suffix("}}"))
    {
      trimmed = inner.trim();
    }

    let mut parts = trimmed.split('.');
    let step_id = parts.next().filter(|s| is_valid_segment(s))?.to_string();

    let mut segments = Vec::new();
    for part in parts {
      if !is_valid_segment(part) {
        return None;
      }
      let segment = match part.parse::<usize>() {
        Ok(index) => Segment::Index(index),
        Err(_) => Segment::Key(part.to_string()),
      };
      segments.push(segment);
    }

    Some(Self { step_id, segments })
  }
}

fn is_valid_segment(segment: &str) -> bool {
  !segment.is_empty()
    && !segment
      .chars()
      .any(|c| c.is_whitespace() || c == '{' || c == '}')
}

impl fmt::Display for PathExpr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.step_id)?;
    for segment in &self.segments {
      match segment {
        Segment::Key(key) => write!(f, ".{}", key)?,
        Segment::Index(index) => write!(f, ".{}", index)?,
      }
    }
    Ok(())
  }
}

/// The contents of one `{{...}}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
  /// Text between the braces, trimmed.
  pub raw: String,
  /// `None` when `raw` is not a valid path; such a placeholder always
  /// resolves to the unresolved marker.
  pub path: Option<PathExpr>,
}

impl Placeholder {
  fn parse(raw: &str) -> Self {
    let raw = raw.trim();
    Self {
      raw: raw.to_string(),
      path: PathExpr::parse(raw),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
  Literal(String),
  Placeholder(Placeholder),
}

/// A string split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  source: String,
  parts: Vec<Part>,
}

impl Template {
  /// Parse a template. Parsing never fails: an unterminated `{{` and
  /// everything after it is kept as literal text.
  pub fn parse(input: &str) -> Self {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
      let after_open = &rest[open + 2..];
      let Some(close) = after_open.find("}}") else {
        break;
      };

      literal.push_str(&rest[..open]);
      if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(&mut literal)));
      }
      parts.push(Part::Placeholder(Placeholder::parse(&after_open[..close])));
      rest = &after_open[close + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
      parts.push(Part::Literal(literal));
    }

    Self {
      source: input.to_string(),
      parts,
    }
  }

  pub fn parts(&self) -> &[Part] {
    &self.parts
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  /// Whether the template has any placeholder at all.
  pub fn has_placeholders(&self) -> bool {
    self
      .parts
      .iter()
      .any(|part| matches!(part, Part::Placeholder(_)))
  }

  /// The template is exactly one placeholder with no surrounding text.
  pub fn as_single_placeholder(&self) -> Option<&Placeholder> {
    match self.parts.as_slice() {
      [Part::Placeholder(placeholder)] => Some(placeholder),
      _ => None,
    }
  }

  /// Step ids referenced by valid placeholders, in order of appearance.
  pub fn referenced_steps(&self) -> impl Iterator<Item = &str> {
    self.parts.iter().filter_map(|part| match part {
      Part::Placeholder(Placeholder {
        path: Some(path), ..
      }) => Some(path.step_id.as_str()),
      _ => None,
    })
  }
}

impl fmt::Display for Template {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.source)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(k: &str) -> Segment {
    Segment::Key(k.to_string())
  }

  #[test]
  fn test_parse_mixed_template() {
    let template = Template::parse("Hello {{ user.output.name }}, you have {{inbox.output.count}}!");

    assert_eq!(template.parts().len(), 5);
    assert_eq!(template.parts()[0], Part::Literal("Hello ".to_string()));
    let Part::Placeholder(first) = &template.parts()[1] else {
      panic!("expected placeholder");
    };
    assert_eq!(first.raw, "user.output.name");
    assert_eq!(
      first.path,
      Some(PathExpr {
        step_id: "user".to_string(),
        segments: vec![key("output"), key("name")],
      })
    );
    assert_eq!(template.parts()[4], Part::Literal("!".to_string()));
    assert_eq!(
      template.referenced_steps().collect::<Vec<_>>(),
      vec!["user", "inbox"]
    );
  }

  #[test]
  fn test_parse_numeric_segments_as_indexes() {
    let path = PathExpr::parse("fetch.output.items.0.name").unwrap();
    assert_eq!(
      path.segments,
      vec![key("output"), key("items"), Segment::Index(0), key("name")]
    );
    assert_eq!(path.to_string(), "fetch.output.items.0.name");
  }

  #[test]
  fn test_parse_unterminated_is_literal() {
    let template = Template::parse("a {{b.c} d");
    assert_eq!(template.parts(), &[Part::Literal("a {{b.c} d".to_string())]);
    assert!(!template.has_placeholders());
  }

  #[test]
  fn test_parse_invalid_paths() {
    assert_eq!(PathExpr::parse(""), None);
    assert_eq!(PathExpr::parse("a..b"), None);
    assert_eq!(PathExpr::parse("a.b c"), None);

    let template = Template::parse("{{}}");
    let placeholder = template.as_single_placeholder().unwrap();
    assert_eq!(placeholder.path, None);
  }

  #[test]
  fn test_condition_style_braces_tolerated() {
    assert_eq!(PathExpr::parse("{{ s1.output }}"), PathExpr::parse("s1.output"));
  }

  #[test]
  fn test_single_placeholder() {
    assert!(Template::parse("{{s1.output}}").as_single_placeholder().is_some());
    assert!(Template::parse(" {{s1.output}}").as_single_placeholder().is_none());
    assert!(Template::parse("plain").as_single_placeholder().is_none());
  }
}
