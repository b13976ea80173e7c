use crate::error::{AppError, AppResult};
use regex::Regex;
use std::collections::BTreeMap;

/// Values captured by a route match (`controller`, `action`, `id`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues(BTreeMap<String, String>);

impl RouteValues {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Parameter {
        name: String,
        default: Option<String>,
        optional: bool,
    },
}

/// A conventional route template such as `{controller=Home}/{action=Index}/{id?}`
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(template: &str) -> AppResult<Self> {
        let parameter = Regex::new(r"^\{([A-Za-z_][A-Za-z0-9_]*)(?:=([^{}?]+))?(\?)?\}$")
            .map_err(|e| AppError::Internal(format!("Invalid regex pattern: {}", e)))?;

        let parts: Vec<&str> = template
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();

        let mut segments = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let segment = if let Some(captures) = parameter.captures(part) {
                let name = captures[1].to_string();
                let default = captures.get(2).map(|m| m.as_str().to_string());
                let optional = captures.get(3).is_some();

                if optional && default.is_some() {
                    return Err(AppError::Configuration(format!(
                        "Route parameter '{}' cannot be both optional and have a default",
                        name
                    )));
                }
                if optional && index + 1 != parts.len() {
                    return Err(AppError::Configuration(format!(
                        "Optional route parameter '{}' must be the last segment",
                        name
                    )));
                }
                Segment::Parameter {
                    name,
                    default,
                    optional,
                }
            } else if part.contains(['{', '}']) {
                return Err(AppError::Configuration(format!(
                    "Malformed route segment '{}' in '{}'",
                    part, template
                )));
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match a request path, filling defaults for omitted trailing segments
    pub fn match_path(&self, path: &str) -> Option<RouteValues> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() > self.segments.len() {
            return None;
        }

        let mut values = RouteValues::default();
        for (index, segment) in self.segments.iter().enumerate() {
            match (segment, parts.get(index)) {
                (Segment::Literal(literal), Some(part)) if literal.eq_ignore_ascii_case(part) => {}
                (Segment::Literal(_), _) => return None,
                (Segment::Parameter { name, .. }, Some(part)) => values.insert(name.as_str(), *part),
                (
                    Segment::Parameter {
                        name,
                        default: Some(default),
                        ..
                    },
                    None,
                ) => values.insert(name.as_str(), default.as_str()),
                (Segment::Parameter { optional: true, .. }, None) => {}
                (Segment::Parameter { .. }, None) => return None,
            }
        }

        Some(values)
    }
}
