//! User-declared custom tracking function signatures.
//!
//! A signature names a wrapper function and says which argument carries the
//! event name, which carries the properties, and which extra arguments fold
//! into the property set. Signatures are plain data interpreted by the
//! matcher at scan time.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::Expr;
use crate::error::SignatureError;

lazy_static! {
    static ref SIGNATURE_PATTERN: Regex =
        Regex::new(r"^\s*([A-Za-z0-9_$]+(?:\.[A-Za-z0-9_$]+)*)\s*(?:\(([^)]*)\))?\s*$")
            .expect("signature pattern is valid");
}

const EVENT_PARAM: &str = "EVENT_NAME";
const PROPERTIES_PARAM: &str = "PROPERTIES";

/// An additional argument folded into the event's properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraParam {
    pub name: String,
    #[serde(alias = "argIndex")]
    pub arg_index: usize,
}

/// Argument layout of a custom tracking function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSignature {
    /// Function name, optionally dotted (`Analytics.log`, `this.props.track`).
    pub name: String,
    #[serde(default, alias = "eventArgIndex")]
    pub event_arg_index: usize,
    #[serde(default, alias = "propertiesArgIndex")]
    pub properties_arg_index: Option<usize>,
    #[serde(default, alias = "extraParams")]
    pub extra_params: Vec<ExtraParam>,
}

impl CustomSignature {
    /// `name(event, properties)`: the layout used when no parameter list is given.
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_arg_index: 0,
            properties_arg_index: Some(1),
            extra_params: Vec::new(),
        }
    }

    /// Parse `name` or `name(userId, EVENT_NAME, PROPERTIES, ...)`.
    ///
    /// `EVENT_NAME` is required in a parameter list. Without `PROPERTIES`,
    /// properties are taken from the position after the last parameter.
    /// Every other parameter becomes an extra parameter at its position.
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let caps = SIGNATURE_PATTERN
            .captures(text)
            .ok_or_else(|| SignatureError::Malformed(text.to_string()))?;
        let name = caps[1].to_string();

        let Some(params) = caps.get(2) else {
            return Ok(Self::simple(name));
        };

        let params: Vec<&str> = params
            .as_str()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        for (i, param) in params.iter().enumerate() {
            if params[..i].contains(param) {
                return Err(SignatureError::DuplicateParameter(
                    text.to_string(),
                    param.to_string(),
                ));
            }
        }

        let event_arg_index = params
            .iter()
            .position(|p| *p == EVENT_PARAM)
            .ok_or_else(|| SignatureError::MissingEventName(text.to_string()))?;
        let properties_arg_index = params
            .iter()
            .position(|p| *p == PROPERTIES_PARAM)
            .unwrap_or(params.len());

        let extra_params = params
            .iter()
            .enumerate()
            .filter(|(_, p)| **p != EVENT_PARAM && **p != PROPERTIES_PARAM)
            .map(|(arg_index, p)| ExtraParam {
                name: p.to_string(),
                arg_index,
            })
            .collect();

        Ok(Self {
            name,
            event_arg_index,
            properties_arg_index: Some(properties_arg_index),
            extra_params,
        })
    }

    /// Whether `callee` names this function exactly.
    pub fn matches(&self, callee: &Expr) -> bool {
        match callee.path() {
            Some(path) => self.name.split('.').eq(path.into_iter()),
            None => false,
        }
    }
}

impl std::str::FromStr for CustomSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical text form, as recorded in scan metadata.
impl std::fmt::Display for CustomSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::simple(self.name.clone()) {
            return write!(f, "{}", self.name);
        }

        let mut labelled: Vec<(usize, &str)> = vec![(self.event_arg_index, EVENT_PARAM)];
        if let Some(index) = self.properties_arg_index {
            labelled.push((index, PROPERTIES_PARAM));
        }
        labelled.extend(
            self.extra_params
                .iter()
                .map(|extra| (extra.arg_index, extra.name.as_str())),
        );

        let width = labelled.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut params = vec!["_"; width];
        for (index, label) in labelled {
            params[index] = label;
        }
        write!(f, "{}({})", self.name, params.join(", "))
    }
}
