//! Bind parameter marshalling.
//!
//! Application SQL always uses named binds (`:name`). Each driver expects
//! one of five placeholder styles; a [`ParamConverter`] built during
//! statement translation records which names were registered, produces the
//! driver-appropriate placeholder text for each, and later turns a
//! caller's name→value map into the positional or named bind form the
//! driver wants. The converter is stateful only with respect to *which*
//! names were registered (never values), so one converter is safely
//! reused across executions of its statement.

use porta_core::errors::DbError;
use porta_core::value::{Params, Value};

/// The placeholder syntax a database driver expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `?`, positional.
    Qmark,
    /// `%s`, positional.
    Format,
    /// `:1`, `:2`, …, positional with per-name dedup.
    Numeric,
    /// `:name`, named.
    Named,
    /// `%(name)s`, named.
    Pyformat,
}

impl ParamStyle {
    pub fn is_positional(self) -> bool {
        matches!(self, Self::Qmark | Self::Format | Self::Numeric)
    }
}

/// Driver-native bind values produced by [`ParamConverter::convert`].
#[derive(Debug, Clone, PartialEq)]
pub enum BindArgs {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl BindArgs {
    pub fn none() -> Self {
        BindArgs::Positional(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            BindArgs::Positional(v) => v.len(),
            BindArgs::Named(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts named binds to one driver paramstyle.
#[derive(Debug, Clone)]
pub struct ParamConverter {
    style: ParamStyle,
    /// Bind map in registration order. Positional styles replay it at
    /// conversion time; `Numeric` and the named styles keep it
    /// deduplicated.
    map: Vec<String>,
}

impl ParamConverter {
    pub fn new(style: ParamStyle) -> Self {
        Self {
            style,
            map: Vec::new(),
        }
    }

    pub fn style(&self) -> ParamStyle {
        self.style
    }

    /// Names registered so far, in first-registration order.
    pub fn names(&self) -> &[String] {
        &self.map
    }

    /// Record one occurrence of `:name` and return the placeholder text to
    /// splice into the translated statement.
    pub fn register(&mut self, name: &str) -> String {
        match self.style {
            ParamStyle::Qmark => {
                self.map.push(name.to_owned());
                "?".to_owned()
            }
            ParamStyle::Format => {
                self.map.push(name.to_owned());
                "%s".to_owned()
            }
            ParamStyle::Numeric => {
                // Repeats reuse the index of the first registration.
                let index = match self.map.iter().position(|n| n == name) {
                    Some(i) => i,
                    None => {
                        self.map.push(name.to_owned());
                        self.map.len() - 1
                    }
                };
                format!(":{}", index + 1)
            }
            ParamStyle::Named => {
                self.note_name(name);
                format!(":{name}")
            }
            ParamStyle::Pyformat => {
                self.note_name(name);
                format!("%({name})s")
            }
        }
    }

    fn note_name(&mut self, name: &str) {
        if !self.map.iter().any(|n| n == name) {
            self.map.push(name.to_owned());
        }
    }

    /// Turn the caller's parameter map into driver-native bind values.
    ///
    /// Positional styles replay the bind map; named styles pass the map
    /// through unchanged. Either way every registered name must be
    /// present, and values are normalized so no internal marker types
    /// reach a driver.
    pub fn convert(&self, params: &Params) -> Result<BindArgs, DbError> {
        for name in &self.map {
            if !params.contains_key(name) {
                return Err(DbError::programming(format!(
                    "Bind parameter :{name} has no value."
                )));
            }
        }
        if self.style.is_positional() {
            let values = self
                .map
                .iter()
                .map(|name| params[name].clone().normalized())
                .collect();
            Ok(BindArgs::Positional(values))
        } else {
            let mut pairs: Vec<(String, Value)> = params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().normalized()))
                .collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(BindArgs::Named(pairs))
        }
    }
}
