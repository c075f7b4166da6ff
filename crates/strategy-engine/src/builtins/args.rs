//! Positional argument access for builtins.

use crate::builtins::BuiltinError;
use crate::indicators::{Record, Series};
use crate::runtime::value::ScriptValue;

/// Arguments of one builtin call, with trailing `None`s already trimmed.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    name: &'static str,
    values: &'a [ScriptValue],
}

impl<'a> Args<'a> {
    pub fn new(name: &'static str, values: &'a [ScriptValue]) -> Self {
        Self { name, values }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The argument at `idx`, treating an explicit `None` as omitted.
    pub fn get(&self, idx: usize) -> Option<&'a ScriptValue> {
        self.values.get(idx).filter(|v| !v.is_none())
    }

    fn type_error(&self, param: &'static str, expected: &'static str, got: &ScriptValue) -> BuiltinError {
        BuiltinError::Type {
            name: self.name,
            param,
            expected,
            got: got.type_name().to_string(),
        }
    }

    fn missing(&self, param: &'static str) -> BuiltinError {
        BuiltinError::Value {
            name: self.name,
            param,
            message: "missing required argument".into(),
        }
    }

    /// A numeric sequence. Ints are widened and `None` elements read as undefined.
    pub fn series(&self, idx: usize, param: &'static str) -> Result<Series, BuiltinError> {
        let value = self.get(idx).ok_or_else(|| self.missing(param))?;
        let items = value
            .as_list()
            .ok_or_else(|| self.type_error(param, "a list of numbers", value))?;
        items
            .iter()
            .map(|item| match item {
                ScriptValue::None => Ok(f64::NAN),
                other => other
                    .as_f64()
                    .ok_or_else(|| self.type_error(param, "a list of numbers", other)),
            })
            .collect()
    }

    /// A required positive integer.
    pub fn period(&self, idx: usize, param: &'static str) -> Result<usize, BuiltinError> {
        let value = self.get(idx).ok_or_else(|| self.missing(param))?;
        match self.integer(value, param)? {
            p if p > 0 => Ok(p as usize),
            p => Err(BuiltinError::Value {
                name: self.name,
                param,
                message: format!("must be a positive integer, got {p}"),
            }),
        }
    }

    /// An optional positive integer. Omitted, `None` or `0` fall back to `default`.
    pub fn period_or(
        &self,
        idx: usize,
        param: &'static str,
        default: usize,
    ) -> Result<usize, BuiltinError> {
        let Some(value) = self.get(idx) else {
            return Ok(default);
        };
        match self.integer(value, param)? {
            0 => Ok(default),
            p if p > 0 => Ok(p as usize),
            p => Err(BuiltinError::Value {
                name: self.name,
                param,
                message: format!("must be a positive integer, got {p}"),
            }),
        }
    }

    /// An optional number. Omitted, `None` or `0` fall back to `default`.
    pub fn number_or(&self, idx: usize, param: &'static str, default: f64) -> Result<f64, BuiltinError> {
        let Some(value) = self.get(idx) else {
            return Ok(default);
        };
        let number = value
            .as_f64()
            .ok_or_else(|| self.type_error(param, "a number", value))?;
        if !number.is_finite() {
            return Err(BuiltinError::Value {
                name: self.name,
                param,
                message: format!("must be finite, got {number}"),
            });
        }
        Ok(if number == 0.0 { default } else { number })
    }

    /// A required number; zero is kept.
    pub fn number(&self, idx: usize, param: &'static str) -> Result<f64, BuiltinError> {
        let value = self.get(idx).ok_or_else(|| self.missing(param))?;
        value
            .as_f64()
            .ok_or_else(|| self.type_error(param, "a number", value))
    }

    /// An optional integer of any sign; integral floats are accepted.
    pub fn integer_or(&self, idx: usize, param: &'static str, default: i64) -> Result<i64, BuiltinError> {
        match self.get(idx) {
            None => Ok(default),
            Some(value) => self.integer(value, param),
        }
    }

    pub fn string_or(
        &self,
        idx: usize,
        param: &'static str,
        default: &'a str,
    ) -> Result<&'a str, BuiltinError> {
        match self.get(idx) {
            None => Ok(default),
            Some(value) => value
                .as_str()
                .ok_or_else(|| self.type_error(param, "a string", value)),
        }
    }

    fn integer(&self, value: &ScriptValue, param: &'static str) -> Result<i64, BuiltinError> {
        match value {
            ScriptValue::Int(v) => Ok(*v),
            ScriptValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(*v as i64),
            other => Err(self.type_error(param, "an integer", other)),
        }
    }
}

/// Named multi-output result as an ordered dict of series.
pub fn record<R: Record>(record: R) -> ScriptValue {
    ScriptValue::dict(
        record
            .fields()
            .into_iter()
            .map(|(key, series)| (key, ScriptValue::series(&series))),
    )
}

pub fn series(values: Series) -> ScriptValue {
    ScriptValue::series(&values)
}
