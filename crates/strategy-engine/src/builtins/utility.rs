use crate::builtins::args::series;
use crate::builtins::output::{emit, OutputLevel};
use crate::builtins::{Args, BuiltinError, BuiltinRegistry};
use crate::indicators::{crossover, crossunder, highest, lowest};
use crate::runtime::value::ScriptValue;

pub(super) fn register(r: &mut BuiltinRegistry) {
    r.add("highest", &["src", "period"], 2, |a| {
        Ok(series(highest(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("lowest", &["src", "period"], 2, |a| {
        Ok(series(lowest(&a.series(0, "src")?, a.period(1, "period")?)))
    });
    r.add("crossover", &["a", "b"], 2, |a| {
        Ok(ScriptValue::Bool(crossover(
            &a.series(0, "a")?,
            &a.series(1, "b")?,
        )))
    });
    r.add("crossunder", &["a", "b"], 2, |a| {
        Ok(ScriptValue::Bool(crossunder(
            &a.series(0, "a")?,
            &a.series(1, "b")?,
        )))
    });
    r.add("log", &["message", "level"], 1, log);
    r.add("round", &["x", "digits"], 1, round);
    r.add("abs", &["x"], 1, |a| match a.get(0) {
        Some(ScriptValue::Int(v)) => Ok(ScriptValue::Int(v.saturating_abs())),
        _ => Ok(ScriptValue::Float(a.number(0, "x")?.abs())),
    });
}

fn log(a: &Args<'_>) -> Result<ScriptValue, BuiltinError> {
    let message = match a.get(0) {
        Some(ScriptValue::Str(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let level = OutputLevel::parse(a.string_or(1, "level", "info")?);
    emit(level, message);
    Ok(ScriptValue::None)
}

/// Rounds half away from zero to `digits` decimals. Negative digits round
/// to tens, hundreds and so on. Ints stay ints.
fn round(a: &Args<'_>) -> Result<ScriptValue, BuiltinError> {
    let digits = a.integer_or(1, "digits", 0)?;
    if let Some(ScriptValue::Int(x)) = a.get(0) {
        return Ok(ScriptValue::Int(round_int(*x, digits)));
    }
    let x = a.number(0, "x")?;
    if !x.is_finite() {
        return Ok(ScriptValue::Float(x));
    }
    let scale = 10f64.powi(digits.clamp(-15, 15) as i32);
    Ok(ScriptValue::Float((x * scale).round() / scale))
}

fn round_int(x: i64, digits: i64) -> i64 {
    if digits >= 0 {
        return x;
    }
    if digits < -18 {
        return 0;
    }
    let scale = 10i128.pow(digits.unsigned_abs() as u32);
    let x = i128::from(x);
    let rounded = (x.abs() + scale / 2) / scale * scale * x.signum();
    i64::try_from(rounded).unwrap_or(if x < 0 { i64::MIN } else { i64::MAX })
}
