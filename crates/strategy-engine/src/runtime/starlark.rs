//! [`ScriptEngine`] on the `starlark` crate.

use once_cell::sync::Lazy;
use starlark::environment::{Globals, GlobalsBuilder, LibraryExtension, Module};
use starlark::eval::Evaluator;
use starlark::starlark_module;
use starlark::syntax::{AstModule, Dialect};
use starlark::values::dict::{AllocDict, DictRef};
use starlark::values::float::StarlarkFloat;
use starlark::values::list::{AllocList, ListRef};
use starlark::values::tuple::TupleRef;
use starlark::values::{Heap, Value, ValueLike};
use starlark::PrintHandler;
use std::sync::Arc;

use crate::builtins::{emit, BuiltinRegistry, OutputLevel};
use crate::runtime::engine::{
    Bindings, CallOutcome, EngineError, ScriptEngine, ScriptGlobals, CALLBACK_NAMES,
    LEGACY_VARIABLES, STATE_BINDING,
};
use crate::runtime::value::ScriptValue;

/// A parsed strategy script.
///
/// `AstModule` is consumed by evaluation, so the source is kept and parsed
/// again for every run; [`StarlarkEngine::compile`] only proves it parses.
#[derive(Debug, Clone)]
pub struct StarlarkProgram {
    name: String,
    source: Arc<str>,
}

impl StarlarkProgram {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StarlarkEngine;

impl StarlarkEngine {
    pub fn new() -> Self {
        Self
    }

    fn parse(program: &StarlarkProgram) -> Result<AstModule, EngineError> {
        AstModule::parse(
            &format!("{}.star", program.name),
            program.source.to_string(),
            &Dialect::Extended,
        )
        .map_err(|e| EngineError::Compile(e.to_string()))
    }

    fn run(
        &self,
        program: &StarlarkProgram,
        globals: &ScriptGlobals,
        call: Option<(&str, &[ScriptValue])>,
    ) -> Result<CallOutcome, EngineError> {
        let ast = Self::parse(program)?;
        let module = Module::new();
        let heap = module.heap();
        for (name, value) in globals.iter() {
            module.set(name, to_starlark(value, heap));
        }

        let print = CapturedPrint;
        let mut eval = Evaluator::new(&module);
        eval.set_print_handler(&print);
        eval.eval_module(ast, &GLOBALS)
            .map_err(|e| EngineError::Runtime(locate_in_callback(program, e.to_string())))?;

        let value = match call {
            None => ScriptValue::None,
            Some((function, args)) => {
                let callee = module
                    .get(function)
                    .filter(|v| is_function(*v))
                    .ok_or_else(|| EngineError::MissingFunction(function.to_string()))?;
                let args: Vec<Value> = args.iter().map(|a| to_starlark(a, heap)).collect();
                let result = eval
                    .eval_function(callee, &args, &[])
                    .map_err(|e| EngineError::Runtime(e.to_string()))?;
                from_starlark(result)?
            }
        };
        drop(eval);

        Ok(CallOutcome {
            value,
            bindings: collect_bindings(&module)?,
        })
    }
}

impl ScriptEngine for StarlarkEngine {
    type Program = StarlarkProgram;

    fn compile(&self, name: &str, source: &str) -> Result<StarlarkProgram, EngineError> {
        let program = StarlarkProgram {
            name: name.to_string(),
            source: Arc::from(source),
        };
        Self::parse(&program)?;
        Ok(program)
    }

    fn execute(
        &self,
        program: &StarlarkProgram,
        globals: &ScriptGlobals,
    ) -> Result<Bindings, EngineError> {
        self.run(program, globals, None).map(|outcome| outcome.bindings)
    }

    fn call(
        &self,
        program: &StarlarkProgram,
        globals: &ScriptGlobals,
        function: &str,
        args: &[ScriptValue],
    ) -> Result<CallOutcome, EngineError> {
        self.run(program, globals, Some((function, args)))
    }
}

/// Prefixes a module-evaluation error with the top-level function whose body
/// it points into. Starlark resolves names while loading the module, so an
/// unknown name inside `on_start` fails before any callback runs.
fn locate_in_callback(program: &StarlarkProgram, message: String) -> String {
    let Some(line) = error_line(&message, &format!("{}.star:", program.name)) else {
        return message;
    };
    match enclosing_function(&program.source, line) {
        Some(function) => format!("in `{function}` body: {message}"),
        None => message,
    }
}

/// One-based line of the first `<file>:LINE:COL` location in `message`.
fn error_line(message: &str, file: &str) -> Option<usize> {
    let rest = &message[message.find(file)? + file.len()..];
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Name of the top-level `def` whose body contains one-based `line`.
fn enclosing_function(source: &str, line: usize) -> Option<String> {
    let mut current = None;
    for text in source.lines().take(line) {
        let top_level = !text.starts_with([' ', '\t']);
        let trimmed = text.trim();
        if !top_level || trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        current = text
            .strip_prefix("def ")
            .and_then(|rest| rest.split('(').next())
            .map(|name| name.trim().to_string());
    }
    current
}

fn is_function(value: Value) -> bool {
    value.get_type() == "function"
}

fn collect_bindings(module: &Module) -> Result<Bindings, EngineError> {
    let mut bindings = Bindings::default();
    for name in CALLBACK_NAMES {
        if module.get(name).is_some_and(is_function) {
            bindings.functions.insert(name.to_string());
        }
    }
    for name in LEGACY_VARIABLES {
        if let Some(value) = module.get(name) {
            bindings
                .variables
                .insert(name.to_string(), from_starlark(value)?);
        }
    }
    bindings.state = module.get(STATE_BINDING).map(from_starlark).transpose()?;
    Ok(bindings)
}

pub(crate) fn to_starlark<'v>(value: &ScriptValue, heap: &'v Heap) -> Value<'v> {
    match value {
        ScriptValue::None => Value::new_none(),
        ScriptValue::Bool(b) => Value::new_bool(*b),
        ScriptValue::Int(i) => heap.alloc(*i),
        ScriptValue::Float(f) => heap.alloc(*f),
        ScriptValue::Str(s) => heap.alloc(s.as_str()),
        ScriptValue::List(items) => {
            heap.alloc(AllocList(items.iter().map(|item| to_starlark(item, heap))))
        }
        ScriptValue::Dict(map) => heap.alloc(AllocDict(
            map.iter()
                .map(|(k, v)| (k.as_str(), to_starlark(v, heap))),
        )),
    }
}

pub(crate) fn from_starlark(value: Value) -> Result<ScriptValue, EngineError> {
    if value.is_none() {
        return Ok(ScriptValue::None);
    }
    if let Some(b) = value.unpack_bool() {
        return Ok(ScriptValue::Bool(b));
    }
    let converted = match value.get_type() {
        "int" => match value.unpack_i32() {
            Some(i) => ScriptValue::Int(i64::from(i)),
            None => {
                let text = value.to_str();
                match text.parse::<i64>() {
                    Ok(i) => ScriptValue::Int(i),
                    Err(_) => ScriptValue::Float(text.parse::<f64>().unwrap_or(f64::NAN)),
                }
            }
        },
        "float" => match value.downcast_ref::<StarlarkFloat>() {
            Some(f) => ScriptValue::Float(f.0),
            None => ScriptValue::Float(value.to_str().parse::<f64>().unwrap_or(f64::NAN)),
        },
        "string" => ScriptValue::Str(value.unpack_str().unwrap_or_default().to_string()),
        "list" => {
            let list = ListRef::from_value(value)
                .ok_or_else(|| EngineError::Runtime("malformed list".into()))?;
            ScriptValue::List(
                list.content()
                    .iter()
                    .map(|v| from_starlark(*v))
                    .collect::<Result<_, _>>()?,
            )
        }
        "tuple" => {
            let tuple = TupleRef::from_value(value)
                .ok_or_else(|| EngineError::Runtime("malformed tuple".into()))?;
            ScriptValue::List(
                tuple
                    .content()
                    .iter()
                    .map(|v| from_starlark(*v))
                    .collect::<Result<_, _>>()?,
            )
        }
        "dict" => {
            let dict = DictRef::from_value(value)
                .ok_or_else(|| EngineError::Runtime("malformed dict".into()))?;
            let mut map = indexmap::IndexMap::new();
            for (k, v) in dict.iter() {
                let key = match k.unpack_str() {
                    Some(s) => s.to_string(),
                    None => k.to_str(),
                };
                map.insert(key, from_starlark(v)?);
            }
            ScriptValue::Dict(map)
        }
        _ => ScriptValue::Str(value.to_str()),
    };
    Ok(converted)
}

struct CapturedPrint;

impl PrintHandler for CapturedPrint {
    fn println(&self, text: &str) -> anyhow::Result<()> {
        emit(OutputLevel::Info, text);
        Ok(())
    }
}

fn dispatch<'v>(
    name: &str,
    args: &[Option<Value<'v>>],
    heap: &'v Heap,
) -> anyhow::Result<Value<'v>> {
    let values = args
        .iter()
        .map(|arg| match arg {
            Some(v) => from_starlark(*v),
            None => Ok(ScriptValue::None),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let result = BuiltinRegistry::global().call(name, &values)?;
    Ok(to_starlark(&result, heap))
}

/// Registry entries as Starlark functions. Every parameter is optional at
/// the interpreter level; the registry enforces arity.
#[starlark_module]
fn registry_functions(builder: &mut GlobalsBuilder) {
    fn sma<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("sma", &[src, period], heap)
    }

    fn ema<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("ema", &[src, period], heap)
    }

    fn wma<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("wma", &[src, period], heap)
    }

    fn hma<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("hma", &[src, period], heap)
    }

    fn smma<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("smma", &[src, period], heap)
    }

    fn tema<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("tema", &[src, period], heap)
    }

    fn alma<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        offset: Option<Value<'v>>,
        sigma: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("alma", &[src, period, offset, sigma], heap)
    }

    fn kama<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("kama", &[src, period, fast, slow], heap)
    }

    fn rsi<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("rsi", &[src, period], heap)
    }

    fn stochastic<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        k_period: Option<Value<'v>>,
        d_period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("stochastic", &[high, low, close, k_period, d_period], heap)
    }

    fn stoch_rsi<'v>(
        src: Option<Value<'v>>,
        rsi_period: Option<Value<'v>>,
        stoch_period: Option<Value<'v>>,
        k_period: Option<Value<'v>>,
        d_period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("stoch_rsi", &[src, rsi_period, stoch_period, k_period, d_period], heap)
    }

    fn cci<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("cci", &[high, low, close, period], heap)
    }

    fn cci_smoothed<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        smoothing: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("cci_smoothed", &[high, low, close, period, smoothing], heap)
    }

    fn williams_r<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("williams_r", &[high, low, close, period], heap)
    }

    fn ultimate_oscillator<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        short: Option<Value<'v>>,
        medium: Option<Value<'v>>,
        long: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("ultimate_oscillator", &[high, low, close, short, medium, long], heap)
    }

    fn awesome_oscillator<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("awesome_oscillator", &[high, low, fast, slow], heap)
    }

    fn accelerator_oscillator<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        signal: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("accelerator_oscillator", &[high, low, fast, slow, signal], heap)
    }

    fn cmo<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("cmo", &[src, period], heap)
    }

    fn stc<'v>(
        src: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        cycle: Option<Value<'v>>,
        factor: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("stc", &[src, fast, slow, cycle, factor], heap)
    }

    fn tsi<'v>(
        src: Option<Value<'v>>,
        long: Option<Value<'v>>,
        short: Option<Value<'v>>,
        signal: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("tsi", &[src, long, short, signal], heap)
    }

    fn kst<'v>(
        src: Option<Value<'v>>,
        signal: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("kst", &[src, signal], heap)
    }

    fn roc<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("roc", &[src, period], heap)
    }

    fn bollinger<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("bollinger", &[src, period, multiplier], heap)
    }

    fn bollinger_percent_b<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("bollinger_percent_b", &[src, period, multiplier], heap)
    }

    fn bollinger_bandwidth<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("bollinger_bandwidth", &[src, period, multiplier], heap)
    }

    fn stdev<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("stdev", &[src, period], heap)
    }

    fn atr<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("atr", &[high, low, close, period], heap)
    }

    fn keltner<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        atr_period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("keltner", &[high, low, close, period, multiplier, atr_period], heap)
    }

    fn donchian<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("donchian", &[high, low, period], heap)
    }

    fn price_channel<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("price_channel", &[high, low, period], heap)
    }

    fn chandelier_exit<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("chandelier_exit", &[high, low, close, period, multiplier], heap)
    }

    fn chande_kroll_stop<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        stop_period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("chande_kroll_stop", &[high, low, close, period, multiplier, stop_period], heap)
    }

    fn macd<'v>(
        src: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        signal: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("macd", &[src, fast, slow, signal], heap)
    }

    fn adx<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("adx", &[high, low, close, period], heap)
    }

    fn aroon<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("aroon", &[high, low, period], heap)
    }

    fn parabolic_sar<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        step: Option<Value<'v>>,
        max_step: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("parabolic_sar", &[high, low, step, max_step], heap)
    }

    fn supertrend<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        multiplier: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("supertrend", &[high, low, close, period, multiplier], heap)
    }

    fn vortex<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("vortex", &[high, low, close, period], heap)
    }

    fn ichimoku<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        tenkan: Option<Value<'v>>,
        kijun: Option<Value<'v>>,
        senkou: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("ichimoku", &[high, low, close, tenkan, kijun, senkou], heap)
    }

    fn alligator<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("alligator", &[high, low], heap)
    }

    fn obv<'v>(
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("obv", &[close, volume], heap)
    }

    fn vwap<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("vwap", &[high, low, close, volume], heap)
    }

    fn mfi<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("mfi", &[high, low, close, volume, period], heap)
    }

    fn accumulation_distribution<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("accumulation_distribution", &[high, low, close, volume], heap)
    }

    fn chaikin_oscillator<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("chaikin_oscillator", &[high, low, close, volume, fast, slow], heap)
    }

    fn chaikin_money_flow<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("chaikin_money_flow", &[high, low, close, volume, period], heap)
    }

    fn force_index<'v>(
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("force_index", &[close, volume, period], heap)
    }

    fn elder_force_index<'v>(
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        short: Option<Value<'v>>,
        long: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("elder_force_index", &[close, volume, short, long], heap)
    }

    fn ease_of_movement<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("ease_of_movement", &[high, low, volume, period], heap)
    }

    fn klinger<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        signal: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("klinger", &[high, low, close, volume, fast, slow, signal], heap)
    }

    fn volume_oscillator<'v>(
        volume: Option<Value<'v>>,
        fast: Option<Value<'v>>,
        slow: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("volume_oscillator", &[volume, fast, slow], heap)
    }

    fn volume_profile<'v>(
        close: Option<Value<'v>>,
        volume: Option<Value<'v>>,
        rows: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("volume_profile", &[close, volume, rows], heap)
    }

    fn elder_ray<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("elder_ray", &[high, low, close, period], heap)
    }

    fn dpo<'v>(
        close: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("dpo", &[close, period], heap)
    }

    fn mass_index<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        ema_period: Option<Value<'v>>,
        sum_period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("mass_index", &[high, low, ema_period, sum_period], heap)
    }

    fn coppock<'v>(
        close: Option<Value<'v>>,
        long_roc: Option<Value<'v>>,
        short_roc: Option<Value<'v>>,
        wma_period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("coppock", &[close, long_roc, short_roc, wma_period], heap)
    }

    fn balance_of_power<'v>(
        open: Option<Value<'v>>,
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("balance_of_power", &[open, high, low, close], heap)
    }

    fn heikin_ashi<'v>(
        open: Option<Value<'v>>,
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("heikin_ashi", &[open, high, low, close], heap)
    }

    fn pivot_points<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        close: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("pivot_points", &[high, low, close], heap)
    }

    fn fibonacci_retracement<'v>(
        high: Option<Value<'v>>,
        low: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("fibonacci_retracement", &[high, low], heap)
    }

    fn linear_regression<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("linear_regression", &[src, period], heap)
    }

    fn highest<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("highest", &[src, period], heap)
    }

    fn lowest<'v>(
        src: Option<Value<'v>>,
        period: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("lowest", &[src, period], heap)
    }

    fn crossover<'v>(
        a: Option<Value<'v>>,
        b: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("crossover", &[a, b], heap)
    }

    fn crossunder<'v>(
        a: Option<Value<'v>>,
        b: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("crossunder", &[a, b], heap)
    }

    fn log<'v>(
        message: Option<Value<'v>>,
        level: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("log", &[message, level], heap)
    }

    fn round<'v>(
        x: Option<Value<'v>>,
        digits: Option<Value<'v>>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        dispatch("round", &[x, digits], heap)
    }
}

#[starlark_module]
fn math_members(builder: &mut GlobalsBuilder) {
    fn abs<'v>(x: Value<'v>, heap: &'v Heap) -> anyhow::Result<Value<'v>> {
        dispatch("abs", &[Some(x)], heap)
    }
}

fn math_namespace(builder: &mut GlobalsBuilder) {
    builder.struct_("math", math_members);
}

static GLOBALS: Lazy<Globals> = Lazy::new(|| {
    GlobalsBuilder::extended_by(&[
        LibraryExtension::Print,
        LibraryExtension::StructType,
        LibraryExtension::Map,
        LibraryExtension::Filter,
        LibraryExtension::Json,
    ])
    .with(registry_functions)
    .with(math_namespace)
    .build()
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::capture;

    fn engine_run(source: &str, globals: &ScriptGlobals, call: Option<(&str, &[ScriptValue])>) -> Result<CallOutcome, EngineError> {
        let engine = StarlarkEngine::new();
        let program = engine.compile("test", source)?;
        match call {
            None => engine.execute(&program, globals).map(|bindings| CallOutcome {
                value: ScriptValue::None,
                bindings,
            }),
            Some((f, args)) => engine.call(&program, globals, f, args),
        }
    }

    #[test]
    fn syntax_errors_fail_compile() {
        let err = StarlarkEngine::new().compile("bad", "def f(:\n").unwrap_err();
        assert!(matches!(err, EngineError::Compile(_)));
    }

    #[test]
    fn reports_defined_callbacks_and_legacy_variables() {
        let source = "def on_kline(kline):\n    return None\n\naction = \"buy\"\nquantity = 2\n";
        let outcome = engine_run(source, &ScriptGlobals::new(), None).unwrap();
        assert!(outcome.bindings.defines("on_kline"));
        assert!(!outcome.bindings.defines("on_start"));
        assert_eq!(outcome.bindings.variable("action"), Some(&ScriptValue::from("buy")));
        assert_eq!(outcome.bindings.variable("quantity"), Some(&ScriptValue::Int(2)));
    }

    #[test]
    fn calls_function_with_converted_arguments() {
        let source = "def on_kline(kline):\n    return {\"action\": \"sell\", \"price\": kline[\"close\"] * 2}\n";
        let event = ScriptValue::dict([("close", ScriptValue::Float(1.5))]);
        let outcome = engine_run(source, &ScriptGlobals::new(), Some(("on_kline", &[event]))).unwrap();
        assert_eq!(outcome.value.get("action"), Some(&ScriptValue::from("sell")));
        assert_eq!(outcome.value.get("price"), Some(&ScriptValue::Float(3.0)));
    }

    #[test]
    fn missing_function_is_distinguished() {
        let err = engine_run("x = 1\n", &ScriptGlobals::new(), Some(("on_start", &[]))).unwrap_err();
        assert_eq!(err, EngineError::MissingFunction("on_start".into()));
    }

    #[test]
    fn state_mutations_are_returned() {
        let mut globals = ScriptGlobals::new();
        globals.set(STATE_BINDING, ScriptValue::dict([("n", ScriptValue::Int(1))]));
        let source = "def on_start():\n    state[\"n\"] = state[\"n\"] + 1\n";
        let outcome = engine_run(source, &globals, Some(("on_start", &[]))).unwrap();
        assert_eq!(
            outcome.bindings.state.and_then(|s| s.get("n").cloned()),
            Some(ScriptValue::Int(2))
        );
    }

    #[test]
    fn builtins_and_math_are_bound() {
        let mut globals = ScriptGlobals::new();
        globals.set("close", ScriptValue::series(&[100.0, 102.0, 101.0, 103.0, 105.0]));
        let source = concat!(
            "s = sma(close, 3)\n",
            "bb = bollinger(close, period = 3)\n",
            "action = \"buy\" if s[-1] > s[-2] else \"hold\"\n",
            "quantity = math.abs(-0.5)\n",
            "price = round(bb[\"middle\"][-1], 1)\n",
            "reason = str(len(range(3)))\n",
        );
        let outcome = engine_run(source, &globals, None).unwrap();
        let vars = &outcome.bindings.variables;
        assert_eq!(vars.get("action"), Some(&ScriptValue::from("buy")));
        assert_eq!(vars.get("quantity"), Some(&ScriptValue::Float(0.5)));
        assert_eq!(vars.get("price"), Some(&ScriptValue::Float(103.0)));
        assert_eq!(vars.get("reason"), Some(&ScriptValue::from("3")));
    }

    #[test]
    fn every_registry_builtin_is_reachable_from_scripts() {
        let mut source = String::new();
        for name in BuiltinRegistry::global().names() {
            if name == "abs" {
                source.push_str("_abs = math.abs\n");
            } else {
                source.push_str(&format!("_{name} = {name}\n"));
            }
        }
        assert!(engine_run(&source, &ScriptGlobals::new(), None).is_ok());
    }

    #[test]
    fn load_errors_name_the_enclosing_callback() {
        let source = "x = 1\n\ndef on_start():\n    # set up\n\n    undefined_helper()\n\ny = 2\n";
        assert_eq!(enclosing_function(source, 6).as_deref(), Some("on_start"));
        assert_eq!(enclosing_function(source, 1), None);
        assert_eq!(enclosing_function(source, 8), None);

        let message = "error: Variable `undefined_helper` not found\n --> strat.star:6:5\n";
        assert_eq!(error_line(message, "strat.star:"), Some(6));
        assert_eq!(error_line("no location", "strat.star:"), None);

        let program = StarlarkEngine::new().compile("strat", source).unwrap();
        assert_eq!(
            locate_in_callback(&program, message.to_string()),
            format!("in `on_start` body: {message}")
        );
        assert_eq!(locate_in_callback(&program, "boom".into()), "boom");
    }

    #[test]
    fn floats_convert_without_going_through_text() {
        let source = "price = 0.1 + 0.2\nquantity = -1e-300\n";
        let outcome = engine_run(source, &ScriptGlobals::new(), None).unwrap();
        let vars = &outcome.bindings.variables;
        assert_eq!(vars.get("price"), Some(&ScriptValue::Float(0.1 + 0.2)));
        assert_eq!(vars.get("quantity"), Some(&ScriptValue::Float(-1e-300)));
    }

    #[test]
    fn builtin_argument_errors_abort_evaluation() {
        let err = engine_run("x = sma([1, 2, 3], -2)\n", &ScriptGlobals::new(), None).unwrap_err();
        match err {
            EngineError::Runtime(message) => assert!(message.contains("positive integer")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn print_and_log_are_captured() {
        let source = "print(\"hello\")\nlog(\"careful\", \"warn\")\n";
        let (result, lines) = capture(|| engine_run(source, &ScriptGlobals::new(), None));
        assert!(result.is_ok());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "hello");
        assert_eq!(lines[1].level, OutputLevel::Warn);
    }

    #[test]
    fn undefined_series_values_survive_the_round_trip() {
        let mut globals = ScriptGlobals::new();
        globals.set("close", ScriptValue::series(&[1.0, 2.0, 3.0]));
        let outcome = engine_run("def f():\n    return sma(close, 2)\n", &globals, Some(("f", &[]))).unwrap();
        let items = outcome.value.as_list().unwrap().to_vec();
        assert!(items[0].as_f64().is_some_and(f64::is_nan));
        assert_eq!(items[1], ScriptValue::Float(1.5));
    }
}
