//! Script runtime and callback discovery against strategy files on disk.

use std::fs;
use std::path::Path;

use strategy_engine::market::Kline;
use strategy_engine::runtime::{EventCallback, Lifecycle};
use strategy_engine::{
    Action, CallbackValidator, Phase, ScriptError, ScriptResolver, ScriptRuntime, ScriptSession,
    ScriptValue, StrategyContext,
};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{name}.star")), source).unwrap();
}

fn runtime_in(dir: &TempDir) -> ScriptRuntime {
    ScriptRuntime::new(ScriptResolver::new([dir.path()]))
}

fn context_with_bars(count: usize) -> StrategyContext {
    let klines = (0..count)
        .map(|i| {
            let close = 100.0 + i as f64;
            Kline {
                timestamp: 1_700_000_000_000 + i as i64 * 60_000,
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 5.0,
            }
        })
        .collect();
    StrategyContext::new("BTCUSDT", "binance").with_klines(klines)
}

#[test]
fn kline_only_script_has_kline_capability() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "kline_only", "def on_kline(kline):\n    return None\n");
    let runtime = runtime_in(&dir);

    let callbacks = CallbackValidator::validate(&runtime, "kline_only", "BTCUSDT", "binance").unwrap();
    assert!(callbacks.has_on_kline);
    assert!(!callbacks.has_on_start);
    assert!(!callbacks.has_on_stop);
    assert!(!callbacks.has_on_orderbook);
    assert!(!callbacks.has_on_ticker);

    let context = StrategyContext::new("BTCUSDT", "binance");
    let mut session = ScriptSession::new();
    for lifecycle in [Lifecycle::Start, Lifecycle::Stop] {
        runtime
            .run_lifecycle("kline_only", lifecycle, &context, &mut session)
            .unwrap();
    }
}

#[test]
fn first_root_containing_the_script_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_script(second.path(), "picked", "action = \"sell\"\n");
    write_script(first.path(), "picked", "action = \"buy\"\n");

    let runtime = ScriptRuntime::new(ScriptResolver::new([first.path(), second.path()]));
    let signal = runtime
        .execute_legacy("picked", &context_with_bars(1), &mut ScriptSession::new())
        .unwrap();
    assert_eq!(signal.action, Action::Buy);
}

#[test]
fn missing_script_lists_searched_paths() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime_in(&dir);
    match runtime.load("nowhere") {
        Err(ScriptError::NotFound { strategy, searched }) => {
            assert_eq!(strategy, "nowhere");
            assert_eq!(searched, vec![dir.path().join("nowhere.star")]);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn syntax_errors_fail_at_load() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "broken", "def on_kline(kline:\n    return None\n");
    let runtime = runtime_in(&dir);
    let err = runtime.load("broken").unwrap_err();
    assert!(matches!(err, ScriptError::Compile { .. }));
    assert!(err.is_fatal());
    assert!(err.to_string().contains("broken"));
}

#[test]
fn failing_on_start_names_strategy_and_phase() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "needs_key",
        "def on_start():\n    state[\"size\"] = config[\"size\"]\n",
    );
    let runtime = runtime_in(&dir);
    let err = runtime
        .run_lifecycle(
            "needs_key",
            Lifecycle::Start,
            &StrategyContext::new("BTCUSDT", "binance"),
            &mut ScriptSession::new(),
        )
        .unwrap_err();

    assert_eq!(err.strategy(), "needs_key");
    assert_eq!(err.phase(), Some(Phase::OnStart));
    assert!(!err.is_fatal());
    let message = err.to_string();
    assert!(message.contains("needs_key") && message.contains("on_start"), "{message}");
}

#[test]
fn unknown_name_in_a_callback_body_is_traced_to_that_callback() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "unresolved",
        "def on_kline(kline):\n    return None\n\ndef on_start():\n    undefined_helper()\n",
    );
    let runtime = runtime_in(&dir);
    let err = CallbackValidator::validate(&runtime, "unresolved", "BTCUSDT", "binance").unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Validate));
    let message = err.to_string();
    assert!(message.contains("in `on_start` body"), "{message}");
    assert!(message.contains("undefined_helper"), "{message}");
}

#[test]
fn state_survives_while_other_globals_are_rebuilt() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "counter",
        r#"
def on_kline(kline):
    state["seen"] = state.get("seen", 0) + 1
    state["bars"] = len(close)
    return None
"#,
    );
    let runtime = runtime_in(&dir);
    let mut session = ScriptSession::new();
    for bars in [3, 5] {
        runtime
            .invoke(
                "counter",
                EventCallback::Kline,
                ScriptValue::empty_dict(),
                &context_with_bars(bars),
                &mut session,
            )
            .unwrap();
    }
    assert_eq!(session.state.get("seen"), Some(&ScriptValue::Int(2)));
    assert_eq!(session.state.get("bars"), Some(&ScriptValue::Int(5)));
}

#[test]
fn crossover_strategy_trades_on_indicator_values() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "sma_cross",
        r#"
def settings():
    return {"interval": "5m", "fast": 3, "slow": 6}

def on_kline(kline):
    fast = sma(close, config["fast"])
    slow = sma(close, config["slow"])
    if crossover(fast, slow):
        return {"action": "buy", "quantity": 0.5, "reason": "fast above slow"}
    if fast[-1] > slow[-1]:
        return {"action": "hold"}
    return None
"#,
    );
    let runtime = runtime_in(&dir);
    let mut session = ScriptSession::new();

    let settings = runtime
        .settings("sma_cross", &StrategyContext::new("BTCUSDT", "binance"), &mut session)
        .unwrap();
    assert_eq!(settings.interval.as_deref(), Some("5m"));
    let mut config = ScriptValue::empty_dict();
    config.merge_defaults(&settings.params);

    // Falling then sharply rising closes: the 3-bar average overtakes the
    // 6-bar one on the last bar only.
    let closes = [110.0, 108.0, 106.0, 104.0, 102.0, 100.0, 99.0, 98.0, 97.0, 112.0];
    let klines: Vec<Kline> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Kline {
            timestamp: i as i64 * 300_000,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        })
        .collect();

    let before = StrategyContext::new("BTCUSDT", "binance")
        .with_klines(klines[..9].to_vec())
        .with_config(config.clone());
    let held = runtime
        .invoke("sma_cross", EventCallback::Kline, ScriptValue::empty_dict(), &before, &mut session)
        .unwrap();
    assert!(held.is_hold());

    let after = StrategyContext::new("BTCUSDT", "binance")
        .with_klines(klines)
        .with_config(config);
    let signal = runtime
        .invoke("sma_cross", EventCallback::Kline, ScriptValue::empty_dict(), &after, &mut session)
        .unwrap();
    assert_eq!(signal.action, Action::Buy);
    assert_eq!(signal.quantity, 0.5);
    assert_eq!(signal.reason, "fast above slow");
}

#[test]
fn bad_builtin_arguments_become_execution_errors() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "bad_args",
        "def on_kline(kline):\n    return sma(close)\n\ndef on_ticker(t):\n    return rsi(close, \"fourteen\")\n",
    );
    let runtime = runtime_in(&dir);
    let context = context_with_bars(20);
    let mut session = ScriptSession::new();

    let arity = runtime
        .invoke("bad_args", EventCallback::Kline, ScriptValue::empty_dict(), &context, &mut session)
        .unwrap_err();
    assert_eq!(arity.phase(), Some(Phase::OnKline));
    assert!(arity.to_string().contains("sma()"), "{arity}");

    let typed = runtime
        .invoke("bad_args", EventCallback::Ticker, ScriptValue::empty_dict(), &context, &mut session)
        .unwrap_err();
    assert_eq!(typed.phase(), Some(Phase::OnTicker));
    assert!(typed.to_string().contains("rsi()"), "{typed}");
}

#[test]
fn legacy_script_reads_module_variables() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "legacy",
        r#"
last = close[-1]
action = "sell" if last > 105 else "hold"
quantity = 2
price = last
type = "limit"
reason = "above 105"
"#,
    );
    let runtime = runtime_in(&dir);

    let quiet = runtime
        .execute_legacy("legacy", &context_with_bars(3), &mut ScriptSession::new())
        .unwrap();
    assert!(quiet.is_hold());

    let signal = runtime
        .execute_legacy("legacy", &context_with_bars(10), &mut ScriptSession::new())
        .unwrap();
    assert_eq!(signal.action, Action::Sell);
    assert_eq!(signal.quantity, 2.0);
    assert_eq!(signal.price, 109.0);
    assert_eq!(signal.order_type, event_bus::OrderType::Limit);
}

#[test]
fn edited_script_is_picked_up_after_invalidate() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "edited", "action = \"buy\"\n");
    let runtime = runtime_in(&dir);
    let context = context_with_bars(1);

    let first = runtime
        .execute_legacy("edited", &context, &mut ScriptSession::new())
        .unwrap();
    assert_eq!(first.action, Action::Buy);

    write_script(dir.path(), "edited", "action = \"sell\"\n");
    let cached = runtime
        .execute_legacy("edited", &context, &mut ScriptSession::new())
        .unwrap();
    assert_eq!(cached.action, Action::Buy);

    assert!(runtime.invalidate("edited"));
    let reloaded = runtime
        .execute_legacy("edited", &context, &mut ScriptSession::new())
        .unwrap();
    assert_eq!(reloaded.action, Action::Sell);
}

#[test]
fn bundled_sma_cross_strategy_validates() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../strategies");
    let runtime = ScriptRuntime::new(ScriptResolver::new([root]));

    let callbacks = CallbackValidator::validate(&runtime, "sma_cross", "BTCUSDT", "binance").unwrap();
    assert!(callbacks.has_settings && callbacks.has_on_start && callbacks.has_on_stop);
    assert!(callbacks.has_on_kline);

    let context = StrategyContext::new("BTCUSDT", "binance");
    let mut session = ScriptSession::new();
    let settings = runtime.settings("sma_cross", &context, &mut session).unwrap();
    assert_eq!(settings.interval.as_deref(), Some("1m"));
    assert_eq!(settings.params.get("slow"), Some(&ScriptValue::Int(21)));

    runtime
        .run_lifecycle("sma_cross", Lifecycle::Start, &context, &mut session)
        .unwrap();
    assert_eq!(session.state.get("position"), Some(&ScriptValue::from("flat")));
}
