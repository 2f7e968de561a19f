use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use tether_conv::{Callback, NativeFn, try_from_engine};
use tether_runtime::{
    EngineError, EnvironmentError, MemorySourceProvider, ModuleConfig, Ref, Runtime, RuntimeConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tether_runtime=debug")
        .with_test_writer()
        .try_init();
}

fn runtime_in(dir: &TempDir) -> Ref<Runtime> {
    init_tracing();
    Runtime::create(RuntimeConfig {
        modules: ModuleConfig {
            filesystem: true,
            base_dir: Some(dir.path().to_path_buf()),
        },
        ..RuntimeConfig::default()
    })
    .unwrap()
}

#[test]
fn evaluates_on_main_environment() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime_in(&dir);

    let value = runtime
        .main_environment()
        .run_now_blocking(|env| env.evaluate_script::<i32>("1 + 2", "<eval>"))
        .unwrap()
        .unwrap();
    assert_eq!(value, 3);
}

#[test]
fn concurrent_callers_are_serialized() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime_in(&dir);
    let env = runtime.main_environment().clone();

    env.run_now_blocking(|env| env.evaluate_script::<()>("var hits = 0", "init.js"))
        .unwrap()
        .unwrap();

    let threads: Vec<_> = (0..6)
        .map(|_| {
            let env = env.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    env.run_now_blocking(|env| {
                        env.evaluate_script::<()>("hits = hits + 1", "hit.js")
                    })
                    .unwrap()
                    .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let hits = env
        .run_now_blocking(|env| env.get_global::<i32>("hits"))
        .unwrap()
        .unwrap();
    assert_eq!(hits, 150);
}

#[test]
fn loads_relative_modules_from_disk() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("lib")).unwrap();
    std::fs::write(
        dir.path().join("main.js"),
        "const greet = require('./lib/greet'); module.exports = greet('disk') + ' from ' + require('path-name');",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("lib/greet.js"),
        "const suffix = require('../suffix.js'); module.exports = (who) => 'hello ' + who + suffix;",
    )
    .unwrap();
    std::fs::write(dir.path().join("suffix.js"), "module.exports = '!';").unwrap();

    let runtime = runtime_in(&dir);
    runtime.add_source_provider(Arc::new(
        MemorySourceProvider::new().with_module("path-name", "module.exports = __filename;"),
    ));

    let env = runtime.main_environment();
    let value: String = runtime
        .execution_platform()
        .wait(env.import("./main.js"))
        .unwrap()
        .unwrap();
    assert_eq!(value, "hello disk! from path-name");

    let main_path = dir.path().join("main.js").to_string_lossy().into_owned();
    assert!(env.has_module(&main_path));
}

#[test]
fn concurrent_imports_share_one_instance() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("shared.js"),
        "globalThis.loads = (globalThis.loads || 0) + 1; module.exports = loads;",
    )
    .unwrap();

    let runtime = runtime_in(&dir);
    let env = runtime.main_environment();
    let imports = futures::future::join_all((0..4).map(|_| env.import::<i32>("./shared.js")));

    let results = runtime.execution_platform().wait(imports).unwrap();
    assert_eq!(results.len(), 4);
    for result in results {
        assert_eq!(result.unwrap(), 1);
    }
}

#[test]
fn reports_missing_module() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime_in(&dir);

    let result = runtime
        .execution_platform()
        .wait(runtime.main_environment().import::<()>("./nope.js"))
        .unwrap();
    assert!(matches!(result, Err(EnvironmentError::Resolve(_))));
}

#[test]
fn script_errors_keep_message_and_stack() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime_in(&dir);

    let err = runtime
        .main_environment()
        .run_now_blocking(|env| {
            let source = "function fail() { throw new Error('deep') }\nfail()";
            env.evaluate_script::<()>(source, "stack.js")
        })
        .unwrap()
        .unwrap_err();

    match err {
        EnvironmentError::Engine(EngineError::Script { message, stack, .. }) => {
            assert_eq!(message, "Error: deep");
            assert!(stack.unwrap_or_default().contains("fail"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn functions_cross_in_both_directions() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime_in(&dir);

    let result = runtime
        .main_environment()
        .run_now_blocking(|env| {
            env.set_global("clamp", NativeFn::new(|v: i32, lo: i32, hi: i32| v.max(lo).min(hi)))?;
            env.with_context(|ctx| {
                let apply: rquickjs::Value = ctx
                    .eval("(f) => f(15) + clamp(-4, 0, 10)")
                    .unwrap();
                let apply: Callback<(NativeFn<_, fn(i32) -> i32>,), i32> =
                    try_from_engine(&ctx, &apply).unwrap();
                apply.call(NativeFn::new(|x: i32| x * 2)).unwrap()
            })
        })
        .unwrap()
        .unwrap();

    assert_eq!(result, 30);
}
