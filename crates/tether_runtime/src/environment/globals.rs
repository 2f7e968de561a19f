//! JavaScript Global Objects
//!
//! Registers `console` and `print` in a fresh context.

use rquickjs::function::Rest;
use rquickjs::{Coerced, Ctx, Function, Object, Result as JsResult};

fn join(args: Rest<Coerced<String>>) -> String {
    args.0
        .into_iter()
        .map(|arg| arg.0)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Register all host globals
pub fn register_globals(ctx: &Ctx<'_>) -> JsResult<()> {
    register_console(ctx)?;

    ctx.globals().set(
        "print",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            println!("{}", join(args));
        })?,
    )?;

    Ok(())
}

/// Register the console object with log, info, warn, error and debug
fn register_console(ctx: &Ctx<'_>) -> JsResult<()> {
    let globals = ctx.globals();

    if globals.get::<_, Object>("console").is_ok() {
        return Ok(());
    }

    let console = Object::new(ctx.clone())?;

    console.set("log", Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        println!("{}", join(args));
    })?)?;

    console.set("info", Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        tracing::info!(target: "tether.js", "{}", join(args));
    })?)?;

    console.set("warn", Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        tracing::warn!(target: "tether.js", "{}", join(args));
    })?)?;

    console.set("error", Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        tracing::error!(target: "tether.js", "{}", join(args));
    })?)?;

    console.set("debug", Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        tracing::debug!(target: "tether.js", "{}", join(args));
    })?)?;

    globals.set("console", console)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rquickjs::{Context, Runtime};
    use std::sync::Arc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

    /// Records the target and level of every event.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(String, Level)>>>);

    impl<S: Subscriber> Layer<S> for Recorder {
        fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
            let meta = event.metadata();
            self.0.lock().push((meta.target().to_string(), *meta.level()));
        }
    }

    #[test]
    fn test_register_globals() {
        let runtime = Runtime::new().unwrap();
        let ctx = Context::full(&runtime).unwrap();

        ctx.with(|ctx| {
            register_globals(&ctx).unwrap();

            let globals = ctx.globals();
            let console: Object = globals.get("console").unwrap();
            let _log: Function = console.get("log").unwrap();
            let _print: Function = globals.get("print").unwrap();
        });
    }

    #[test]
    fn test_console_accepts_non_strings() {
        let runtime = Runtime::new().unwrap();
        let ctx = Context::full(&runtime).unwrap();

        ctx.with(|ctx| {
            register_globals(&ctx).unwrap();
            let _: () = ctx.eval("console.info('n =', 1, { a: 1 }, null)").unwrap();
            let _: () = ctx.eval("print(1, 2, 3)").unwrap();
        });
    }

    #[test]
    fn test_console_levels_route_to_tracing() {
        let recorder = Recorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());

        tracing::subscriber::with_default(subscriber, || {
            let runtime = Runtime::new().unwrap();
            let ctx = Context::full(&runtime).unwrap();

            ctx.with(|ctx| {
                register_globals(&ctx).unwrap();
                let _: () = ctx
                    .eval(
                        "console.log('out'); console.info('i'); console.warn('w'); \
                         console.error('e'); console.debug('d');",
                    )
                    .unwrap();
            });
        });

        let levels: Vec<Level> = recorder
            .0
            .lock()
            .iter()
            .filter(|(target, _)| target == "tether.js")
            .map(|(_, level)| *level)
            .collect();
        assert_eq!(levels, vec![Level::INFO, Level::WARN, Level::ERROR, Level::DEBUG]);
    }
}
