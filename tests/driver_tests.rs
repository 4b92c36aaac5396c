//! End-to-end properties of `run`: path reads, callable conventions,
//! parallel ordering and latency, nested computations, failure injection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use offstage::{computation, run, Context, Effect, Error};
use serde_json::{json, Value};

#[tokio::test]
async fn string_and_array_path_forms_read_the_same_value() {
    let context = Context::new().with_value("value", json!("foo"));

    let bare = computation(|fx| async move {
        fx.perform(Effect::from_value(&json!(["value"])).unwrap())
            .await
    });
    let wrapped = computation(|fx| async move {
        fx.perform(Effect::from_value(&json!([["value"]])).unwrap())
            .await
    });

    assert_eq!(run(&context, bare).await.unwrap(), json!("foo"));
    assert_eq!(run(&context, wrapped).await.unwrap(), json!("foo"));
}

#[tokio::test]
async fn pure_path_reads_return_exact_context_values() {
    let context = Context::new()
        .with_map("config", Context::new().with_value("increment", 5))
        .with_value("profile", json!({"name": "ada"}));

    let comp = computation(|fx| async move {
        let increment = fx.perform(Effect::read(["config", "increment"])).await?;
        let name = fx.perform(Effect::read(["profile", "name"])).await?;
        Ok(json!({ "increment": increment, "name": name }))
    });

    assert_eq!(
        run(&context, comp).await.unwrap(),
        json!({ "increment": 5, "name": "ada" })
    );
}

#[tokio::test]
async fn callback_success_resolves_to_the_callback_value() {
    let context = Context::new().with_callback("fetch", |args, completer| {
        completer.succeed(json!({ "id": args[0].clone() }))
    });
    let comp = computation(|fx| async move {
        fx.perform(Effect::callback("fetch", [json!(7)])).await
    });
    assert_eq!(run(&context, comp).await.unwrap(), json!({ "id": 7 }));
}

#[tokio::test]
async fn callback_error_fails_the_yield_with_that_error() {
    let context = Context::new()
        .with_callback("fetch", |_, completer| completer.fail(anyhow::anyhow!("down")));
    let comp = computation(|fx| async move {
        fx.perform(Effect::callback("fetch", [])).await
    });
    let err = run(&context, comp).await.unwrap_err();
    match err {
        Error::Execution { path, source } => {
            assert_eq!(path.to_string(), "fetch");
            assert_eq!(source.to_string(), "down");
        }
        other => panic!("expected Execution, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn parallel_preserves_input_order_regardless_of_completion_order() {
    // The first member finishes last; its result still comes back first.
    let context = Context::new()
        .with_async("slow", |_| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(json!("slow"))
        })
        .with_async("fast", |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(json!("fast"))
        });

    let comp = computation(|fx| async move {
        fx.perform(Effect::parallel([
            Effect::read("slow"),
            Effect::read("fast"),
        ]))
        .await
    });

    assert_eq!(run(&context, comp).await.unwrap(), json!(["slow", "fast"]));
}

#[tokio::test(start_paused = true)]
async fn parallel_latency_is_bounded_by_the_slowest_member() {
    let sleepy = |_: Vec<Value>| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(json!("done"))
    };
    let context = Context::new()
        .with_async("a", sleepy)
        .with_async("b", sleepy);

    let comp = computation(|fx| async move {
        fx.perform(Effect::parallel([Effect::read("a"), Effect::read("b")]))
            .await
    });

    let started = tokio::time::Instant::now();
    let value = run(&context, comp).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(value, json!(["done", "done"]));
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn sequential_yields_do_not_overlap() {
    let sleepy = |_: Vec<Value>| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(json!("done"))
    };
    let context = Context::new()
        .with_async("a", sleepy)
        .with_async("b", sleepy);

    let comp = computation(|fx| async move {
        fx.perform(Effect::read("a")).await?;
        fx.perform(Effect::read("b")).await
    });

    let started = tokio::time::Instant::now();
    run(&context, comp).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test]
async fn nested_computation_is_indistinguishable_from_a_flat_effect() {
    let context = Context::new().with_value("value", json!("foo"));

    let flat = computation(|fx| async move { fx.perform(Effect::read("value")).await });
    let nested = computation(|fx| async move {
        let inner = computation(|fx| async move { fx.perform(Effect::read("value")).await });
        fx.nest(inner).await
    });

    let flat_value = run(&context, flat).await.unwrap();
    let nested_value = run(&context, nested).await.unwrap();
    assert_eq!(flat_value, nested_value);
}

#[tokio::test]
async fn failing_effect_is_catchable_inside_the_computation() {
    let context = Context::new().with_sync("boom", |_| Err(anyhow::anyhow!("kaput")));
    let comp = computation(|fx| async move {
        match fx.perform(Effect::read("boom")).await {
            Ok(value) => Ok(value),
            Err(Error::Execution { .. }) => Ok(json!("caught")),
            Err(other) => Err(other),
        }
    });
    assert_eq!(run(&context, comp).await.unwrap(), json!("caught"));
}

#[tokio::test]
async fn read_read_write_round_trip_reaches_the_side_effect() {
    let stored = Arc::new(Mutex::new(None::<i64>));
    let sink = stored.clone();

    let context = Context::new()
        .with_map("config", Context::new().with_value("increment", 5))
        .with_map(
            "someDatabase",
            Context::new()
                .with_sync("getValue", |_| Ok(json!(2)))
                .with_sync("setValue", move |args| {
                    *sink.lock().unwrap() = args[0].as_i64();
                    Ok(json!(null))
                }),
        );

    let comp = computation(|fx| async move {
        let increment = fx
            .perform(Effect::read(["config", "increment"]))
            .await?
            .as_i64()
            .unwrap();
        let value = fx
            .perform(Effect::call(["someDatabase", "getValue"], []))
            .await?
            .as_i64()
            .unwrap();
        fx.perform(Effect::call(
            ["someDatabase", "setValue"],
            [json!(value + increment)],
        ))
        .await?;
        Ok(json!(value + increment))
    });

    assert_eq!(run(&context, comp).await.unwrap(), json!(7));
    assert_eq!(*stored.lock().unwrap(), Some(7));
}

#[tokio::test]
async fn business_logic_errors_terminate_run() {
    let context = Context::new().with_value("flag", true);
    let comp = computation(|fx| async move {
        let flag = fx.perform(Effect::read("flag")).await?;
        if flag == json!(true) {
            return Err(anyhow::anyhow!("refused by policy").into());
        }
        Ok(json!("ok"))
    });
    let err = run(&context, comp).await.unwrap_err();
    assert!(matches!(err, Error::Computation(_)));
    assert!(err.to_string().contains("refused by policy"));
}
