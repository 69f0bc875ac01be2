//! # stage_demo
//!
//! A small world exercising the runtime end to end: a frame timer
//! resource, a movement system, a health-regeneration system, and a
//! query-driven report at the end.

use anyhow::Result;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stage_world::{SystemDef, World};

const FRAME_MS: f64 = 16.0;
const REGEN_WINDOW_MS: f64 = 5000.0;
const REGEN_PER_WINDOW: f64 = 5.0;

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stage_demo=info".parse()?))
        .init();

    info!("demo world starting");

    let mut world = World::new(["startup", "update"]);
    world.register_resource("Timer", || json!({ "elapsed": 0.0 }));

    // Spawn a wandering bird and a stationary rock.
    let bird = world.create_entity();
    world.add_component_bundle(
        bird,
        vec![
            ("Position", json!({ "x": 0.0, "y": 10.0 })),
            ("Velocity", json!({ "vx": 1.5, "vy": 0.0 })),
            ("Health", json!({ "hp": 4.0, "max": 20.0 })),
        ],
    )?;
    let rock = world.create_entity();
    world.add_component(rock, "Position", json!({ "x": 50.0, "y": 0.0 }))?;

    // The timer advances once per run; it needs no entities.
    world.add_system(
        SystemDef::new("advance_timer").resource("Timer").run(|_, res| {
            let elapsed = res[0]["elapsed"].as_f64().unwrap_or(0.0);
            res[0]["elapsed"] = json!(elapsed + FRAME_MS);
        }),
        &["update"],
    )?;

    world.add_system(
        SystemDef::new("movement")
            .requires("Position")
            .requires("Velocity")
            .run(|comps, _| {
                let x = comps[0]["x"].as_f64().unwrap_or(0.0);
                let y = comps[0]["y"].as_f64().unwrap_or(0.0);
                let vx = comps[1]["vx"].as_f64().unwrap_or(0.0);
                let vy = comps[1]["vy"].as_f64().unwrap_or(0.0);
                comps[0]["x"] = json!(x + vx);
                comps[0]["y"] = json!(y + vy);
            }),
        &["update"],
    )?;

    world.add_system(
        SystemDef::new("regen_health")
            .requires("Health")
            .resource("Timer")
            .run(|comps, _| {
                let hp = comps[0]["hp"].as_f64().unwrap_or(0.0);
                let max = comps[0]["max"].as_f64().unwrap_or(0.0);
                let regen = (FRAME_MS / REGEN_WINDOW_MS) * REGEN_PER_WINDOW;
                comps[0]["hp"] = json!((hp + regen).min(max));
            }),
        &["update"],
    )?;

    world.run_schedule("startup")?;
    for _ in 0..120 {
        world.run_schedule("update")?;
    }

    let movers = world.query(&["x", "y"]);
    for (entity, bag) in movers.rows() {
        info!(%entity, position = %bag["Position"], "final position");
    }
    let healthy = world.query(&["hp"]);
    for (entity, bag) in healthy.rows() {
        info!(%entity, health = %bag["Health"], "final health");
    }
    info!(
        version = world.clock().now(),
        timer = %world.resource("Timer").unwrap_or_default(),
        "demo world shut down"
    );

    Ok(())
}
