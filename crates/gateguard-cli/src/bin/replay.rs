//! Replays a simulated layover walk through the navigation engine.
//!
//! Starts the engine against an offline directions stub, walks the demo
//! itinerary, wanders off the route partway through to trigger a
//! reroute, and prints every engine announcement as a JSON line.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use clap::Parser;
use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateguard_cli::sim::{demo_plan, offset_north, StubDirections, TripWalk};
use gateguard_core::models::Position;
use gateguard_engine::{Clock, ManualClock, NavCommand, NavConfig, NavEngine};

/// Replay a simulated layover trip through the navigation engine
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Minutes until the scheduled departure
    #[arg(long, default_value_t = 180)]
    departure_minutes: i64,

    /// Simulated seconds between position samples
    #[arg(long, default_value_t = 5)]
    sample_secs: u64,

    /// Walking speed in m/s
    #[arg(long, default_value_t = 1.4)]
    speed: f64,

    /// Sample index at which the walker leaves the route
    #[arg(long, default_value_t = 40)]
    deviate_at: usize,

    /// How many samples the walker stays off the route
    #[arg(long, default_value_t = 12)]
    deviate_for: usize,

    /// GPS noise amplitude in meters
    #[arg(long, default_value_t = 4.0)]
    noise_m: f64,

    /// Total samples to replay
    #[arg(long, default_value_t = 120)]
    samples: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gateguard=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = NavConfig::from_env();
    config.validate()?;

    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let provider = Arc::new(StubDirections::new(Duration::from_millis(50)));
    let handle = NavEngine::spawn(config, provider, clock.clone());

    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(error) => eprintln!("failed to encode event: {error}"),
            }
        }
    });

    let departure = clock.now() + ChronoDuration::minutes(args.departure_minutes);
    let plan = demo_plan(Some(departure));
    let walk = TripWalk::new(&plan, args.speed);

    println!(
        "Replaying {} samples every {}s, walk of {:.0} m, departure in {} minutes",
        args.samples,
        args.sample_secs,
        walk.total_length_m(),
        args.departure_minutes
    );

    handle.send(NavCommand::Start { plan }).await?;

    let mut rng = rand::rng();
    for index in 0..args.samples {
        let elapsed = (index as u64 * args.sample_secs) as f64;
        let mut point = walk.position_at(elapsed);

        let deviating = index >= args.deviate_at && index < args.deviate_at + args.deviate_for;
        if deviating {
            point = offset_north(point, 80.0);
        }
        if args.noise_m > 0.0 {
            point = offset_north(point, rng.random_range(-args.noise_m..args.noise_m));
        }

        let accuracy_m = if deviating { 15.0 } else { 8.0 };
        handle
            .send(NavCommand::Sample(Position::new(
                point.lat,
                point.lng,
                accuracy_m,
                clock.now(),
            )))
            .await?;

        clock.advance(ChronoDuration::seconds(args.sample_secs as i64));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    handle.send(NavCommand::Stop).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    drop(handle);
    let _ = printer.await;

    Ok(())
}
