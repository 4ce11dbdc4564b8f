//! Discover all Govee lights and set them to red.
//!
//! This example demonstrates:
//! - Driving a `Controller` with requests
//! - Reading the events it sends back
//! - Connecting to and coloring every discovered light
//!
//! Run with: cargo run --example scan_and_set_red

use futures::channel::mpsc::unbounded;
use govee_lights_rs::{Color, Config, Controller, Event, Request};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (events, mut received) = unbounded();
    let controller = Controller::new(Config::default(), events);
    controller.start().await;

    println!("Scanning for Govee lights...");
    controller.handle(Request::Scan).await;

    let devices = controller.registry().summaries().await;
    if devices.is_empty() {
        println!("No lights found.");
        controller.stop().await;
        return Ok(());
    }

    println!("Found {} light(s):", devices.len());
    for device in &devices {
        println!("  - {} ({})", device.name, device.id);
    }

    let ids: Vec<String> = devices.into_iter().map(|device| device.id).collect();
    controller
        .handle(Request::Connect {
            device_ids: ids.clone(),
        })
        .await;

    println!("\nSetting all lights to red...");
    controller
        .handle(Request::SetColor {
            device_ids: ids,
            color: Color::rgb(255, 0, 0),
        })
        .await;

    while let Ok(Some(event)) = received.try_next() {
        match event {
            Event::ScanStatus { scanning } => println!("  scanning: {}", scanning),
            Event::Devices { devices } => {
                let connected = devices.iter().filter(|d| d.connected).count();
                println!("  {} of {} light(s) connected", connected, devices.len());
            }
            Event::CommandResult { results } => {
                let ok = results.iter().filter(|ok| **ok).count();
                println!("  {} of {} light(s) set to red", ok, results.len());
            }
        }
    }

    // `stop` would disconnect the lights, which switches them off.
    println!("\nDone!");
    Ok(())
}
