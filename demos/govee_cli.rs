//! CLI application for controlling Govee lights.
//!
//! LAN commands talk to one light given by `--ip` (and optionally `--device`
//! and `--sku` as reported by `discover`). The `bluetooth` command scans for
//! a BLE light and sets its color.
//!
//! Run with: cargo run --example govee_cli -- --help

use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::time::Duration;
use govee_lights_rs::{
    BleConfig, Color, Device, FirstMatch, LanConfig, LanDescriptor, scan_for_bluetooth_device,
    scan_for_devices,
};

#[derive(Parser)]
#[command(name = "govee-cli")]
#[command(about = "Control Govee smart lights from the command line", long_about = None)]
struct Cli {
    /// IP address of the Govee light (LAN commands only)
    #[arg(short, long, global = true)]
    ip: Option<Ipv4Addr>,

    /// Device id of the light, as printed by `discover`
    #[arg(short, long, global = true, default_value = "cli")]
    device: String,

    /// Model of the light, as printed by `discover`
    #[arg(short, long, global = true, default_value = "unknown")]
    sku: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover Govee lights on the network
    Discover {
        /// Discovery timeout in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Turn the light on
    On,

    /// Turn the light off
    Off,

    /// Set RGB color (0-255 for each component)
    Color {
        /// Red component (0-255)
        red: u8,
        /// Green component (0-255)
        green: u8,
        /// Blue component (0-255)
        blue: u8,
    },

    /// Set brightness (1-100)
    Brightness {
        /// Brightness level, clamped to 1-100
        level: i32,
    },

    /// Set color temperature in Kelvin (2000-9000)
    Temperature {
        /// Temperature in Kelvin, clamped to 2000-9000
        kelvin: u32,
    },

    /// Scan for a Bluetooth light and set its RGB color
    Bluetooth {
        /// Scan window in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        window: u64,
        red: u8,
        green: u8,
        blue: u8,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = LanConfig::default();

    match cli.command {
        Commands::Discover { timeout } => {
            println!(
                "Discovering Govee lights on the network (timeout: {}s)...",
                timeout
            );

            let devices = scan_for_devices(&config, Duration::from_secs(timeout)).await;
            if devices.is_empty() {
                println!("No lights found on the network.");
            } else {
                println!("\nFound {} light(s):", devices.len());
                for device in devices {
                    println!(
                        "  IP: {:15}  SKU: {:8}  Device: {}",
                        device.ip.to_string(),
                        device.sku,
                        device.device
                    );
                }
            }
        }

        Commands::Bluetooth {
            window,
            red,
            green,
            blue,
        } => {
            let ble = BleConfig {
                scan_window: Duration::from_secs(window),
                ..BleConfig::default()
            };
            println!("Scanning for Bluetooth lights ({}s)...", window);

            let Some(light) = scan_for_bluetooth_device(&ble, &FirstMatch).await else {
                println!("No Bluetooth light found.");
                return Ok(());
            };
            println!("Found {} ({})", light.name(), light.id());

            if !light.connect().await {
                return Err(format!("could not connect to {}", light.name()).into());
            }
            report(light.set_color(Color::rgb(red, green, blue)).await);
            light.disconnect().await;
        }

        command => {
            let ip = cli
                .ip
                .ok_or("IP address is required for this command. Use --ip <IP>")?;
            let light = LanDescriptor::new(&cli.device, ip, &cli.sku).into_light(&config);
            light.connect().await;

            // The light is dropped without `disconnect`, which would switch it off.
            let ok = match command {
                Commands::On => {
                    println!("Turning light on...");
                    light.set_power(true).await
                }
                Commands::Off => {
                    println!("Turning light off...");
                    light.set_power(false).await
                }
                Commands::Color { red, green, blue } => {
                    println!("Setting color to RGB({}, {}, {})...", red, green, blue);
                    light.set_color(Color::rgb(red, green, blue)).await
                }
                Commands::Brightness { level } => {
                    println!("Setting brightness to {}%...", level);
                    light.set_brightness(level).await
                }
                Commands::Temperature { kelvin } => {
                    println!("Setting color temperature to {}K...", kelvin);
                    light.set_color_temperature(kelvin).await
                }
                Commands::Discover { .. } | Commands::Bluetooth { .. } => unreachable!(),
            };
            report(ok);
        }
    }

    Ok(())
}

fn report(ok: bool) {
    if ok {
        println!("Success!");
    } else {
        eprintln!("Command failed, see the log for details.");
    }
}
