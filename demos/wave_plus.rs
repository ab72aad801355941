//! Read an Airthings Wave Plus by serial number
//!
//! Run with: cargo run --example wave_plus -- --serial 2930170133
//!
//! Options:
//!   --serial <n>       serial number of the sensor (required)
//!   --adapter <name>   Bluetooth adapter to use, e.g. hci1
//!   --action <a>       "get" (default) prints readings, "discover" lists UUIDs
//!   --interval <secs>  keep refreshing every <secs> seconds until Ctrl+C

use airthings_wave_ble::ble::BtleTransport;
use airthings_wave_ble::{Result, SensorScanner, WaveSensor};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("airthings_wave_ble=info,btleplug=warn")
                }),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let serial_number = match arg_value(&args, "--serial").and_then(|s| s.parse::<u32>().ok()) {
        Some(serial) if serial > 0 => serial,
        _ => {
            eprintln!("must supply a serial number to scan for (--serial <n>)");
            std::process::exit(1);
        }
    };
    let action = arg_value(&args, "--action")
        .map(String::as_str)
        .unwrap_or("get")
        .to_string();
    let interval = arg_value(&args, "--interval")
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    let transport = match arg_value(&args, "--adapter") {
        Some(name) => BtleTransport::with_adapter_name(name).await?,
        None => BtleTransport::new().await?,
    };
    let scanner = SensorScanner::new(transport);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nInterrupted!");
            ctrl_c.cancel();
        }
    });

    println!("Scanning for {}...", serial_number);
    let Some(mut sensor) = scanner.find_sensor(serial_number, cancel.clone()).await? else {
        println!("No sensor found");
        return Ok(());
    };
    println!("Connected to {} at {}", serial_number, sensor.address());

    match action.as_str() {
        "get" => {
            print_readings(&mut sensor).await;

            if let Some(interval) = interval {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => print_readings(&mut sensor).await,
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }
        "discover" => match sensor.device_profile().await {
            Ok(profile) => print!("{}", profile),
            Err(e) => println!("Unable to discover UUIDs: {}", e),
        },
        other => println!("Unknown action {:?}, expected \"get\" or \"discover\"", other),
    }

    sensor.disconnect().await?;
    println!("\nDone!");

    Ok(())
}

async fn print_readings(sensor: &mut WaveSensor) {
    match sensor.refresh().await {
        Ok(()) => {}
        Err(e) if e.is_range() => println!("Partial update: {}", e),
        Err(e) => {
            println!("Unable to refresh sensor: {}", e);
            return;
        }
    }

    println!(concat!(
        "Humidity|Illuminance|Radon (Short Term Avg)|Radon (Long Term Avg)|",
        "Temperature|Rel Atm Pressure|CO2 Level|VOC Level|"
    ));
    println!("{}", sensor.readings());
}
