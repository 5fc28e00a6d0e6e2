use std::error::Error;
use std::net::TcpStream;
use std::time::Duration;

use ascii_table::{Align, AsciiTable};
use clap::Parser;
use xbeeapp::device::{DeviceConfig, XBeeDevice};
use xbeeapp::serial::SerialTransport;
use xbeecore::protocol::OperatingMode;

#[derive(Parser)]
struct Args {
    #[arg(short = 'p', help = "Serial port of the local XBee, e.g. /dev/ttyUSB0")]
    port: Option<String>,
    #[arg(short = 'b', default_value = "9600", help = "Serial baud rate")]
    baud: u32,
    #[arg(
        short = 't',
        help = "host:port of an XBee exposing its API over TCP, instead of a serial port"
    )]
    tcp: Option<String>,
    #[arg(short = 'e', help = "Use API mode 2 (escaped)")]
    escaped: bool,
    #[arg(short = 's', help = "Seconds to collect replies for")]
    timeout: Option<u64>,
    #[arg(short = 'w', help = "Scan for Wi-Fi access points instead of discovering nodes")]
    wifi: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = DeviceConfig {
        operating_mode: if args.escaped {
            OperatingMode::ApiEscape
        } else {
            OperatingMode::Api
        },
        ..Default::default()
    };
    let device = match (&args.tcp, &args.port) {
        (Some(host), _) => XBeeDevice::open(TcpStream::connect(host)?, config)?,
        (None, Some(port)) => XBeeDevice::open(SerialTransport::new(port, args.baud)?, config)?,
        (None, None) => {
            println!("Specify a serial port (-p) or TCP address (-t). Serial ports found:");
            for p in SerialTransport::available_ports() {
                println!("  {p}");
            }
            std::process::exit(1);
        }
    };
    device.read_device_info()?;
    println!(
        "Local XBee {} '{}' running {}",
        device.addr64(),
        device.node_id(),
        device.protocol()
    );

    if args.wifi {
        if let Some(secs) = args.timeout {
            device.set_access_point_timeout(Duration::from_secs(secs));
        }
        print_access_points(&device)?;
    } else {
        let network = device.network();
        if let Some(secs) = args.timeout {
            network.set_discovery_timeout(Duration::from_secs(secs))?;
        }
        println!(
            "Discovering for {} seconds...",
            network.discovery_timeout()?.as_secs()
        );
        let found = network.discover_all()?;
        let rows: Vec<[String; 5]> = found
            .iter()
            .map(|d| {
                [
                    d.addr64().to_string(),
                    d.addr16().to_string(),
                    d.node_id().unwrap_or_default(),
                    d.role().to_string(),
                    d.rssi().map(|r| format!("-{r} dBm")).unwrap_or_default(),
                ]
            })
            .collect();
        let mut table = AsciiTable::default();
        table.column(0).set_header("64-BIT").set_align(Align::Left);
        table.column(1).set_header("16-BIT").set_align(Align::Center);
        table.column(2).set_header("NODE ID").set_align(Align::Left);
        table.column(3).set_header("ROLE").set_align(Align::Left);
        table.column(4).set_header("RSSI").set_align(Align::Right);
        table.print(rows);
    }

    device.close();
    Ok(())
}

fn print_access_points(device: &XBeeDevice) -> Result<(), Box<dyn Error>> {
    println!(
        "Scanning for {} seconds...",
        device.access_point_timeout().as_secs()
    );
    let rows: Vec<[String; 4]> = device
        .scan_access_points()?
        .into_iter()
        .map(|ap| {
            [
                ap.ssid,
                ap.channel.to_string(),
                ap.encryption.to_string(),
                format!("{}%", ap.signal_quality),
            ]
        })
        .collect();
    let mut table = AsciiTable::default();
    table.column(0).set_header("SSID").set_align(Align::Left);
    table.column(1).set_header("CHANNEL").set_align(Align::Center);
    table.column(2).set_header("SECURITY").set_align(Align::Left);
    table.column(3).set_header("QUALITY").set_align(Align::Right);
    table.print(rows);
    Ok(())
}
