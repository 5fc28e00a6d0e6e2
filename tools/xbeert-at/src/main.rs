use std::error::Error;
use std::net::TcpStream;

use clap::Parser;
use xbeeapp::device::{DeviceConfig, XBeeDevice};
use xbeeapp::remote::RemoteXBeeDevice;
use xbeeapp::serial::SerialTransport;
use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};
use xbeecore::protocol::OperatingMode;

#[derive(Parser)]
struct Args {
    #[arg(short = 'p', help = "Serial port of the local XBee, e.g. /dev/ttyUSB0")]
    port: Option<String>,
    #[arg(short = 'b', default_value = "9600", help = "Serial baud rate")]
    baud: u32,
    #[arg(short = 't', help = "host:port of an XBee exposing its API over TCP")]
    tcp: Option<String>,
    #[arg(short = 'e', help = "Use API mode 2 (escaped)")]
    escaped: bool,
    #[arg(
        short = 'r',
        help = "64-bit address of a remote XBee to query instead of the local one"
    )]
    remote: Option<XBee64BitAddress>,
    #[arg(help = "Two-character AT command, e.g. NI")]
    command: String,
    #[arg(help = "Value to set, as hex bytes (0x prefix) or text")]
    value: Option<String>,
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
            println!("Specify a serial port (-p) or TCP address (-t)");
            std::process::exit(1);
        }
    };
    let value = args.value.as_deref().map(parse_value).transpose()?;

    let result = match args.remote {
        Some(addr64) => {
            device.read_device_info()?;
            let remote =
                RemoteXBeeDevice::new(&device, addr64, XBee16BitAddress::UNKNOWN, None);
            match &value {
                Some(v) => remote.set_parameter(&args.command, v).map(|_| None),
                None => remote.get_parameter(&args.command).map(Some),
            }
        }
        None => match &value {
            Some(v) => device.set_parameter(&args.command, v).map(|_| None),
            None => device.get_parameter(&args.command).map(Some),
        },
    };

    device.close();
    match result? {
        Some(v) => println!("{} = {}", args.command.to_uppercase(), format_value(&v)),
        None => println!("{} set", args.command.to_uppercase()),
    }
    Ok(())
}

fn parse_value(s: &str) -> Result<Vec<u8>, String> {
    let Some(hex) = s.strip_prefix("0x") else {
        return Ok(s.as_bytes().to_vec());
    };
    if !hex.is_ascii() {
        return Err(format!("'{s}' is not a hex value"));
    }
    if hex.is_empty() || hex.len() % 2 != 0 {
        return Err(format!("'{s}' must have an even number of hex digits"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("'{s}': {e}")))
        .collect()
}

fn format_value(v: &[u8]) -> String {
    let hex: String = v.iter().map(|b| format!("{b:02X}")).collect();
    if !v.is_empty() && v.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("0x{hex} ({})", String::from_utf8_lossy(v))
    } else {
        format!("0x{hex}")
    }
}
