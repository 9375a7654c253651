use anyhow::Context;
use clap::{Parser, Subcommand};
use smart_sheet_rust::domain::settings::{DeviceSettings, LinkSettings, SettingsService};
use smart_sheet_rust::infrastructure::bluetooth::{
    ConnectionConfig, LinkClient, RadioProvider, SessionFactory, TcpRadio, TcpSessionFactory,
};
use smart_sheet_rust::infrastructure::device::{
    spawn_reader_source, DeviceRuntime, DiagnosticSink, LoggingPwm, MonotonicClock, SppServer,
};
use smart_sheet_rust::infrastructure::logging;
use smart_sheet_rust::protocol::DeviceResponse;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "smart-sheet")]
#[command(about = "Drive a Smart Sheet motor array over a serial Bluetooth link")]
struct Cli {
    /// Override settings file path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Role,
}

#[derive(Debug, Subcommand)]
enum Role {
    /// Run the actuator controller runtime.
    Device {
        /// Address for the emulated serial-profile server.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Connect to the actuator controller and send commands.
    Client {
        /// Name of the paired device to connect to.
        #[arg(long)]
        peer: Option<String>,

        /// Commands to send in order; interactive when omitted.
        commands: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings_service = match &cli.config {
        Some(path) => SettingsService::load(path.clone()),
        None => SettingsService::new()?,
    };
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();
    info!("Settings: {}", settings_service.path().display());

    match cli.command {
        Role::Device { listen } => run_device(settings.device, listen),
        Role::Client { peer, commands } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;
            rt.block_on(run_client(settings.link, peer, commands))
        }
    }
}

fn run_device(mut settings: DeviceSettings, listen: Option<String>) -> anyhow::Result<()> {
    if let Some(listen) = listen {
        settings.listen_address = listen;
    }

    info!("================================");
    info!("Smart Sheet Motor Controller");
    info!("Starting...");
    info!("================================");

    let pwm = LoggingPwm::new(&settings.motor_pins);
    let mut runtime = DeviceRuntime::new(&settings, pwm, MonotonicClock::new())?;

    let (_server, transport, peer) =
        SppServer::start(&settings.listen_address, &settings.advertised_name)
            .context("Bluetooth initialization failed")?;
    let serial = spawn_reader_source("Serial", std::io::stdin())?;

    runtime.add_source(transport);
    runtime.add_source(serial);
    runtime.add_sink(DiagnosticSink);
    runtime.add_sink(peer);

    info!("================================");
    info!("System Ready!");
    info!("Commands: MODE:STOP, MODE:CONSTANT, MODE:WAVE");
    info!("          INTENSITY:0-255, SPEED:50-500, STATUS");
    info!("================================");

    let running = AtomicBool::new(true);
    runtime.run(&running);
    Ok(())
}

async fn run_client(
    mut settings: LinkSettings,
    peer: Option<String>,
    commands: Vec<String>,
) -> anyhow::Result<()> {
    if let Some(peer) = peer {
        settings.device_name = peer;
    }

    let client = LinkClient::new(
        TcpRadio::from_settings(&settings),
        TcpSessionFactory,
        ConnectionConfig::from(&settings),
    );
    client
        .connect()
        .await
        .with_context(|| format!("Could not connect to {}", settings.device_name))?;

    let result = if commands.is_empty() {
        interactive(&client).await
    } else {
        let timeout = Duration::from_millis(settings.response_timeout_ms);
        send_all(&client, &commands, timeout).await
    };

    client.disconnect().await;
    result
}

async fn send_all<R: RadioProvider, F: SessionFactory>(
    client: &LinkClient<R, F>,
    commands: &[String],
    timeout: Duration,
) -> anyhow::Result<()> {
    for command in commands {
        match client.request(command, timeout).await? {
            Some(line) => print_response(&line),
            None => println!("(no response to {})", command),
        }
    }
    Ok(())
}

async fn interactive<R: RadioProvider, F: SessionFactory>(
    client: &LinkClient<R, F>,
) -> anyhow::Result<()> {
    let mut lines = client.subscribe_lines();
    let mut state = client.subscribe_state();

    let printer = tokio::spawn(async move {
        while lines.changed().await.is_ok() {
            if let Some(line) = lines.borrow_and_update().clone() {
                print_response(&line);
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = client.send(line).await {
                    error!("Send failed: {}", e);
                    if !client.state().is_connected() {
                        break;
                    }
                }
            }
            changed = state.changed() => {
                if changed.is_err() || !state.borrow_and_update().is_connected() {
                    eprintln!("Link lost: {}", client.state());
                    break;
                }
            }
        }
    }

    printer.abort();
    Ok(())
}

fn print_response(line: &str) {
    match DeviceResponse::parse(line) {
        DeviceResponse::Status(status) => println!(
            "{}  [mode={}, intensity={}, speed={} ms]",
            line, status.mode, status.intensity, status.speed_ms
        ),
        _ => println!("{}", line),
    }
}
