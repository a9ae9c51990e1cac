use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use dispatch::crypto::{Algorithm, generate_iv, generate_key};
use dispatch::id::generate_id;
use dispatch::request::{ApiVersion, Device, Level, PushRequest, RequestError, Volume};
use dispatch::{Dispatcher, PushRecord, get_request_parameters};
use metrics_exporter_statsd::StatsdBuilder;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

mod config;

#[derive(Parser)]
#[command(name = "barkpush", version, about = "Send Bark push notifications")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Send a push to configured devices or a device URL
    Send(PushArgs),
    /// Print the parameters a push would record, without sending it
    Params(PushArgs),
    /// Generate an encryption key
    GenKey {
        #[arg(long, default_value = "AES256", value_parser = parse_label::<Algorithm>)]
        algorithm: Algorithm,
    },
    /// Generate an initialization vector
    GenIv,
    /// Generate a push identifier
    GenId,
}

#[derive(Args)]
struct PushArgs {
    message: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    subtitle: Option<String>,
    #[arg(long)]
    sound: Option<String>,
    /// URL opened when the notification is tapped
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    icon: Option<String>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    badge: Option<i64>,
    #[arg(long, value_parser = parse_label::<Level>)]
    level: Option<Level>,
    #[arg(long)]
    volume: Option<u8>,
    #[arg(long)]
    call: bool,
    #[arg(long)]
    no_auto_copy: bool,
    #[arg(long)]
    copy: Option<String>,
    #[arg(long)]
    archive: bool,
    #[arg(long)]
    no_action: bool,
    #[arg(long)]
    image: Option<String>,
    #[arg(long)]
    id: Option<String>,
    /// Configured device name. Repeatable; all devices when omitted.
    #[arg(short, long = "device")]
    devices: Vec<String>,
    /// Send to this device URL instead of configured devices
    #[arg(long, conflicts_with = "devices")]
    device_url: Option<Url>,
    /// Use the v2 API regardless of settings
    #[arg(long)]
    api_v2: bool,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no devices to send to")]
    NoDevices,
    #[error("invalid push: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("could not serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

fn parse_label<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| e.to_string())
}

impl PushArgs {
    fn api_version(&self, config: &Config) -> ApiVersion {
        if self.api_v2 {
            ApiVersion::V2
        } else {
            config.settings.api_version()
        }
    }

    fn targets(&self, config: &Config) -> Result<Vec<Device>, CliError> {
        if let Some(url) = &self.device_url {
            let device_key = url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .unwrap_or_default()
                .to_string();
            return Ok(vec![Device {
                api_url: url.clone(),
                server: Some(url.origin().ascii_serialization()),
                device_key,
                authorization: None,
            }]);
        }

        let devices = config.select_devices(&self.devices)?;
        if devices.is_empty() {
            return Err(CliError::NoDevices);
        }
        Ok(devices)
    }

    fn build(&self, device: &Device, config: &Config) -> Result<PushRequest, CliError> {
        let mut request = PushRequest::for_device(self.message.clone(), device);
        if let Some(id) = &self.id {
            request.id = id.clone();
        }
        request.title = self.title.clone();
        request.subtitle = self.subtitle.clone();
        request.sound = self.sound.clone();
        request.url = self.url.clone();
        request.icon = self.icon.clone();
        request.group = self.group.clone();
        request.badge = self.badge;
        request.level = self.level;
        request.volume = self.volume.map(Volume);
        request.call = self.call;
        request.auto_copy = !self.no_auto_copy;
        request.copy = self.copy.clone();
        request.is_archive = self.archive;
        request.no_action = self.no_action;
        request.image = self.image.clone();

        config.settings.apply_defaults(&mut request);
        request.validate()?;
        Ok(request)
    }

    /// One request per device for v1, a single batched request for v2.
    fn requests(&self, config: &Config) -> Result<Vec<PushRequest>, CliError> {
        let devices = self.targets(config)?;

        match self.api_version(config) {
            ApiVersion::V1 => devices
                .iter()
                .map(|device| self.build(device, config))
                .collect(),
            ApiVersion::V2 => {
                let request = self.build(&devices[0], config)?.with_devices(devices);
                Ok(vec![request])
            }
        }
    }
}

fn init_logging(config: &Config) -> Option<sentry::ClientInitGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let guard = config.sentry_dsn().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(guard.is_some().then(sentry::integrations::tracing::layer))
        .init();

    guard
}

fn init_metrics(config: &Config) {
    let Some(metrics) = &config.common.metrics else {
        return;
    };

    match StatsdBuilder::from(metrics.statsd_host.clone(), metrics.statsd_port)
        .build(Some("barkpush"))
    {
        Ok(recorder) => {
            match metrics::set_global_recorder(recorder) {
                Ok(()) => dispatch::metrics_defs::describe_metrics(),
                Err(e) => tracing::warn!("Could not install metrics recorder: {}", e),
            }
        }
        Err(e) => tracing::warn!("Could not build statsd recorder: {}", e),
    }
}

async fn send(args: &PushArgs, config: &Config) -> Result<bool, CliError> {
    let dispatcher = Dispatcher::from_settings(&config.settings);
    let encryption = config.settings.active_encryption();
    let api_version = args.api_version(config);

    let mut records: Vec<PushRecord> = Vec::new();
    for request in args.requests(config)? {
        records.push(
            dispatcher
                .send_and_record(&request, encryption, api_version)
                .await,
        );
    }

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(records.iter().all(|record| record.response.is_success()))
}

fn params(args: &PushArgs, config: &Config) -> Result<(), CliError> {
    let encrypted = config.settings.active_encryption().is_some_and(|e| e.key().is_some());
    let requests = args.requests(config)?;
    let params: Vec<_> = requests
        .iter()
        .map(|request| get_request_parameters(request, encrypted))
        .collect();

    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<bool, CliError> {
    match &cli.command {
        CliCommand::Send(args) => send(args, &config).await,
        CliCommand::Params(args) => params(args, &config).map(|_| true),
        CliCommand::GenKey { algorithm } => {
            println!("{}", generate_key(*algorithm));
            Ok(true)
        }
        CliCommand::GenIv => {
            println!("{}", generate_iv());
            Ok(true)
        }
        CliCommand::GenId => {
            println!("{}", generate_id());
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let _sentry = init_logging(&config);
    init_metrics(&config);

    match run(cli, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
