use clap::Parser;

/// Trannergy Bridge - polls a Trannergy PV inverter and publishes to MQTT
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,

    /// Poll the inverter once, print the snapshot as JSON and exit
    #[clap(long = "once")]
    pub once: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

