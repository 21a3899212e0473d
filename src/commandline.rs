use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;

const fn about_text() -> &'static str {
    "sunbridge - polls a solar inverter over Modbus TCP and republishes decoded values to MQTT."
}

#[derive(Parser, Debug)]
#[command(name = "sunbridge", author, version, about = about_text(), long_about = None)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -q for warnings only, -v for debug, -vv for trace.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Path to the YAML configuration file.
    /// When omitted, ./sunbridge.yaml is used if it exists, otherwise the
    /// built-in defaults apply.
    #[arg(short, long, verbatim_doc_comment)]
    pub config: Option<PathBuf>,

    /// Decode and log register values without publishing them to the broker.
    #[arg(long)]
    pub no_publish: bool,
}
