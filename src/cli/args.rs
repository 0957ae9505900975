use clap::{Parser, ValueEnum};
use cloudip::Provider;

/*-------------------------------------------------------------------------------------------------
  Command Line Interface (CLI) Arguments
-------------------------------------------------------------------------------------------------*/

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Check whether IP addresses belong to AWS, GCP, or Azure.",
    long_about = None
)]
pub struct Args {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print a header row (text and table formats)
    #[arg(long)]
    pub header: bool,

    /// Field delimiter for the text format
    #[arg(short = 'd', long, default_value = " ")]
    pub delimiter: String,

    /// Only check these providers, in the given order [default: aws, gcp, azure]
    #[arg(short = 'p', long = "provider", value_enum)]
    pub providers: Vec<ProviderArg>,

    /// Logging verbosity
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// IP addresses to check
    #[arg(required = true, value_name = "IP")]
    pub ips: Vec<String>,
}

impl Args {
    pub fn providers(&self) -> Vec<Provider> {
        if self.providers.is_empty() {
            Provider::ALL.to_vec()
        } else {
            self.providers.iter().map(|provider| provider.into()).collect()
        }
    }
}

/*--------------------------------------------------------------------------------------
  Value Enums
--------------------------------------------------------------------------------------*/

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Table,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderArg {
    Aws,
    Gcp,
    Azure,
}

impl From<&ProviderArg> for Provider {
    fn from(provider: &ProviderArg) -> Self {
        match provider {
            ProviderArg::Aws => Provider::Aws,
            ProviderArg::Gcp => Provider::Gcp,
            ProviderArg::Azure => Provider::Azure,
        }
    }
}
