//! Command-line interface for spi-xml

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
use spi_xml::loaders::Loader;
#[cfg(feature = "cli")]
use spi_xml::{
    detect, Engine, EngineConfig, StaticCertificateResolver, ValidationOptions, XmlSigner,
};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "spi-validate")]
#[command(author, version, about = "SPI ISO 20022 message validation and signing tool", long_about = None)]
struct Cli {
    /// Directory holding the schema resources
    #[arg(long, global = true, value_name = "DIR")]
    schema_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect message family and version
    Detect {
        /// Path to the XML message
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Validate a message and print the result as JSON
    Validate {
        /// Path to the XML message
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Skip the schema check
        #[arg(long)]
        no_structural: bool,

        /// Skip the signature check
        #[arg(long)]
        no_signature: bool,

        /// Skip the business rules
        #[arg(long)]
        no_business: bool,

        /// Do not sanitize the input
        #[arg(long)]
        no_preprocess: bool,

        /// PEM certificate used to verify the signature value
        #[arg(long, value_name = "PEM")]
        certificate: Option<PathBuf>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Sign a message
    Sign {
        /// Path to the XML message
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// PEM private key (PKCS#8 or PKCS#1)
        #[arg(short, long, value_name = "PEM")]
        key: PathBuf,

        /// PEM certificate matching the key
        #[arg(short, long, value_name = "PEM")]
        certificate: PathBuf,

        /// Id of the KeyInfo element
        #[arg(long)]
        key_info_id: Option<String>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect { file } => cmd_detect(cli.schema_dir, file),
        Commands::Validate {
            file,
            no_structural,
            no_signature,
            no_business,
            no_preprocess,
            certificate,
            pretty,
        } => {
            let options = ValidationOptions::new()
                .with_structural(!no_structural)
                .with_signature(!no_signature)
                .with_business(!no_business)
                .with_preprocess(!no_preprocess);
            cmd_validate(cli.schema_dir, file, options, certificate, pretty).await
        }
        Commands::Sign {
            file,
            key,
            certificate,
            key_info_id,
            output,
        } => cmd_sign(cli.schema_dir, file, key, certificate, key_info_id, output),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "cli")]
fn load_config(schema_dir: Option<PathBuf>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    Ok(match schema_dir {
        Some(dir) => config.with_schema_dir(dir),
        None => config,
    })
}

#[cfg(feature = "cli")]
fn cmd_detect(schema_dir: Option<PathBuf>, file: PathBuf) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(schema_dir)?;
    let input = Loader::from_config(&config).load_bytes(&file)?;
    let xml = spi_xml::preprocess::sanitize_bytes(&input);
    let detection = detect(&xml, &config.schema_dir);
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(true)
}

#[cfg(feature = "cli")]
async fn cmd_validate(
    schema_dir: Option<PathBuf>,
    file: PathBuf,
    mut options: ValidationOptions,
    certificate: Option<PathBuf>,
    pretty: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(schema_dir)?;
    let engine = Engine::from_config(&config);

    if let Some(path) = certificate {
        let pem = fs::read_to_string(&path)?;
        options = options.with_certificate_resolver(Arc::new(StaticCertificateResolver::new(pem)));
    }

    let input = Loader::from_config(&config).load_bytes(&file)?;
    let result = engine.validate_bytes(&input, &options).await?;

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);
    Ok(result.valid)
}

#[cfg(feature = "cli")]
fn cmd_sign(
    schema_dir: Option<PathBuf>,
    file: PathBuf,
    key: PathBuf,
    certificate: PathBuf,
    key_info_id: Option<String>,
    output: Option<PathBuf>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let key_pem = fs::read_to_string(&key)?;
    let cert_pem = fs::read_to_string(&certificate)?;

    let mut signer = XmlSigner::from_pem(&cert_pem, &key_pem)?;
    if let Some(id) = key_info_id {
        signer = signer.with_key_info_id(id);
    }

    let config = load_config(schema_dir)?;
    let input = Loader::from_config(&config).load_bytes(&file)?;
    let xml = spi_xml::preprocess::sanitize_bytes(&input);
    let signed = signer.sign_xml_with_limits(&xml, &config.limits)?;

    match output {
        Some(path) => fs::write(&path, signed)?,
        None => println!("{}", signed),
    }
    Ok(true)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
