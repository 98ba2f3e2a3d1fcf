//! certctl CLI application.
//!
//! Command-line tool to generate a self-signed certificate and its RSA key.

use certctl::cert::ca::{
    run_create, CreateRequest, DEFAULT_CERT_PATH, DEFAULT_ENDPOINT, DEFAULT_KEY_PATH,
};
use certctl::cert::loader::{
    load_certificates_from_pem, parse_certificate_der, public_key_from_certificate,
    verify_self_signed, CertificateInfo,
};
use certctl::config::{IssuerConfig, ValidityPeriod, Verbosity, WriteMode};
use certctl::crypto::keygen::load_private_key_from_pem;
use certctl::error::Result;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "certctl")]
#[command(about = "command line tool to generate ssl certificates and key", long_about = None)]
struct Cli {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create self signed certificate and key
    Create {
        /// IP addresses of servers where this cert will be used
        #[arg(long = "endpoints", default_value = DEFAULT_ENDPOINT)]
        endpoints: Vec<String>,

        /// File path to store private key
        #[arg(long, default_value = DEFAULT_KEY_PATH)]
        keyout: PathBuf,

        /// File path to store certificate
        #[arg(long, default_value = DEFAULT_CERT_PATH)]
        certout: PathBuf,

        /// RSA key size in bits
        #[arg(long)]
        bits: Option<usize>,

        /// Subject organization
        #[arg(long)]
        organization: Option<String>,

        /// Validity in calendar years
        #[arg(long)]
        validity_years: Option<u32>,

        /// Fail on endpoints that are not IP addresses
        #[arg(long)]
        strict_endpoints: bool,

        /// Write files in place instead of staging and renaming them
        #[arg(long)]
        direct_write: bool,
    },

    /// Show the fields of each certificate in a file and check self-signatures
    Inspect {
        /// Certificate file or bundle
        #[arg(long, default_value = DEFAULT_CERT_PATH)]
        cert: PathBuf,

        /// Private key file to match against the first certificate
        #[arg(long)]
        key: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>, debug: bool) -> Result<IssuerConfig> {
    let mut config = match path {
        Some(path) => IssuerConfig::from_json_file(path)?,
        None => IssuerConfig::default(),
    };
    if debug {
        config.verbosity = Verbosity::Debug;
    }
    Ok(config)
}

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), cli.debug);
    let verbosity = match &config {
        Ok(config) => config.verbosity,
        Err(_) if cli.debug => Verbosity::Debug,
        Err(_) => Verbosity::Info,
    };
    init_logging(verbosity);

    let result = config.and_then(|config| match cli.command {
        Commands::Create {
            endpoints,
            keyout,
            certout,
            bits,
            organization,
            validity_years,
            strict_endpoints,
            direct_write,
        } => {
            let mut config = config;
            if let Some(bits) = bits {
                config.key_bits = bits;
            }
            if let Some(organization) = organization {
                config.subject_organization = organization;
            }
            if let Some(years) = validity_years {
                config.validity_period = ValidityPeriod::Years(years);
            }
            if strict_endpoints {
                config.strict_addresses = true;
            }
            if direct_write {
                config.write_mode = WriteMode::Direct;
            }

            let request = CreateRequest {
                ip_addresses: endpoints,
                key_path: keyout,
                cert_path: certout,
            };
            handle_create(&request, &config)
        }
        Commands::Inspect { cert, key } => handle_inspect(&cert, key.as_deref()),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn handle_create(request: &CreateRequest, config: &IssuerConfig) -> Result<()> {
    let issued = run_create(request, config)?;

    println!("✓ Created private key: {}", request.key_path.display());
    println!("✓ Created certificate: {}", request.cert_path.display());
    println!("  Serial: {:032x}", issued.template.serial_number);
    println!(
        "  Valid: {} to {}",
        issued.template.not_before, issued.template.not_after
    );

    Ok(())
}

fn handle_inspect(cert_path: &Path, key_path: Option<&Path>) -> Result<()> {
    let pem = fs::read_to_string(cert_path)?;
    let certs = load_certificates_from_pem(&pem)?
        .iter()
        .map(|der| parse_certificate_der(der))
        .collect::<Result<Vec<_>>>()?;

    println!("Certificate file: {} ({} certificates)", cert_path.display(), certs.len());
    for (index, cert) in certs.iter().enumerate() {
        let info = CertificateInfo::from_certificate(cert)?;

        println!();
        println!("[{}]", index);
        println!("  Serial:      {:032x}", info.serial_number);
        println!("  Subject:     {}", info.subject);
        println!("  Issuer:      {}", info.issuer);
        println!("  Not before:  {}", info.not_before);
        println!("  Not after:   {}", info.not_after);
        println!("  CA:          {}", info.is_ca);
        println!("  Key size:    {} bits", info.public_key_bits);
        println!("  Key usage:   {:#06x}", info.key_usage.bits());
        println!("  Ext usage:   {:?}", info.ext_key_usage);
        println!("  IP SANs:");
        for address in &info.ip_addresses {
            match address {
                Some(ip) => println!("    {}", ip),
                None => println!("    <invalid>"),
            }
        }
        if let Some(ski) = &info.subject_key_id {
            println!("  Key ID:      {}", hex::encode(ski));
        }

        if !info.is_self_issued() {
            println!("  Not self-issued; signature not checked");
            continue;
        }
        match verify_self_signed(cert) {
            Ok(()) => println!("✓ Self-signature verified"),
            Err(e) => println!("✗ Self-signature not verified: {}", e),
        }
    }

    if let (Some(key_path), Some(cert)) = (key_path, certs.first()) {
        let keypair = load_private_key_from_pem(&fs::read_to_string(key_path)?)?;
        println!();
        if keypair.public == public_key_from_certificate(cert)? {
            println!("✓ Private key {} matches certificate [0]", key_path.display());
        } else {
            println!("✗ Private key {} does not match certificate [0]", key_path.display());
        }
    }

    Ok(())
}
