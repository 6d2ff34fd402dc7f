use clap::{Arg, Command};
use log::LevelFilter;
use ses_inbound::confirmation::ConfirmationClient;
use ses_inbound::http::{HttpFetcher, ReqwestFetcher};
use ses_inbound::{Config, Envelope, SesHandler, TrustVerifier};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("ses-inbound")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Authenticates SNS deliveries from SES receipt rules and extracts the received mail")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/ses-inbound.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("canonical")
                .long("canonical")
                .value_name("FILE")
                .help("Print the string an SNS envelope's signature covers")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verify")
                .long("verify")
                .value_name("FILE")
                .help("Verify the signature of an SNS envelope")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("process")
                .long("process")
                .value_name("FILE")
                .help("Authenticate and dispatch an SNS envelope as if it had been POSTed")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("unsubscribe")
                .long("unsubscribe")
                .value_name("URL")
                .help("Visit an UnsubscribeURL and print the request id")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/ses-inbound.yaml");
    let config_found = std::path::Path::new(config_path).exists();
    let config = match load_config(config_path, config_found) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config
            .logging
            .as_ref()
            .and_then(|logging| logging.level.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if matches.get_flag("test-config") {
        println!("Configuration OK");
        println!("  User agent: {}", config.http.user_agent);
        println!("  Certificate timeout: {:?}", config.http.certificate_timeout());
        println!("  Confirmation timeout: {:?}", config.http.confirmation_timeout());
        println!("  Content timeout: {:?}", config.content.timeout());
        println!("  Object store root: {}", config.content.object_store_root);
        return;
    }

    let result = if let Some(file) = matches.get_one::<String>("canonical") {
        print_canonical(file)
    } else if let Some(file) = matches.get_one::<String>("verify") {
        verify_envelope(&config, file).await
    } else if let Some(file) = matches.get_one::<String>("process") {
        process_envelope(&config, file).await
    } else if let Some(url) = matches.get_one::<String>("unsubscribe") {
        unsubscribe(&config, url).await
    } else {
        eprintln!("Nothing to do. Pass --process, --verify, --canonical or --unsubscribe.");
        process::exit(1);
    };

    if let Err(e) = result {
        log::error!("{e:#}");
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn load_config(path: &str, found: bool) -> anyhow::Result<Config> {
    if found {
        Config::from_file(path)
    } else {
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn read_envelope(file: &str) -> anyhow::Result<(Vec<u8>, Envelope)> {
    let body = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("error reading envelope file {file}: {e}"))?;
    let envelope = Envelope::from_slice(&body)?;
    Ok((body, envelope))
}

fn print_canonical(file: &str) -> anyhow::Result<()> {
    let (_, envelope) = read_envelope(file)?;
    print!("{}", String::from_utf8_lossy(&envelope.signable_bytes()));
    Ok(())
}

async fn verify_envelope(config: &Config, file: &str) -> anyhow::Result<()> {
    let (_, envelope) = read_envelope(file)?;
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(&config.http.user_agent));
    let verifier = TrustVerifier::new(fetcher, config.http.certificate_timeout());

    verifier.verify(&envelope).await?;
    println!(
        "✅ {} envelope {} is signed by {}",
        envelope.kind, envelope.message_id, envelope.signing_cert_url
    );
    Ok(())
}

async fn process_envelope(config: &Config, file: &str) -> anyhow::Result<()> {
    let (body, _) = read_envelope(file)?;
    let handler = SesHandler::from_config(config);

    match handler.receive_mail(&body).await? {
        Some(mail) => {
            let verdict = |v: &Option<ses_inbound::Verdict>| {
                v.as_ref().map(|v| v.status.clone()).unwrap_or_else(|| "-".to_string())
            };
            println!("📧 Received mail");
            println!("  Sender: {}", mail.message.sender.as_deref().unwrap_or("unknown"));
            println!("  Subject: {}", mail.message.subject.as_deref().unwrap_or(""));
            println!("  Size: {} bytes", mail.raw_mime.len());
            println!("  Spam: {}", verdict(&mail.spam_verdict));
            println!("  SPF: {}", verdict(&mail.spf_verdict));
            println!("  DKIM: {}", verdict(&mail.dkim_verdict));
            println!("  DMARC: {}", verdict(&mail.dmarc_verdict));
        }
        None => println!("✅ Envelope accepted, nothing to deliver"),
    }
    Ok(())
}

async fn unsubscribe(config: &Config, url: &str) -> anyhow::Result<()> {
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(&config.http.user_agent));
    let client = ConfirmationClient::new(fetcher, config.http.confirmation_timeout());

    let response = client.unsubscribe(url).await?;
    println!("✅ Unsubscribed (request {})", response.request_id);
    Ok(())
}
