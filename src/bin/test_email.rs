use anyhow::Result;
use clap::Parser;
use listing_watch::config::EmailArgs;
use listing_watch::logging;
use listing_watch::notifier::EmailNotifier;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Send a test email with the configured SMTP settings")]
struct Args {
    #[clap(flatten)]
    email: EmailArgs,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.debug);

    let settings = args.email.to_settings()?;
    info!("Sender email: {}", settings.sender);
    info!("Recipient email: {}", settings.recipient);
    info!("Password set: {} characters", settings.password.chars().count());
    info!("Connecting to {}:{}...", settings.smtp_host, settings.smtp_port);

    let notifier = EmailNotifier::new(&settings)?;
    if let Err(e) = notifier.send_test() {
        error!("Error sending email: {:#}", e);
        error!("Check the SMTP credentials; Gmail needs a 16 character app password");
        return Err(e);
    }

    info!("Email sent successfully! Check your inbox (and spam folder) for the test email.");
    Ok(())
}
