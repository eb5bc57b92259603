use crate::models::Listing;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fmt::Write;
use std::time::Duration;
use tracing::info;

/// Delivers a batch of newly seen listings to a person.
pub trait Notifier {
    /// Called only with a non-empty slice.
    fn notify(&self, listings: &[Listing]) -> Result<()>;
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn notify(&self, listings: &[Listing]) -> Result<()> {
        (**self).notify(listings)
    }
}

/// The message sent for one batch of new listings.
#[derive(Debug, Clone)]
pub struct Notification<'a> {
    pub listings: &'a [Listing],
    pub generated_at: DateTime<Local>,
}

impl<'a> Notification<'a> {
    pub fn new(listings: &'a [Listing]) -> Self {
        Self {
            listings,
            generated_at: Local::now(),
        }
    }

    pub fn subject(&self) -> String {
        format!("{} New Listing(s) Found!", self.listings.len())
    }

    fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn render_html(&self) -> String {
        let mut body = String::new();
        let _ = write!(
            body,
            "<h2>New Listings Found!</h2>\n<p>Found {} new listing(s) matching your search criteria:</p>\n",
            self.listings.len()
        );

        for listing in self.listings {
            body.push_str(
                "<div style=\"border: 1px solid #ddd; padding: 15px; margin: 10px 0; border-radius: 5px;\">\n",
            );
            if let Some(image) = &listing.image_url {
                let _ = writeln!(
                    body,
                    "  <img src=\"{}\" alt=\"Listing image\" style=\"width: 120px; height: 90px; object-fit: cover; border-radius: 6px;\">",
                    escape_html(image)
                );
            }
            let _ = writeln!(body, "  <h3>{}</h3>", escape_html(&listing.name));
            let _ = writeln!(
                body,
                "  <p><strong>Listing ID:</strong> {}</p>",
                escape_html(&listing.id)
            );
            if let Some(price) = &listing.price {
                let _ = writeln!(body, "  <p><strong>Price:</strong> {}</p>", escape_html(price));
            }
            let _ = writeln!(
                body,
                "  <p><a href=\"{}\" style=\"color: #ff5a5f; text-decoration: none;\">View Listing</a></p>",
                escape_html(&listing.url)
            );
            body.push_str("</div>\n");
        }

        let _ = write!(
            body,
            "<p style=\"color: #666; font-size: 12px;\">Alert sent at: {}</p>\n",
            self.timestamp()
        );
        body
    }

    pub fn render_text(&self) -> String {
        let mut body = format!(
            "Found {} new listing(s) matching your search criteria:\n\n",
            self.listings.len()
        );
        for listing in self.listings {
            let _ = writeln!(body, "{}", listing.name);
            let _ = writeln!(body, "  Listing ID: {}", listing.id);
            if let Some(price) = &listing.price {
                let _ = writeln!(body, "  Price: {}", price);
            }
            let _ = writeln!(body, "  {}\n", listing.url);
        }
        let _ = writeln!(body, "Alert sent at: {}", self.timestamp());
        body
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub timeout: Duration,
}

/// Sends notifications as HTML email over SMTP with STARTTLS.
pub struct EmailNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        let from: Mailbox = settings
            .sender
            .parse()
            .context(format!("Invalid sender address: {}", settings.sender))?;
        let to: Mailbox = settings
            .recipient
            .parse()
            .context(format!("Invalid recipient address: {}", settings.recipient))?;

        let transport = SmtpTransport::starttls_relay(&settings.smtp_host)
            .context(format!("Failed to set up SMTP relay {}", settings.smtp_host))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self { transport, from, to })
    }

    pub fn send(&self, subject: &str, text: String, html: String) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))
            .context("Failed to build email message")?;

        self.transport
            .send(&message)
            .context("Failed to send email")?;
        Ok(())
    }

    /// Send a short message to check that the email settings work.
    pub fn send_test(&self) -> Result<()> {
        let sent_at = Local::now().format("%Y-%m-%d %H:%M:%S");
        let html = format!(
            "<h2>Email Test Successful!</h2>\n<p>This is a test email from listing-watch.</p>\n<p>Test time: {}</p>\n",
            sent_at
        );
        let text = format!("This is a test email from listing-watch.\nTest time: {}\n", sent_at);
        self.send("Listing Watch Email Test", text, html)
    }
}

impl Notifier for EmailNotifier {
    fn notify(&self, listings: &[Listing]) -> Result<()> {
        let notification = Notification::new(listings);
        self.send(
            &notification.subject(),
            notification.render_text(),
            notification.render_html(),
        )?;
        info!("Email notification sent for {} new listings", listings.len());
        Ok(())
    }
}
