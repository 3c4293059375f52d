use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::models::Bank;

/// SMTP sender for activation reminders.
pub struct Mailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let transport = SmtpTransport::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.from_email.parse()?,
        })
    }

    /// Send the re-authorization link for a bank. Fire-and-forget: a send
    /// failure propagates but is never retried.
    pub fn send_link(&self, to_email: &str, bank: &Bank, link: &str) -> Result<(), Error> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_email.parse()?)
            .subject("Open Banking Connection Activation")
            .body(activation_body(bank, link))?;

        debug!("Sending activation email for bank '{}'", bank.name);
        self.transport.send(&message)?;
        Ok(())
    }
}

fn activation_body(bank: &Bank, link: &str) -> String {
    format!(
        "The connection with {} is no longer active and its transactions are \
         not being archived.\n\n\
         Visit the link below to authorize a new connection:\n\n{}\n",
        bank.name, link
    )
}
