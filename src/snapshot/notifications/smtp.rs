use crate::snapshot::notifications::Notification;
use crate::snapshot::redacted::RedactedString;
use crate::snapshot::result_error::error::Error;
use crate::snapshot::result_error::result::Result;
use crate::snapshot::result_error::WithMsg;
use bon::Builder;
use getset::Getters;
use itertools::Itertools;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::info;
use validator::Validate;

/// SMTP transport for error notifications.
///
/// The password is a [`RedactedString`] so it never reaches logs, debug
/// output or re-serialized configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SmtpNotificationConfig {
    #[builder(into)]
    host: String,
    #[builder(into)]
    smtp_mode: SmtpMode,
    #[builder(into)]
    from: Mailbox,
    #[validate(length(min = 1))]
    #[builder(into)]
    to: Vec<Mailbox>,
    #[builder(into)]
    username: String,
    #[builder(into)]
    password: RedactedString,
}

/// Connection security for the SMTP session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpMode {
    Unsecured,
    Ssl,
    StartTls,
}

impl Notification for SmtpNotificationConfig {
    fn send<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<()> {
        info!(
            "Sending notification email from {:?} to {:?}",
            self.from, self.to
        );
        let email = self
            .to
            .iter()
            .fold(Message::builder(), |email, send_to| email.to(send_to.clone()))
            .from(self.from.clone())
            .subject(topic.to_string())
            .header(ContentType::TEXT_PLAIN)
            .body(msg.to_string())
            .map_err(Error::from)
            .with_msg(format!(
                "Fail to build notification email from {:?} to {:?}",
                self.from, self.to
            ))?;

        let credentials = Credentials::new(self.username.clone(), self.password.inner().clone());
        let mailer = match self.smtp_mode {
            SmtpMode::Unsecured => Ok(SmtpTransport::builder_dangerous(self.host.as_str())),
            SmtpMode::Ssl => SmtpTransport::relay(self.host.as_str()),
            SmtpMode::StartTls => SmtpTransport::starttls_relay(self.host.as_str()),
        }
        .map_err(Error::from)
        .with_msg(format!(
            "Failed to build smtp client for host {:?} with mode {:?}",
            self.host, self.smtp_mode
        ))?
        .credentials(credentials)
        .build();

        let response = mailer.send(&email)?;
        if response.is_positive() {
            Ok(())
        } else {
            let errors = response
                .message()
                .map(|line| Error::SmtpRejected(line.to_owned()))
                .collect_vec();
            if errors.is_empty() {
                Err(Error::SmtpRejected("no response message".to_string()))
            } else {
                Err(errors.into())
            }
        }
    }
}
