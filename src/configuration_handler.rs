use crate::{configuration::Configuration, notifier::MailSettings};
use clap::{builder::NonEmptyStringValueParser, Parser};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Booking backend for a mobile car-detailing service")]
pub struct ConfigurationHandler {
    /// Port the HTTP server listens on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Secret expected in the `x-admin-password` header of admin requests
    #[arg(long, env = "ADMIN_PASSWORD", value_parser = NonEmptyStringValueParser::new())]
    admin_password: String,

    /// HTML page served at `/`
    #[arg(long, env = "FRONTEND_PATH", default_value = "frontend/index.html")]
    frontend_path: PathBuf,

    /// PostgreSQL connection URL. Bookings are kept in memory when omitted
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Origin allowed by CORS
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// SMTP server for booking emails. No emails are sent when omitted
    #[arg(long, env = "SMTP_HOST")]
    smtp_host: Option<String>,

    /// SMTP submission port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD")]
    smtp_password: Option<String>,

    /// Sender address, also receiving a copy of every new booking
    #[arg(long, env = "MAIL_FROM")]
    mail_from: Option<String>,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn admin_password(&self) -> String {
        self.admin_password.clone()
    }

    fn frontend_path(&self) -> PathBuf {
        self.frontend_path.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn cors_origin(&self) -> Option<String> {
        self.cors_origin.clone()
    }

    fn mail_settings(&self) -> Option<MailSettings> {
        Some(MailSettings {
            smtp_host: self.smtp_host.clone()?,
            smtp_port: self.smtp_port,
            smtp_username: self.smtp_username.clone(),
            smtp_password: self.smtp_password.clone(),
            mail_from: self.mail_from.clone()?,
        })
    }
}
