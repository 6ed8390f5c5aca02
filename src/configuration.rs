use crate::notifier::MailSettings;
use std::path::PathBuf;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn admin_password(&self) -> String;
    fn frontend_path(&self) -> PathBuf;
    fn database_url(&self) -> Option<String>;
    fn port(&self) -> u16;
    /// Origin allowed to call the API from a browser. Any origin when unset.
    fn cors_origin(&self) -> Option<String>;
    /// Booking emails are only sent when an SMTP host and sender are set.
    fn mail_settings(&self) -> Option<MailSettings>;
}
