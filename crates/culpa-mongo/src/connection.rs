use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;

use culpa_core::config::DbServerConfig;
use culpa_core::error::{ConnectorError, ConnectorResult};
use culpa_core::secrets::{Secrets, DB_PASSWORD_KEY};

use crate::source::MongoSource;

const APP_NAME: &str = "mongo-dataculpa";

/// Build driver options from the config; the password comes from `secrets`.
pub fn client_options(config: &DbServerConfig, secrets: &Secrets) -> ConnectorResult<ClientOptions> {
    let address = ServerAddress::parse(format!("{}:{}", config.host, config.port))
        .map_err(|e| ConnectorError::Config(format!("Invalid db_server address: {e}")))?;

    let mut options = ClientOptions::default();
    options.hosts = vec![address];
    options.app_name = Some(APP_NAME.to_string());
    options.connect_timeout = Some(config.connect_timeout);
    options.server_selection_timeout = Some(config.connect_timeout);
    options.default_database = Some(config.dbname.clone());

    if let Some(user) = &config.user {
        let password = secrets.db_password.clone().ok_or_else(|| {
            ConnectorError::Secrets(format!(
                "db_server.user is set to '{user}' but {DB_PASSWORD_KEY} is missing"
            ))
        })?;
        let mut credential = Credential::default();
        credential.username = Some(user.clone());
        credential.password = Some(password);
        credential.source = config.auth_source.clone();
        options.credential = Some(credential);
    }

    Ok(options)
}

/// Connect and verify with a `ping` against the configured database.
pub async fn connect(config: &DbServerConfig, secrets: &Secrets) -> ConnectorResult<MongoSource> {
    let options = client_options(config, secrets)?;
    let client = Client::with_options(options).map_err(|e| classify(e, "MongoDB client setup failed"))?;

    let database = client.database(&config.dbname);
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| classify(e, "MongoDB ping failed"))?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.dbname,
        authenticated = config.user.is_some(),
        "Connected to MongoDB"
    );
    Ok(MongoSource::new(client, &config.dbname))
}

/// Separate credential failures from everything else the driver reports.
pub(crate) fn classify(e: mongodb::error::Error, context: &str) -> ConnectorError {
    let auth_failure = match e.kind.as_ref() {
        ErrorKind::Authentication { .. } => true,
        ErrorKind::Command(cmd) => cmd.code == 18 || cmd.code == 13,
        _ => e.to_string().contains("Authentication failed"),
    };
    if auth_failure {
        ConnectorError::Authentication(format!("{context}: {e}"))
    } else {
        ConnectorError::Connection(anyhow::anyhow!("{context}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use culpa_core::config::{ConnectorConfig, EXAMPLE_CONFIG};

    fn db_config() -> DbServerConfig {
        ConnectorConfig::from_yaml_str(EXAMPLE_CONFIG)
            .unwrap()
            .db_server
    }

    #[test]
    fn options_carry_host_timeouts_and_credential() {
        let mut config = db_config();
        config.auth_source = Some("admin".into());
        let secrets = Secrets {
            controller_secret: None,
            db_password: Some("hunter2".into()),
        };

        let options = client_options(&config, &secrets).unwrap();
        assert_eq!(options.hosts[0].to_string(), "localhost:27017");
        assert_eq!(options.app_name.as_deref(), Some(APP_NAME));
        assert_eq!(options.connect_timeout, Some(config.connect_timeout));

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("dataculpa"));
        assert_eq!(credential.password.as_deref(), Some("hunter2"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[test]
    fn user_without_password_is_rejected_before_connecting() {
        let err = client_options(&db_config(), &Secrets::default()).unwrap_err();
        assert!(matches!(err, ConnectorError::Secrets(_)));
        assert!(err.to_string().contains(DB_PASSWORD_KEY));
    }

    #[test]
    fn anonymous_access_has_no_credential() {
        let mut config = db_config();
        config.user = None;
        let options = client_options(&config, &Secrets::default()).unwrap();
        assert!(options.credential.is_none());
    }
}
