use tiberius::{AuthMethod, Client, EncryptionLevel, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::{Authentication, ConnectionConfig};
use crate::error::MssqlMiddlewareError;

/// Type alias for SQL Server client
pub type TdsClient = Client<Compat<TcpStream>>;

/// Translate a connection config into tiberius settings.
///
/// # Errors
/// Returns `MssqlMiddlewareError::ConfigError` when no authentication is configured.
pub fn build_tiberius_config(
    config: &ConnectionConfig,
) -> Result<tiberius::Config, MssqlMiddlewareError> {
    let mut tds = tiberius::Config::new();
    tds.host(&config.server);
    tds.port(config.port());

    if let Some(database) = &config.options.database {
        tds.database(database);
    }
    if let Some(instance) = &config.options.instance_name {
        tds.instance_name(instance);
    }
    if let Some(app_name) = &config.options.app_name {
        tds.application_name(app_name);
    }

    match &config.authentication {
        Some(Authentication::Default {
            user_name,
            password,
        }) => tds.authentication(AuthMethod::sql_server(user_name, password)),
        Some(Authentication::AzureActiveDirectoryAccessToken { token }) => {
            tds.authentication(AuthMethod::aad_token(token));
        }
        None => {
            return Err(MssqlMiddlewareError::ConfigError(
                "no authentication configured: set `authentication` or `userName`/`password`"
                    .into(),
            ));
        }
    }

    match config.options.encrypt {
        Some(true) => tds.encryption(EncryptionLevel::Required),
        Some(false) => tds.encryption(EncryptionLevel::Off),
        None => {}
    }
    if config.options.trust_server_certificate {
        tds.trust_cert();
    }
    Ok(tds)
}

/// Open a SQL Server connection for the given config.
///
/// Named instances are resolved through the SQL Browser service, and a routing
/// redirect from the server (Azure SQL) is followed once.
///
/// # Errors
/// Returns `ConfigError` for an unusable config and `ConnectionError` when the
/// connection cannot be established or the connect timeout expires.
pub async fn create_mssql_client(
    config: &ConnectionConfig,
) -> Result<TdsClient, MssqlMiddlewareError> {
    let tds = build_tiberius_config(config)?;
    let named = config.options.instance_name.is_some();
    match config.connect_timeout() {
        Some(limit) => tokio::time::timeout(limit, connect_with_routing(tds, named))
            .await
            .map_err(|_| {
                MssqlMiddlewareError::ConnectionError(format!(
                    "connecting to {} timed out after {}ms",
                    config.describe(),
                    limit.as_millis()
                ))
            })?,
        None => connect_with_routing(tds, named).await,
    }
}

async fn open_tcp(tds: &tiberius::Config, named: bool) -> Result<TcpStream, MssqlMiddlewareError> {
    let tcp = if named {
        TcpStream::connect_named(tds).await.map_err(|e| {
            MssqlMiddlewareError::ConnectionError(format!("SQL Browser lookup failed: {e}"))
        })?
    } else {
        TcpStream::connect(tds.get_addr()).await.map_err(|e| {
            MssqlMiddlewareError::ConnectionError(format!("TCP connection error: {e}"))
        })?
    };
    tcp.set_nodelay(true)?;
    Ok(tcp)
}

async fn connect_with_routing(
    mut tds: tiberius::Config,
    named: bool,
) -> Result<TdsClient, MssqlMiddlewareError> {
    let tcp = open_tcp(&tds, named).await?;
    match Client::connect(tds.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(%host, port, "SQL Server redirected the connection");
            tds.host(&host);
            tds.port(port);
            let tcp = open_tcp(&tds, false).await?;
            Client::connect(tds, tcp.compat_write()).await.map_err(|e| {
                MssqlMiddlewareError::ConnectionError(format!(
                    "SQL Server connection error after redirect to {host}:{port}: {e}"
                ))
            })
        }
        Err(e) => Err(MssqlMiddlewareError::ConnectionError(format!(
            "SQL Server connection error: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_authentication_is_a_config_error() {
        let config = ConnectionConfig::builder("localhost").database("app").finish();
        let result = build_tiberius_config(&config);
        assert!(matches!(result, Err(MssqlMiddlewareError::ConfigError(_))));
    }

    #[test]
    fn legacy_credentials_are_usable_after_normalization() {
        let config = ConnectionConfig::from_json_str(
            r#"{"server":"db","userName":"sa","password":"pw","options":{"port":14333}}"#,
        )
        .unwrap();
        let tds = build_tiberius_config(&config).unwrap();
        assert_eq!(tds.get_addr(), "db:14333");
    }
}
