/*
 * vSMTP mail transfer agent
 * Copyright (C) 2022 viridIT SAS
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/

use ldap3::{exop::WhoAmI, LdapConn, LdapError};
use r2d2::ManageConnection;

/// A connection manager for ldap using r2d2.
#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
    timeout: std::time::Duration,
    tls: Option<LdapTLSParameters>,
    bind: Option<LdapBindParameters>,
}

impl ManageConnection for ConnectionManager {
    type Connection = LdapConn;
    type Error = LdapError;

    /// Connects to a ldap server.
    fn connect(&self) -> Result<LdapConn, LdapError> {
        let settings = ldap3::LdapConnSettings::new().set_conn_timeout(self.timeout);

        let settings = match self.tls.as_ref() {
            None => settings,
            Some(tls) => {
                let settings = settings.set_starttls(tls.starttls);

                if let Some(cafile) = tls.cafile.as_ref() {
                    let mut root_store = rustls::RootCertStore::empty();
                    let cert = std::fs::File::open(cafile)?;
                    let mut reader = std::io::BufReader::new(cert);

                    root_store.add_parsable_certificates(&rustls_pemfile::certs(&mut reader)?);

                    let config = rustls::ClientConfig::builder()
                        .with_safe_defaults()
                        .with_root_certificates(root_store)
                        .with_no_client_auth();

                    settings.set_config(config.into())
                } else {
                    settings
                }
            }
        };

        let mut conn = LdapConn::with_settings(settings, &self.url)?;

        if let Some(bind) = &self.bind {
            conn.with_timeout(self.timeout)
                .simple_bind(&bind.dn, &bind.pw)?
                .success()?;
        }

        Ok(conn)
    }

    fn is_valid(&self, conn: &mut LdapConn) -> Result<(), LdapError> {
        conn.with_timeout(self.timeout).extended(WhoAmI).map(|_| ())
    }

    fn has_broken(&self, conn: &mut LdapConn) -> bool {
        conn.with_timeout(self.timeout).extended(WhoAmI).is_err()
    }
}

/// Parameters to bind a connection using a base dn and a password.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct LdapBindParameters {
    /// The DN used to bind.
    pub dn: String,
    /// The password used to bind.
    pub pw: String,
}

/// Parameters to connect to the ldap database with defaults.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct LdapParameters {
    /// url of the server, `ldap://` or `ldaps://`.
    pub url: String,
    /// Time allowed to get a connection, to connect and for each query.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: std::time::Duration,
    /// Number of connections to open to the database.
    #[serde(default = "default_connections")]
    pub connections: u32,
    /// see [`LdapTLSParameters`]
    #[serde(default)]
    pub tls: Option<LdapTLSParameters>,
    /// see [`LdapBindParameters`]
    #[serde(default)]
    pub bind: Option<LdapBindParameters>,
    /// see [`crate::LdapSchema`]
    #[serde(default)]
    pub schema: crate::LdapSchema,
}

const fn default_connections() -> u32 {
    4
}

const fn default_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(30)
}

/// Additional TLS parameters for ldap.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct LdapTLSParameters {
    #[serde(default)]
    /// Initialize a transaction using the starttls mechanism.
    starttls: bool,
    #[serde(default)]
    /// Read root certificates from a CAFILE.
    cafile: Option<std::path::PathBuf>,
}

#[derive(Clone)]
/// A database connector based on ldap.
pub struct Ldap {
    /// The url to the database.
    pub url: String,
    /// Time allowed for each operation.
    pub timeout: std::time::Duration,
    /// connection pool for the database.
    pub pool: r2d2::Pool<ConnectionManager>,
}

impl std::fmt::Debug for Ldap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ldap")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Ldap {
    /// Create a ldap connection pool with the given parameters.
    ///
    /// The connections are opened lazily, so an unreachable server does not
    /// prevent the pool from being built.
    #[must_use]
    pub fn with_parameters(parameters: &LdapParameters) -> Self {
        Self {
            url: parameters.url.clone(),
            timeout: parameters.timeout,
            pool: r2d2::Pool::builder()
                .max_size(parameters.connections)
                .min_idle(Some(0))
                .connection_timeout(parameters.timeout)
                .build_unchecked(ConnectionManager {
                    url: parameters.url.clone(),
                    timeout: parameters.timeout,
                    tls: parameters.tls.clone(),
                    bind: parameters.bind.clone(),
                }),
        }
    }

    /// Get a connection from the pool.
    ///
    /// # Errors
    ///
    /// * no connection could be established before the timeout.
    pub fn get(&self) -> Result<r2d2::PooledConnection<ConnectionManager>, LdapError> {
        self.pool.get().map_err(|error| LdapError::Io {
            source: std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("failed to get an ldap connection: {error}"),
            ),
        })
    }

    /// Use the search query on a connection, with the operation timeout
    /// and the given controls.
    ///
    /// # Errors
    ///
    /// * see [`Ldap::get`]
    /// * the query failed or timed out.
    pub fn search(
        &self,
        base: &str,
        scope: ldap3::Scope,
        filter: &str,
        attrs: Vec<&str>,
        controls: Vec<ldap3::controls::RawControl>,
    ) -> Result<ldap3::SearchResult, LdapError> {
        let mut conn = self.get()?;

        conn.with_controls(controls)
            .with_timeout(self.timeout)
            .search(base, scope, filter, attrs)
    }

}
