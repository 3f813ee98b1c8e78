use anyhow::Context;
use bson::doc;
use mongodb::{options::ClientOptions, Client as MongoDBClient};
use std::{
    path::PathBuf,
    process::{Child, Stdio},
    str::FromStr,
    time::Duration,
};
use tempfile::TempDir;

const REPLICA_SET_NAME: &str = "rs0";
const STARTUP_RETRIES: usize = 20;
const STARTUP_INTERVAL: Duration = Duration::from_millis(500);

enum Endpoint {
    Socket,
    Loopback(u16),
}

/// Runs an ephemeral `mongod` that lives as long as this value.
///
/// [`MongodRunner::run`] starts a standalone server listening only on a unix
/// domain socket. [`MongodRunner::run_replica_set`] starts a single-node
/// replica set on a loopback port, which transactions and change streams
/// require.
pub struct MongodRunner {
    child: Child,
    endpoint: Endpoint,
    // This is stored to prevent premature removing of the tempdir
    tempdir: TempDir,
}

impl MongodRunner {
    fn get_socket_path(tempdir: &TempDir) -> anyhow::Result<String> {
        Ok(format!(
            "{}/mongod.sock",
            tempdir
                .path()
                .canonicalize()?
                .as_mut_os_str()
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("can't convert path to str"))?
        ))
    }

    /// Starts a standalone server reachable through a unix socket only.
    pub fn run() -> anyhow::Result<Self> {
        let tempdir = TempDir::new().context("Failed to create tempdir.")?;
        let socket_path = Self::get_socket_path(&tempdir)?;

        // Ensure socket file does not exist
        let socket_file = PathBuf::from(&socket_path);
        if socket_file.exists() {
            std::fs::remove_file(&socket_file)?;
        }
        std::fs::File::create_new(&socket_path)?;

        let child = std::process::Command::new("mongod")
            .args([
                "--unixSocketPrefix",
                &tempdir.path().to_string_lossy(),
                "--dbpath",
                &tempdir.path().to_string_lossy(),
                "--bind_ip",
                &socket_path,
                "--port",
                &0.to_string(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to start mongod")?;

        let mut new_self = Self {
            child,
            endpoint: Endpoint::Socket,
            tempdir,
        };

        // The driver retries server selection; only fail fast if mongod died.
        std::thread::sleep(STARTUP_INTERVAL);
        if let Some(status) = new_self.child.try_wait()? {
            return Err(anyhow::anyhow!("mongod exited during startup: {}", status));
        }

        log::info!("MongoDB server is running at {:?}", socket_file);
        Ok(new_self)
    }

    /// Starts a single-node replica set on a free loopback port and waits
    /// until it accepts writes.
    pub async fn run_replica_set() -> anyhow::Result<Self> {
        let tempdir = TempDir::new().context("Failed to create tempdir.")?;
        let port = std::net::TcpListener::bind("127.0.0.1:0")?
            .local_addr()?
            .port();

        let child = std::process::Command::new("mongod")
            .args([
                "--replSet",
                REPLICA_SET_NAME,
                "--dbpath",
                &tempdir.path().to_string_lossy(),
                "--bind_ip",
                "127.0.0.1",
                "--port",
                &port.to_string(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to start mongod")?;

        let new_self = Self {
            child,
            endpoint: Endpoint::Loopback(port),
            tempdir,
        };
        new_self.initiate_replica_set(port).await?;

        log::info!("MongoDB replica set is running on port {}", port);
        Ok(new_self)
    }

    async fn initiate_replica_set(&self, port: u16) -> anyhow::Result<()> {
        let admin = self.client()?.database("admin");
        let config = doc! {
            "_id": REPLICA_SET_NAME,
            "members": [{ "_id": 0, "host": format!("127.0.0.1:{}", port) }],
        };

        let mut initiated = false;
        for _ in 0..STARTUP_RETRIES {
            if !initiated {
                initiated = admin
                    .run_command(doc! { "replSetInitiate": config.clone() })
                    .await
                    .is_ok();
            }
            if initiated {
                let hello = admin.run_command(doc! { "hello": 1 }).await;
                if let Ok(true) = hello.map(|h| h.get_bool("isWritablePrimary").unwrap_or(false)) {
                    return Ok(());
                }
            }
            tokio::time::sleep(STARTUP_INTERVAL).await;
        }
        Err(anyhow::anyhow!(
            "MongoDB replica set did not elect a primary in time"
        ))
    }

    pub fn get_socket_pathbuf(&self) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from_str(&Self::get_socket_path(&self.tempdir)?)?)
    }

    /// Client connected directly to this server.
    pub fn client(&self) -> anyhow::Result<MongoDBClient> {
        let server_address = match self.endpoint {
            Endpoint::Socket => mongodb::options::ServerAddress::Unix {
                path: self.get_socket_pathbuf()?,
            },
            Endpoint::Loopback(port) => mongodb::options::ServerAddress::Tcp {
                host: "127.0.0.1".to_string(),
                port: Some(port),
            },
        };
        let client_options = ClientOptions::builder()
            .hosts(vec![server_address])
            .direct_connection(true)
            .build();
        Ok(MongoDBClient::with_options(client_options)?)
    }
}

impl Drop for MongodRunner {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::warn!("Failed to stop mongod: {}", e);
        }
        let _ = self.child.wait();
    }
}
