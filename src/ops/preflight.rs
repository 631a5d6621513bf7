//! Checks run once before any install starts.
//!
//! An install is refused up front when a required host cannot be reached
//! or when the disk is unlikely to hold the packages about to be fetched.
//! Both checks can be skipped with `--skip-preflight`.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Hosts every install depends on.
pub const DEFAULT_HOSTS: &[&str] = &[
    "github.com:443",
    "formulae.brew.sh:443",
    "registry.npmjs.org:443",
];

/// Why an install was refused before it started.
#[derive(Debug, Error, Diagnostic)]
pub enum PreflightError {
    #[error("cannot reach {host}: {reason}")]
    #[diagnostic(
        code(brewsync::preflight::unreachable),
        help("Check your network connection, or pass --skip-preflight to install anyway")
    )]
    Unreachable { host: String, reason: String },

    #[error(
        "not enough disk space: {available_gb:.1} GB free, {required_gb:.1} GB needed for {packages} packages"
    )]
    #[diagnostic(
        code(brewsync::preflight::disk_space),
        help("Free up space (`brew cleanup` often helps) or install fewer packages at once")
    )]
    InsufficientDisk {
        available_gb: f64,
        required_gb: f64,
        packages: usize,
    },

    #[error("cannot determine free space on {path}")]
    #[diagnostic(code(brewsync::preflight::disk_query))]
    DiskQuery {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Tunables for the preflight checks.
#[derive(Debug, Clone, PartialEq)]
pub struct PreflightOptions {
    /// `host[:port]` entries; the port defaults to 443.
    pub hosts: Vec<String>,
    pub timeout: Duration,
    pub gb_per_package: f64,
    pub min_free_gb: f64,
}

impl Default for PreflightOptions {
    fn default() -> Self {
        PreflightOptions {
            hosts: DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect(),
            timeout: Duration::from_secs(5),
            gb_per_package: 0.25,
            min_free_gb: 1.0,
        }
    }
}

impl PreflightOptions {
    /// Space needed for `packages` packages, in GB.
    pub fn required_gb(&self, packages: usize) -> f64 {
        (packages as f64 * self.gb_per_package).max(self.min_free_gb)
    }
}

/// Run every check. `disk_path` is any path on the volume packages land on.
pub fn run(
    options: &PreflightOptions,
    packages: usize,
    disk_path: &Path,
) -> Result<(), PreflightError> {
    for host in &options.hosts {
        check_reachable(host, options.timeout)?;
    }
    check_disk(disk_path, packages, options)
}

/// TCP-connect to `host` within `timeout`.
pub fn check_reachable(host: &str, timeout: Duration) -> Result<(), PreflightError> {
    let target = if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:443", host)
    };

    let addrs: Vec<SocketAddr> = target
        .to_socket_addrs()
        .map_err(|e| PreflightError::Unreachable {
            host: host.to_string(),
            reason: format!("could not resolve host ({})", e),
        })?
        .collect();

    let mut last_error = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(_) => {
                tracing::debug!("{} reachable via {}", host, addr);
                return Ok(());
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(PreflightError::Unreachable {
        host: host.to_string(),
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses".to_string()),
    })
}

/// Check free space on the volume holding `path`.
pub fn check_disk(
    path: &Path,
    packages: usize,
    options: &PreflightOptions,
) -> Result<(), PreflightError> {
    let available = fs2::available_space(path).map_err(|source| PreflightError::DiskQuery {
        path: path.display().to_string(),
        source,
    })?;
    ensure_space(available, packages, options)
}

/// Compare `available_bytes` against the estimate for `packages`.
pub fn ensure_space(
    available_bytes: u64,
    packages: usize,
    options: &PreflightOptions,
) -> Result<(), PreflightError> {
    let available_gb = available_bytes as f64 / GB;
    let required_gb = options.required_gb(packages);
    tracing::debug!(
        "{:.1} GB free, {:.1} GB estimated for {} packages",
        available_gb,
        required_gb,
        packages
    );

    if available_gb < required_gb {
        return Err(PreflightError::InsufficientDisk {
            available_gb,
            required_gb,
            packages,
        });
    }
    Ok(())
}
