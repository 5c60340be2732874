//! hostname lookup, injected so tests can substitute it
use std::io;

use sysinfo::System;

/// Resolves the name of the host we're running on.
pub trait HostnameResolver: Send + Sync {
	fn hostname(&self) -> io::Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
/// asks the operating system
pub struct SystemHostname;

impl HostnameResolver for SystemHostname {
	fn hostname(&self) -> io::Result<String> {
		System::host_name()
			.map(|hostname| hostname.trim().to_owned())
			.filter(|hostname| !hostname.is_empty())
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "hostname not available"))
	}
}

/// fixed hostname, or a failing lookup if `None`
#[derive(Debug, Clone, Default)]
pub struct StaticHostname(pub Option<String>);

impl HostnameResolver for StaticHostname {
	fn hostname(&self) -> io::Result<String> {
		self.0
			.clone()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "hostname not available"))
	}
}
