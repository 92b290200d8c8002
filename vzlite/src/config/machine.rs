use std::fmt;

use serde::{Deserialize, Serialize};
use vzlite_shared::{VzError, VzResult};

/// Static machine configuration (set once at creation, never changes).
///
/// Device semantics belong to the runtime. The bridge only needs the device
/// lists to map runtime device indices back to the configuration the caller
/// supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineConfiguration {
    /// Number of virtual CPUs.
    pub cpu_count: u32,
    /// Guest memory size in bytes.
    pub memory_size_bytes: u64,
    /// Network devices, in the order the runtime indexes them.
    #[serde(default)]
    pub network_devices: Vec<NetworkDeviceConfiguration>,
}

impl VirtualMachineConfiguration {
    pub fn new(cpu_count: u32, memory_size_bytes: u64) -> Self {
        Self {
            cpu_count,
            memory_size_bytes,
            network_devices: Vec::new(),
        }
    }

    /// Append a network device. Its runtime index is its position in the list.
    pub fn with_network_device(mut self, device: NetworkDeviceConfiguration) -> Self {
        self.network_devices.push(device);
        self
    }

    /// Look up a network device by the index the runtime reports.
    ///
    /// Returns `None` for negative or out-of-range indices.
    pub fn network_device(&self, index: i32) -> Option<&NetworkDeviceConfiguration> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.network_devices.get(i))
    }

    /// Check the configuration before handing it to the runtime.
    pub fn validate(&self) -> VzResult<()> {
        if self.cpu_count == 0 {
            return Err(VzError::Validation("cpu_count must be at least 1".into()));
        }
        if self.memory_size_bytes == 0 {
            return Err(VzError::Validation(
                "memory_size_bytes must be greater than zero".into(),
            ));
        }
        for (i, device) in self.network_devices.iter().enumerate() {
            if let NetworkAttachment::Bridged { interface } = &device.attachment
                && interface.trim().is_empty()
            {
                return Err(VzError::Validation(format!(
                    "network device {} has an empty bridged interface name",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of one virtio network device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDeviceConfiguration {
    pub attachment: NetworkAttachment,
    /// Guest MAC address, runtime-assigned when `None`.
    #[serde(default)]
    pub mac_address: Option<String>,
}

impl NetworkDeviceConfiguration {
    pub fn new(attachment: NetworkAttachment) -> Self {
        Self {
            attachment,
            mac_address: None,
        }
    }

    pub fn with_mac_address(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = Some(mac.into());
        self
    }
}

/// How a network device reaches the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkAttachment {
    Nat,
    Bridged { interface: String },
    FileHandle { fd: i32 },
}

impl fmt::Display for NetworkAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkAttachment::Nat => write!(f, "nat attachment"),
            NetworkAttachment::Bridged { interface } => {
                write!(f, "bridged attachment ({})", interface)
            }
            NetworkAttachment::FileHandle { fd } => write!(f, "file handle attachment (fd {})", fd),
        }
    }
}
